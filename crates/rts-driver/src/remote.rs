//! 投递协调器
//!
//! 每次调用的状态机：
//!
//! 1. 检查链路，断开时尝试连接（失败只记录日志）
//! 2. 解析命令（解析错误立即返回，不发送）
//! 3. 编码（`Send` 编码为 RTS 帧，`Pulse` 原样透传）
//! 4. 发送 → 读取回显 → 校验，失败则断开、退避、重连，最多 `max_attempts` 次
//! 5. 仅当无覆盖计数且校验成功时递增计数器
//!
//! 链路层失败不会作为错误返回，只体现为 [`DeliveryResult::verified`] 为 `false`。

use crate::counter::{CounterReading, CounterStore};
use crate::error::{CounterError, DriverError};
use crate::parser::{CommandParser, ParsedCommand, Payload};
use crate::settings::{Device, Settings};
use parking_lot::Mutex;
use rts_link::SerialLink;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 投递参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// 最大发送次数
    pub max_attempts: usize,
    /// 每次读取回显的超时
    pub read_timeout: Duration,
    /// 退避步长，第 n 次失败（从 0 开始）后等待 `backoff_step * (n + 1)`
    pub backoff_step: Duration,
    /// 重连时等待首个入站数据的超时
    pub connect_timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            read_timeout: Duration::from_secs(10),
            backoff_step: Duration::from_secs(2),
            connect_timeout: Duration::ZERO,
        }
    }
}

impl DeliveryConfig {
    /// 第 `attempt` 次失败后的退避时长
    pub fn backoff(&self, attempt: usize) -> Duration {
        let factor = u32::try_from(attempt + 1).unwrap_or(u32::MAX);
        self.backoff_step.saturating_mul(factor)
    }
}

/// 单次投递结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    /// 发送的载荷
    pub payload: Payload,
    /// 实际写入串口的字节
    pub bytes_sent: Vec<u8>,
    /// 最后一次读取到的字节（可能为空）
    pub bytes_received: Vec<u8>,
    /// 回显校验是否通过
    pub verified: bool,
    /// 计数器是否已递增
    pub counter_committed: bool,
    /// 实际发送次数
    pub attempts: usize,
    /// 目标设备（`Pulse` 为 `None`）
    pub shutter: Option<String>,
}

/// 回显校验：发送的字节在接收数据中连续出现
fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|window| window == needle)
}

/// RTS 遥控器
///
/// 持有链路、配置与计数器存储。`execute` / `execute_recipe` 通过内部的投递锁
/// 串行化，同一时刻只有一条命令在途，计数器的 读-改-写 因此不会交错。
pub struct Remote {
    link: Arc<dyn SerialLink>,
    settings: Settings,
    store: CounterStore,
    config: DeliveryConfig,
    delivery_lock: Mutex<()>,
}

impl Remote {
    /// 创建遥控器（不做任何 IO）
    ///
    /// 通常通过 [`RemoteBuilder`](crate::RemoteBuilder) 构造，它还会补齐计数器文件并建立初始连接。
    pub fn new(link: Arc<dyn SerialLink>, settings: Settings, config: DeliveryConfig) -> Self {
        let store = CounterStore::new(settings.counters_path.clone());
        Self {
            link,
            settings,
            store,
            config,
            delivery_lock: Mutex::new(()),
        }
    }

    pub fn link(&self) -> &Arc<dyn SerialLink> {
        &self.link
    }

    /// 替换链路（如热插拔后重新创建的串口）
    pub fn set_link(&mut self, link: Arc<dyn SerialLink>) {
        self.link = link;
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn counters(&self) -> &CounterStore {
        &self.store
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// 基于当前配置与计数器的解析器
    pub fn parser(&self) -> CommandParser<'_> {
        CommandParser::new(&self.settings, &self.store)
    }

    /// 为所有配置的设备补齐计数器文件
    ///
    /// 已存在的文件只记录当前值；不存在的以 0 创建；内容不可读的保持原样并告警。
    pub fn provision_counters(&self) -> Result<(), CounterError> {
        for device in self.settings.shutters.values() {
            match self.store.ensure(device)? {
                CounterReading::Value(value) => {
                    info!("Shutter {:?} ({}) counter = {}", device.name, device.key, value)
                },
                CounterReading::Unreadable => warn!(
                    "Shutter {:?} counter file is unreadable: {}",
                    device.name,
                    self.store.path_for(device).display()
                ),
            }
        }
        Ok(())
    }

    /// 执行一条文本命令
    ///
    /// # 错误
    /// - `DriverError::Parse`: 语法、参数个数、未知设备或命令
    /// - `DriverError::Counter`: 无覆盖值时当前计数器缺失或不可读（发送前）
    ///
    /// 链路失败与校验失败不返回错误，见 [`DeliveryResult::verified`]。
    pub fn execute(&self, text: &str) -> Result<DeliveryResult, DriverError> {
        let _guard = self.delivery_lock.lock();

        self.ensure_link();
        let command = self.parser().parse_single(text)?;
        Ok(self.deliver(&command))
    }

    /// 按顺序执行配方中的所有步骤
    ///
    /// 每一步发送前读取实时计数，同一设备出现多次时使用连续的计数值。
    /// 某一步校验失败不会中断后续步骤。
    ///
    /// # 错误
    /// - `DriverError::Parse`: 配方不存在或步骤无效（不发送任何帧）
    /// - `DriverError::Counter`: 任一步骤的计数器缺失或不可读（不发送任何帧）
    /// - `DriverError::RecipeAborted`: 已发送部分步骤后无法继续，携带已完成步骤的结果
    pub fn execute_recipe(&self, name: &str) -> Result<Vec<DeliveryResult>, DriverError> {
        let _guard = self.delivery_lock.lock();

        let parser = self.parser();
        let steps = parser.recipe_steps(name)?;
        for step in steps {
            let (device, _) = parser.validate_step(step)?;
            self.store.value(device)?;
        }

        self.ensure_link();
        let mut results = Vec::with_capacity(steps.len());
        for step in steps {
            let command = match parser.resolve_step(step) {
                Ok(command) => command,
                Err(e) => {
                    error!("Recipe {:?} aborted at step {:?}: {}", name, step.shutter, e);
                    return Err(DriverError::RecipeAborted {
                        recipe: name.to_string(),
                        completed: results,
                        source: Box::new(e),
                    });
                },
            };
            let result = self.deliver(&command);
            if !result.verified {
                warn!("Recipe {:?}: step {:?} -> {:?} was not acknowledged", name, step.shutter, step.command);
            }
            results.push(result);
        }
        Ok(results)
    }

    /// 链路检查，断开时尝试连接；失败不致命
    fn ensure_link(&self) {
        if self.link.check() {
            return;
        }
        warn!("Remote is disconnected, trying to connect");
        if !self.link.connect(self.config.connect_timeout) {
            warn!("Could not connect to the remote, delivery will retry");
        }
    }

    fn deliver(&self, command: &ParsedCommand) -> DeliveryResult {
        let payload = command.payload();
        let bytes_sent = payload.wire_bytes();
        let (verified, bytes_received, attempts) = self.transmit(&bytes_sent);

        let counter_committed = match command.shutter() {
            Some(device) if verified && command.commits_counter() => self.commit(device),
            _ => false,
        };

        DeliveryResult {
            payload,
            bytes_sent,
            bytes_received,
            verified,
            counter_committed,
            attempts,
            shutter: command.shutter().map(|device| device.name.clone()),
        }
    }

    /// 发送-校验-重试循环，返回 (是否校验通过, 最后接收的数据, 发送次数)
    fn transmit(&self, bytes: &[u8]) -> (bool, Vec<u8>, usize) {
        let mut received = Vec::new();

        for attempt in 0..self.config.max_attempts {
            self.link.reset_input_buffer();
            if !self.link.write(bytes, true) {
                warn!("Write failed (attempt {}/{})", attempt + 1, self.config.max_attempts);
            }
            debug!("TX: {}", String::from_utf8_lossy(bytes));

            received = self.link.read_all(self.config.read_timeout).unwrap_or_default();
            debug!("RX: {:?}", String::from_utf8_lossy(&received));

            if contains_subslice(&received, bytes) {
                return (true, received, attempt + 1);
            }

            let backoff = self.config.backoff(attempt);
            warn!(
                "No echo from the remote (attempt {}/{}), retrying in {:?}",
                attempt + 1,
                self.config.max_attempts,
                backoff
            );
            self.link.disconnect();
            thread::sleep(backoff);
            if !self.link.connect(self.config.connect_timeout) {
                warn!("Reconnect failed");
            }
        }

        error!("Remote did not acknowledge after {} attempts", self.config.max_attempts);
        (false, received, self.config.max_attempts)
    }

    /// 递增计数器；失败只记录日志，帧已经发出
    fn commit(&self, device: &Device) -> bool {
        match self.store.increment(device) {
            Ok(value) => {
                info!("Shutter {:?} counter committed: {}", device.name, value);
                true
            },
            Err(e) => {
                error!("Failed to commit counter for {:?}: {}", device.name, e);
                false
            },
        }
    }
}
