//! 集成测试共享工具：可编排的模拟链路与临时配置

#![allow(dead_code)]

use rts_driver::{DeliveryConfig, Device, RecipeStep, Remote, Settings};
use rts_link::SerialLink;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 链路调用记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Check,
    Connect,
    Disconnect,
    Reset,
    Write(Vec<u8>),
    Read,
}

#[derive(Debug, Default)]
struct ScriptState {
    events: Vec<LinkEvent>,
    pending: Vec<u8>,
    /// 剩余需要"丢失"的回显次数
    drop_echoes: usize,
}

/// 可编排的模拟链路
///
/// - 前 `drop_echoes` 次写入不回显，之后回显写入内容（带前后噪声）
/// - `check` 返回值可配置
/// - `port_lost` 时 `read_all` 返回 `None`（端口已关闭）
pub struct ScriptedLink {
    state: Mutex<ScriptState>,
    check_result: bool,
    connect_result: bool,
    echo: bool,
    port_lost: bool,
    /// 每次写入后执行（用于在发送与提交之间篡改环境）
    on_write: Option<Box<dyn Fn() + Send + Sync>>,
}

impl ScriptedLink {
    /// 每次都回显
    pub fn echoing() -> Self {
        Self::flaky(0)
    }

    /// 前 `failures` 次不回显
    pub fn flaky(failures: usize) -> Self {
        Self {
            state: Mutex::new(ScriptState {
                drop_echoes: failures,
                ..Default::default()
            }),
            check_result: true,
            connect_result: true,
            echo: true,
            port_lost: false,
            on_write: None,
        }
    }

    /// 从不回显
    pub fn silent() -> Self {
        Self {
            echo: false,
            ..Self::echoing()
        }
    }

    /// 写入成功但读取时端口已关闭
    pub fn port_lost() -> Self {
        Self {
            port_lost: true,
            ..Self::echoing()
        }
    }

    pub fn on_write(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_write = Some(Box::new(hook));
        self
    }

    /// 链路检查报告断开
    pub fn disconnected(mut self) -> Self {
        self.check_result = false;
        self.connect_result = false;
        self
    }

    pub fn events(&self) -> Vec<LinkEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                LinkEvent::Write(bytes) => Some(bytes),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &LinkEvent) -> usize {
        self.events().iter().filter(|event| *event == wanted).count()
    }

    fn record(&self, event: LinkEvent) {
        self.state.lock().unwrap().events.push(event);
    }
}

impl SerialLink for ScriptedLink {
    fn scan_port(&self) -> Option<String> {
        Some("scripted".to_string())
    }

    fn connect(&self, _timeout: Duration) -> bool {
        self.record(LinkEvent::Connect);
        self.connect_result
    }

    fn disconnect(&self) -> bool {
        self.record(LinkEvent::Disconnect);
        true
    }

    fn write(&self, bytes: &[u8], _flush: bool) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            state.events.push(LinkEvent::Write(bytes.to_vec()));
            if self.echo {
                if state.drop_echoes > 0 {
                    state.drop_echoes -= 1;
                } else {
                    state.pending.extend_from_slice(b"\x00noise ");
                    state.pending.extend_from_slice(bytes);
                    state.pending.extend_from_slice(b"\r\n");
                }
            }
        }
        if let Some(hook) = &self.on_write {
            hook();
        }
        true
    }

    fn read_all(&self, _timeout: Duration) -> Option<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        state.events.push(LinkEvent::Read);
        if self.port_lost {
            return None;
        }
        Some(std::mem::take(&mut state.pending))
    }

    fn check(&self) -> bool {
        self.record(LinkEvent::Check);
        self.check_result
    }

    fn reset_input_buffer(&self) {
        let mut state = self.state.lock().unwrap();
        state.events.push(LinkEvent::Reset);
        state.pending.clear();
    }

    fn is_open(&self) -> bool {
        self.check_result
    }
}

/// 测试用投递参数：不等待
pub fn fast_config() -> DeliveryConfig {
    DeliveryConfig {
        read_timeout: Duration::ZERO,
        backoff_step: Duration::ZERO,
        ..DeliveryConfig::default()
    }
}

/// 临时目录中的测试配置
pub fn test_settings(dir: &tempfile::TempDir) -> Settings {
    Settings::new(dir.path().join("counters"))
        .with_shutter(Device::new("figuier", 0x123456))
        .with_shutter(Device::new("volet framboisiers", 0xABCDEF))
        .with_recipe(
            "night_down",
            vec![
                RecipeStep::new("figuier", "down"),
                RecipeStep::new("volet framboisiers", "down"),
                RecipeStep::new("figuier", "my"),
            ],
        )
}

/// 创建使用指定链路的 Remote，并补齐计数器
pub fn remote_with(link: Arc<ScriptedLink>, dir: &tempfile::TempDir) -> Remote {
    let remote = Remote::new(link, test_settings(dir), fast_config());
    remote.provision_counters().unwrap();
    remote
}

pub fn counter(remote: &Remote, shutter: &str) -> u16 {
    let device = remote.settings().device(shutter).unwrap();
    remote.counters().value(device).unwrap()
}
