//! Builder 模式实现
//!
//! 提供链式构造 `Remote` 实例的便捷方式。

use crate::error::{DriverError, SettingsError};
use crate::remote::{DeliveryConfig, Remote};
use crate::settings::Settings;
use rts_link::{MockLink, SerialLink, SerialPortLink};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// 启动时等待发射器就绪的超时
const STARTUP_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Remote Builder（链式构造）
///
/// 链路选择顺序：显式注入的链路 > `mock(true)` > 配置中的 `Test.remote_mocking` > 真实串口。
///
/// # Example
///
/// ```no_run
/// use rts_driver::RemoteBuilder;
///
/// let remote = RemoteBuilder::new()
///     .settings_path("settings.json")
///     .build()
///     .unwrap();
/// let result = remote.execute("send('figuier', 'up')").unwrap();
/// println!("verified = {}", result.verified);
/// ```
pub struct RemoteBuilder {
    settings: Option<Settings>,
    settings_path: Option<PathBuf>,
    link: Option<Arc<dyn SerialLink>>,
    mock: Option<bool>,
    delivery_config: DeliveryConfig,
    /// 构建完成后立即连接（默认开启）
    connect_on_build: bool,
    startup_timeout: Duration,
}

impl RemoteBuilder {
    pub fn new() -> Self {
        Self {
            settings: None,
            settings_path: None,
            link: None,
            mock: None,
            delivery_config: DeliveryConfig::default(),
            connect_on_build: true,
            startup_timeout: STARTUP_CONNECT_TIMEOUT,
        }
    }

    /// 使用已加载的配置
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// 从文件加载配置（`settings` 优先）
    pub fn settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// 注入链路实现
    pub fn link(mut self, link: Arc<dyn SerialLink>) -> Self {
        self.link = Some(link);
        self
    }

    /// 强制开启/关闭模拟链路，覆盖配置中的 `Test.remote_mocking`
    pub fn mock(mut self, enabled: bool) -> Self {
        self.mock = Some(enabled);
        self
    }

    pub fn delivery_config(mut self, config: DeliveryConfig) -> Self {
        self.delivery_config = config;
        self
    }

    pub fn connect_on_build(mut self, enabled: bool) -> Self {
        self.connect_on_build = enabled;
        self
    }

    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// 构建 `Remote`
    ///
    /// 补齐所有设备的计数器文件，并按需建立初始连接（连接失败只记录日志）。
    ///
    /// # 错误
    /// - `DriverError::Settings`: 配置缺失/无效，或真实串口模式缺少 UART 配置
    /// - `DriverError::Counter`: 计数器目录无法创建
    pub fn build(self) -> Result<Remote, DriverError> {
        let settings = match (self.settings, self.settings_path) {
            (Some(settings), _) => settings,
            (None, Some(path)) => Settings::load(path)?,
            (None, None) => return Err(SettingsError::NotProvided.into()),
        };

        let link: Arc<dyn SerialLink> = match self.link {
            Some(link) => link,
            None if self.mock.unwrap_or(settings.test.remote_mocking) => {
                info!("Using mocked remote");
                Arc::new(MockLink::new())
            },
            None => {
                let uart = settings.uart.as_ref().ok_or(SettingsError::MissingUart)?;
                Arc::new(SerialPortLink::new(uart.serial_config()))
            },
        };

        let remote = Remote::new(link, settings, self.delivery_config);
        remote.provision_counters()?;

        if self.connect_on_build && !remote.link().connect(self.startup_timeout) {
            error!("Could not connect to the remote");
        }

        Ok(remote)
    }
}

impl Default for RemoteBuilder {
    fn default() -> Self {
        Self::new()
    }
}
