//! # RTS Link Layer
//!
//! 串口发射器硬件抽象层，提供统一的 [`SerialLink`] 接口。
//!
//! - [`SerialPortLink`]: 真实串口（按 VID:PID 自动扫描端口）
//! - [`MockLink`]: 确定性模拟实现（回环回显，无 IO）
//!
//! 实现在构造时选定，调用方不需要根据模式分支。

use std::time::Duration;
use thiserror::Error;

pub mod mock;
pub mod serial;

pub use mock::MockLink;
pub use serial::SerialPortLink;

/// 链路层统一错误类型
///
/// 只在实现内部传播；[`SerialLink`] 的公开操作会记录日志后折叠为 `bool` / `Option`。
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("No serial port matches hardware id {0:?}")]
    NotFound(String),
}

/// 串口配置
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SerialConfig {
    /// 硬件标识子串（如 "2341:0043"），按子串匹配端口硬件 ID
    pub vid_pid: String,
    /// 波特率
    pub baud_rate: u32,
    /// 单次读写超时，同时作为 drain 间隔
    pub port_timeout: Duration,
    /// 打开端口后的固定稳定延时
    pub settle_delay: Duration,
    /// 等待数据时的轮询间隔
    pub poll_interval: Duration,
    /// `check` 静默重开端口时等待首个入站数据的超时
    pub check_timeout: Duration,
}

impl SerialConfig {
    pub fn new(vid_pid: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            vid_pid: vid_pid.into(),
            baud_rate,
            ..Self::default()
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            vid_pid: String::new(),
            baud_rate: 115_200,
            port_timeout: Duration::from_millis(100),
            settle_delay: Duration::from_millis(10),
            poll_interval: Duration::from_millis(10),
            check_timeout: Duration::from_secs(5),
        }
    }
}

/// 发射器串口链路
///
/// 真实实现内部持有一把实例级互斥锁，每个操作只在自身执行期间持锁，
/// 锁 **不可重入**：实现方不得在一个加锁操作内部调用另一个加锁操作。
///
/// 所有操作都不会返回错误：失败通过返回值体现，由上层重试循环负责恢复。
pub trait SerialLink: Send + Sync {
    /// 扫描端口，返回第一个硬件 ID 匹配的端口名
    fn scan_port(&self) -> Option<String>;

    /// 打开扫描到的端口，等待数据到达或 `timeout` 到期，然后短暂稳定
    ///
    /// 返回端口最终是否处于打开状态。
    fn connect(&self, timeout: Duration) -> bool;

    /// 关闭端口，返回是否已关闭
    fn disconnect(&self) -> bool;

    /// 先断开再连接；断开失败时直接返回 `false`
    fn reconnect(&self, timeout: Duration) -> bool {
        if !self.disconnect() {
            return false;
        }
        self.connect(timeout)
    }

    /// 端口打开时写入字节（可选 flush），否则返回 `false` 且不写入
    fn write(&self, bytes: &[u8], flush: bool) -> bool;

    /// 读取全部可用数据
    ///
    /// - 端口未打开：`None`
    /// - 超时且无数据：`Some(vec![])`
    /// - 数据开始到达后持续 drain，直到没有立即可读的字节
    fn read_all(&self, timeout: Duration) -> Option<Vec<u8>>;

    /// 检查端口是否仍可枚举且已打开；丢失时静默尝试重连
    fn check(&self) -> bool;

    /// 丢弃输入缓冲区中的旧数据（每次发送前调用）
    fn reset_input_buffer(&self);

    /// 端口当前是否打开
    fn is_open(&self) -> bool;

    /// 是否为模拟链路
    fn is_mock(&self) -> bool {
        false
    }
}

/// 串口信息（用于枚举展示）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// 端口名（如 "/dev/ttyACM0"、"COM3"）
    pub name: String,
    /// 硬件 ID 文本（如 "USB VID:PID=2341:0043 SER=75833353934351F0A1E1"）
    pub hardware_id: String,
}

/// 生成端口硬件 ID 文本
///
/// USB 端口格式为 `USB VID:PID=XXXX:XXXX[ SER=...]`，其他类型为 `n/a`。
pub fn hardware_id(port_type: &serialport::SerialPortType) -> String {
    match port_type {
        serialport::SerialPortType::UsbPort(info) => {
            let mut id = format!("USB VID:PID={:04X}:{:04X}", info.vid, info.pid);
            if let Some(serial) = &info.serial_number {
                id.push_str(" SER=");
                id.push_str(serial);
            }
            id
        },
        _ => "n/a".to_string(),
    }
}

/// 硬件 ID 是否匹配配置的 VID:PID 子串（大小写不敏感）
pub fn matches_hardware_id(hardware_id: &str, vid_pid: &str) -> bool {
    hardware_id
        .to_ascii_uppercase()
        .contains(&vid_pid.trim().to_ascii_uppercase())
}

/// 枚举系统中所有串口
pub fn list_ports() -> Result<Vec<PortInfo>, LinkError> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|port| PortInfo {
            hardware_id: hardware_id(&port.port_type),
            name: port.port_name,
        })
        .collect())
}
