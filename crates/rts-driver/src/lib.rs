//! 驱动层模块
//!
//! 本模块在链路层之上提供 RTS 遥控器的完整投递流程，包括：
//! - 配置加载（设备表、配方、串口参数）
//! - 滚动计数器持久化
//! - 文本命令解析（`send(...)` / `pulse(...)` / 配方）
//! - 带回显校验与重试的投递协调
//!
//! # 使用场景
//!
//! 对外只需要 [`Remote::execute`]：输入一行命令文本，返回 [`DeliveryResult`]。
//! 调用方自行负责日志输出与外层接口（HTTP、智能家居集成等）。

mod builder;
pub mod counter;
mod error;
pub mod parser;
mod remote;
pub mod settings;

pub use builder::RemoteBuilder;
pub use counter::{CounterReading, CounterStore};
pub use error::{CounterError, DriverError, ParseError, SettingsError};
pub use parser::{Argument, CommandParser, ParsedCommand, Payload, extract_arguments};
pub use remote::{DeliveryConfig, DeliveryResult, Remote};
pub use settings::{Device, RecipeStep, Settings, TestSettings, UartSettings};
