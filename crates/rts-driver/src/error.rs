//! 驱动层错误类型定义
//!
//! 只有解析类错误会直接返回给调用方；链路层失败在重试循环内部吸收，
//! 最终只体现为 `DeliveryResult::verified == false`。

use crate::remote::DeliveryResult;
use std::path::PathBuf;
use thiserror::Error;

/// 命令解析错误（永不重试）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// 语法错误（未知命令形式、引号未闭合、非法字符）
    #[error("Invalid command syntax: {line:?}")]
    Syntax { line: String },

    /// 参数个数错误
    #[error("`{command}()` must contain {expected} arguments, received {count}: {line:?}")]
    ArgumentCount {
        command: &'static str,
        expected: &'static str,
        count: usize,
        line: String,
    },

    /// 未知卷帘名称
    #[error("Unknown shutter: {0:?}")]
    UnknownShutter(String),

    /// 未知命令名称
    #[error("Unknown command: {0:?}")]
    UnknownCommand(String),

    /// 原始命令码超出 4 bit
    #[error("Command code out of range (max 0xF): {0:#X}")]
    CodeOutOfRange(u64),

    /// 非法数值字面量
    #[error("Invalid numeric literal: {0:?}")]
    InvalidLiteral(String),

    /// 未知配方
    #[error("Unknown recipe: {0:?}")]
    UnknownRecipe(String),

    /// 输入为空
    #[error("Empty command")]
    Empty,

    /// 单次执行只接受一条命令
    #[error("Expected a single command, received {0}")]
    MultipleCommands(usize),
}

/// 计数器持久化错误
#[derive(Error, Debug)]
pub enum CounterError {
    /// 计数器文件不存在（由调用方负责创建）
    #[error("Counter file not found: {}", path.display())]
    Missing { path: PathBuf },

    /// 计数器内容无法解析为整数
    #[error("Counter file is unreadable: {}", path.display())]
    Unreadable { path: PathBuf },

    #[error("Counter IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 配置加载错误
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid id {id:?} for shutter {name:?}")]
    InvalidShutterId { name: String, id: String },

    #[error("Recipe {recipe:?} references unknown shutter {shutter:?}")]
    UnknownRecipeShutter { recipe: String, shutter: String },

    /// 真实串口模式需要 UART 配置段
    #[error("Missing UART section (VID_SR / SPEED) required for a real serial link")]
    MissingUart,

    #[error("No settings provided")]
    NotProvided,
}

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 命令解析错误
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// 计数器错误（发送前读取失败）
    #[error("Counter error: {0}")]
    Counter(#[from] CounterError),

    /// 配置错误
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// 配方中途中断，`completed` 为已发送步骤的结果
    #[error("Recipe {recipe:?} aborted after {} step(s): {source}", completed.len())]
    RecipeAborted {
        recipe: String,
        completed: Vec<DeliveryResult>,
        #[source]
        source: Box<DriverError>,
    },
}
