//! 遥控命令码定义
//!
//! Somfy RTS 协议使用 4-bit 命令码，位于帧第 1 字节的高半字节。
//!
//! | 码值 | 按键 | 说明 |
//! |------|------|------|
//! | 0x1 | My | 停止或移动到收藏位置 |
//! | 0x2 | Up | 上升 |
//! | 0x3 | My + Up | 初始编程模式下设置上限位 |
//! | 0x4 | Down | 下降 |
//! | 0x5 | My + Down | 初始编程模式下设置下限位 |
//! | 0x6 | Up + Down | 修改限位 / 进入初始编程模式 |
//! | 0x8 | Prog | 注册 / 注销遥控器 |
//! | 0x9 | Sun + Flag | 启用光照与风感应（Telis Soliris） |
//! | 0xA | Flag | 禁用光照感应（Telis Soliris） |

use crate::ProtocolError;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// RTS 命令码（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CommandCode {
    My = 0x1,
    Up = 0x2,
    MyUp = 0x3,
    Down = 0x4,
    MyDown = 0x5,
    UpDown = 0x6,
    Prog = 0x8,
    SunFlag = 0x9,
    SunUnflag = 0xA,
}

/// 命令名 → 命令码映射（包含别名）
///
/// `MY`/`STOP`、`UP`/`HAUT`、`DOWN`/`BAS` 共享同一个命令码。
pub const COMMAND_NAMES: &[(&str, CommandCode)] = &[
    ("MY", CommandCode::My),
    ("STOP", CommandCode::My),
    ("UP", CommandCode::Up),
    ("HAUT", CommandCode::Up),
    ("MY_UP", CommandCode::MyUp),
    ("DOWN", CommandCode::Down),
    ("BAS", CommandCode::Down),
    ("MY_DOWN", CommandCode::MyDown),
    ("UP_DOWN", CommandCode::UpDown),
    ("PROG", CommandCode::Prog),
    ("SUN_FLAG", CommandCode::SunFlag),
    ("SUN_UNFLAG", CommandCode::SunUnflag),
];

impl CommandCode {
    /// 按名称查找（大小写不敏感）
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        COMMAND_NAMES
            .iter()
            .find(|(candidate, _)| *candidate == upper)
            .map(|(_, code)| *code)
    }

    /// 规范名称（别名表中第一个匹配项）
    pub fn name(self) -> &'static str {
        COMMAND_NAMES
            .iter()
            .find(|(_, code)| *code == self)
            .map(|(name, _)| *name)
            .unwrap_or("UNKNOWN")
    }

    /// 4-bit 命令码
    pub fn code(self) -> u8 {
        self.into()
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 帧中实际编码的动作
///
/// 命令既可以是已知名称，也可以是原始数值码（`0x`/`0b`/十进制字面量），
/// 后者用于调试表外的命令码。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Action {
    Named(CommandCode),
    Raw(u8),
}

impl Action {
    /// 最大原始命令码（4 bit）
    pub const MAX_RAW_CODE: u64 = 0xF;

    /// 按名称解析
    pub fn from_name(name: &str) -> Result<Self, ProtocolError> {
        CommandCode::from_name(name)
            .map(Action::Named)
            .ok_or_else(|| ProtocolError::UnknownCommand(name.to_string()))
    }

    /// 从原始数值构造，超出 4 bit 返回错误
    pub fn raw(value: u64) -> Result<Self, ProtocolError> {
        if value > Self::MAX_RAW_CODE {
            return Err(ProtocolError::CodeOutOfRange { value });
        }
        Ok(Action::Raw(value as u8))
    }

    pub fn code(self) -> u8 {
        match self {
            Action::Named(code) => code.code(),
            Action::Raw(value) => value,
        }
    }
}

impl From<CommandCode> for Action {
    fn from(code: CommandCode) -> Self {
        Action::Named(code)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Named(code) => write!(f, "{}", code),
            Action::Raw(value) => write!(f, "0x{:X}", value),
        }
    }
}
