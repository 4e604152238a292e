//! # RTS Protocol
//!
//! Somfy RTS 遥控协议帧编码（无硬件依赖）
//!
//! ## 模块
//!
//! - `command`: 命令码表与别名
//!
//! ## 帧格式
//!
//! 7 字节，大端字节序：
//!
//! ```text
//! [0] 0xA7          协议标记
//! [1] CMD<<4 | CKS  命令码（高半字节）+ 校验半字节
//! [2] CTR_H         滚动计数器高字节
//! [3] CTR_L         滚动计数器低字节
//! [4] ID_H          设备地址（24 bit）
//! [5] ID_M
//! [6] ID_L
//! ```
//!
//! 编码顺序固定：基础帧 → 校验 → 混淆。仅发送方向，不提供解码。

pub mod command;

pub use command::{Action, COMMAND_NAMES, CommandCode};

use std::fmt;
use thiserror::Error;

/// 帧长度（字节）
pub const FRAME_LEN: usize = 7;

/// 帧第 0 字节的协议标记
pub const FRAME_MARKER: u8 = 0xA7;

/// 设备地址掩码（24 bit）
pub const DEVICE_ID_MASK: u32 = 0x00FF_FFFF;

/// 滚动计数器取模基数
pub const COUNTER_MODULUS: i64 = 1 << 16;

/// 协议错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unknown command name: {0}")]
    UnknownCommand(String),

    #[error("Command code out of range (max 0xF): 0x{value:X}")]
    CodeOutOfRange { value: u64 },

    #[error("Invalid numeric literal: {0:?}")]
    InvalidLiteral(String),
}

/// 已编码的 RTS 帧（不可变）
///
/// 通过 [`Frame::encode`] 一次性生成：基础帧、校验、混淆三个步骤
/// 只执行一次，不能对已编码帧再次应用。
///
/// # Example
///
/// ```rust
/// use rts_protocol::{CommandCode, Frame};
///
/// let frame = Frame::encode(CommandCode::Up.code(), 5, 0x123456);
/// assert_eq!(frame.to_wire_string(), "A7 8A 8A 8F 9D A9 FF");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Frame {
    bytes: [u8; FRAME_LEN],
}

impl Frame {
    /// 编码完整帧
    ///
    /// `code` 只取低 4 bit，`device_id` 只取低 24 bit。
    pub fn encode(code: u8, counter: u16, device_id: u32) -> Self {
        let mut bytes = base_frame(code, counter, device_id);
        apply_checksum(&mut bytes);
        obfuscate(&mut bytes);
        Self { bytes }
    }

    /// 按动作编码
    pub fn for_action(action: Action, counter: u16, device_id: u32) -> Self {
        Self::encode(action.code(), counter, device_id)
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.bytes
    }

    /// 串口文本形式：两位大写十六进制，单空格分隔
    ///
    /// 发射器固件按行读取该文本（忽略空格），并原样回显。
    pub fn to_wire_string(&self) -> String {
        self.bytes
            .iter()
            .map(|byte| format!("{:02X}", byte))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 实际写入串口的字节（ASCII 文本）
    pub fn wire_bytes(&self) -> Vec<u8> {
        self.to_wire_string().into_bytes()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire_string())
    }
}

/// 构建基础帧（未校验、未混淆）
pub fn base_frame(code: u8, counter: u16, device_id: u32) -> [u8; FRAME_LEN] {
    let id = device_id & DEVICE_ID_MASK;
    [
        FRAME_MARKER,
        code << 4,
        (counter >> 8) as u8,
        counter as u8,
        (id >> 16) as u8,
        (id >> 8) as u8,
        id as u8,
    ]
}

/// 计算校验半字节
///
/// 对全部 7 个字节执行 `c ^= b ^ (b >> 4)`（包括 0xA7 标记），取低 4 bit。
/// 必须与接收端电机的算法逐位一致。
pub fn checksum(frame: &[u8; FRAME_LEN]) -> u8 {
    frame.iter().fold(0u8, |acc, &byte| acc ^ byte ^ (byte >> 4)) & 0x0F
}

/// 将校验半字节写入第 1 字节低半字节
pub fn apply_checksum(frame: &mut [u8; FRAME_LEN]) {
    let nibble = checksum(frame);
    frame[1] |= nibble;
}

/// 混淆（级联 XOR）
///
/// 从索引 1 到 6 依次执行 `frame[i] ^= frame[i - 1]`，每一步使用前一字节
/// **已混淆** 的值。顺序不可调整，也不可并行化。
pub fn obfuscate(frame: &mut [u8; FRAME_LEN]) {
    for index in 1..FRAME_LEN {
        frame[index] ^= frame[index - 1];
    }
}

/// 将任意整数折算到计数器范围 `[0, 65535]`
pub fn wrap_counter(raw: i64) -> u16 {
    raw.rem_euclid(COUNTER_MODULUS) as u16
}

/// 解析数值字面量
///
/// 支持十进制、`0x` 前缀十六进制、`0b` 前缀二进制，其他形式均为错误。
pub fn parse_literal(text: &str) -> Result<u64, ProtocolError> {
    let trimmed = text.trim();
    let invalid = || ProtocolError::InvalidLiteral(text.to_string());

    let (digits, radix) = if let Some(hex) = trimmed.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(bin) = trimmed.strip_prefix("0b") {
        (bin, 2)
    } else {
        (trimmed, 10)
    };

    // from_str_radix 接受前导 '+'，这里不接受
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }

    u64::from_str_radix(digits, radix).map_err(|_| invalid())
}

/// 解析设备地址（十六进制文本，可带 `0x` 前缀）
pub fn parse_device_id(text: &str) -> Result<u32, ProtocolError> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ProtocolError::InvalidLiteral(text.to_string()));
    }

    u32::from_str_radix(digits, 16)
        .map(|id| id & DEVICE_ID_MASK)
        .map_err(|_| ProtocolError::InvalidLiteral(text.to_string()))
}
