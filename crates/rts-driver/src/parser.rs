//! 文本命令解析
//!
//! 支持两种形式：
//!
//! ```text
//! send('<name>', '<action>')
//! send('<name>', '<action>', <counter>)
//! pulse(<pin>, <delay_ms>)
//! ```
//!
//! - 参数可以是单/双引号字符串，或裸数值字面量（十进制 / `0x` / `0b`）
//! - 逗号、空白、括号均为分隔符
//! - `send` 第三个参数为显式计数器，绕过计数器存储（不读取也不回写）
//! - `pulse` 不做协议编码，原样透传给发射器

use crate::counter::CounterStore;
use crate::error::{DriverError, ParseError};
use crate::settings::{Device, RecipeStep, Settings};
use rts_protocol::{Action, Frame, ProtocolError, parse_literal};
use std::fmt;

/// 解析后的单个参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// 引号字符串（已去掉引号）
    Text(String),
    /// 裸数值字面量
    Integer(u64),
}

impl Argument {
    fn as_text(&self) -> String {
        match self {
            Argument::Text(text) => text.clone(),
            Argument::Integer(value) => value.to_string(),
        }
    }

    /// 数值参数；字符串参数按字面量解析
    fn as_integer(&self) -> Result<u64, ParseError> {
        match self {
            Argument::Integer(value) => Ok(*value),
            Argument::Text(text) => parse_literal(text).map_err(|_| ParseError::InvalidLiteral(text.clone())),
        }
    }
}

/// 提取参数列表
///
/// 输入为括号内的参数文本（也可以包含括号，括号视为分隔符）。
pub fn extract_arguments(arguments: &str) -> Result<Vec<Argument>, ParseError> {
    let syntax = || ParseError::Syntax {
        line: arguments.to_string(),
    };

    let mut result = Vec::new();
    let mut chars = arguments.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        match c {
            c if c.is_whitespace() || c == ',' || c == '(' || c == ')' => {},
            '\'' | '"' => {
                let quote = c;
                let mut text = String::new();
                let mut closed = false;
                for (_, next) in chars.by_ref() {
                    if next == quote {
                        closed = true;
                        break;
                    }
                    text.push(next);
                }
                if !closed {
                    return Err(syntax());
                }
                result.push(Argument::Text(text));
            },
            c if c.is_ascii_alphanumeric() || c == '_' => {
                let mut end = start + c.len_utf8();
                while let Some(&(index, next)) = chars.peek() {
                    if !(next.is_ascii_alphanumeric() || next == '_') {
                        break;
                    }
                    end = index + next.len_utf8();
                    chars.next();
                }
                let literal = &arguments[start..end];
                let value =
                    parse_literal(literal).map_err(|_| ParseError::InvalidLiteral(literal.to_string()))?;
                result.push(Argument::Integer(value));
            },
            _ => return Err(syntax()),
        }
    }

    Ok(result)
}

/// 解析后的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    /// RTS 协议命令
    Send {
        shutter: Device,
        action: Action,
        /// 实际编码使用的计数值（覆盖值或存储中的当前值）
        counter: u16,
        /// 显式计数器（第 3 个参数）
        counter_override: Option<u16>,
    },
    /// 引脚脉冲（原样透传）
    Pulse { pin: u32, delay_ms: u32, text: String },
}

impl ParsedCommand {
    /// 生成发送载荷
    pub fn payload(&self) -> Payload {
        match self {
            ParsedCommand::Send {
                shutter,
                action,
                counter,
                ..
            } => Payload::Rts(Frame::for_action(*action, *counter, shutter.id)),
            ParsedCommand::Pulse { text, .. } => Payload::Pulse(text.clone()),
        }
    }

    /// 投递成功后是否需要递增存储中的计数器
    pub fn commits_counter(&self) -> bool {
        matches!(
            self,
            ParsedCommand::Send {
                counter_override: None,
                ..
            }
        )
    }

    pub fn shutter(&self) -> Option<&Device> {
        match self {
            ParsedCommand::Send { shutter, .. } => Some(shutter),
            ParsedCommand::Pulse { .. } => None,
        }
    }
}

/// 写入发射器的载荷
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// 已编码的 RTS 帧（以十六进制文本发送）
    Rts(Frame),
    /// 透传文本
    Pulse(String),
}

impl Payload {
    /// 实际写入串口的字节
    pub fn wire_bytes(&self) -> Vec<u8> {
        match self {
            Payload::Rts(frame) => frame.wire_bytes(),
            Payload::Pulse(text) => text.as_bytes().to_vec(),
        }
    }

    pub fn frame(&self) -> Option<&Frame> {
        match self {
            Payload::Rts(frame) => Some(frame),
            Payload::Pulse(_) => None,
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Rts(frame) => write!(f, "{}", frame),
            Payload::Pulse(text) => f.write_str(text),
        }
    }
}

/// 按关键字拆出括号内参数文本（关键字大小写不敏感）
fn strip_call<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let open = keyword.len();
    // 按字节切分前先确认字符边界，非 ASCII 输入不能 panic
    let name = line.get(..open)?;
    let rest = line.get(open..)?;
    if !name.eq_ignore_ascii_case(keyword) || !rest.starts_with('(') || !rest.ends_with(')') || rest.len() < 2 {
        return None;
    }
    rest.get(1..rest.len() - 1)
}

/// 命令解析器
///
/// 借用配置（名称 → 设备）和计数器存储（读取当前计数）。
pub struct CommandParser<'a> {
    settings: &'a Settings,
    store: &'a CounterStore,
}

impl<'a> CommandParser<'a> {
    pub fn new(settings: &'a Settings, store: &'a CounterStore) -> Self {
        Self { settings, store }
    }

    /// 解析多行文本，每个非空行一条命令
    pub fn parse(&self, text: &str) -> Result<Vec<ParsedCommand>, DriverError> {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| self.parse_line(line))
            .collect()
    }

    /// 解析恰好一条命令
    pub fn parse_single(&self, text: &str) -> Result<ParsedCommand, DriverError> {
        let lines: Vec<&str> = text.lines().map(str::trim).filter(|line| !line.is_empty()).collect();
        match lines.as_slice() {
            [] => Err(ParseError::Empty.into()),
            [line] => self.parse_line(line),
            _ => Err(ParseError::MultipleCommands(lines.len()).into()),
        }
    }

    /// 解析单行命令
    pub fn parse_line(&self, line: &str) -> Result<ParsedCommand, DriverError> {
        let line = line.trim();

        if let Some(inner) = strip_call(line, "send") {
            let arguments = extract_arguments(inner)?;
            return self.resolve_send(line, &arguments);
        }

        if let Some(inner) = strip_call(line, "pulse") {
            let arguments = extract_arguments(inner)?;
            return Ok(Self::resolve_pulse(line, &arguments)?);
        }

        Err(ParseError::Syntax {
            line: line.to_string(),
        }
        .into())
    }

    /// 解析配方：逐条解析并读取当前计数，不接受覆盖值
    pub fn resolve_recipe(&self, name: &str) -> Result<Vec<ParsedCommand>, DriverError> {
        self.recipe_steps(name)?
            .iter()
            .map(|step| self.resolve_step(step))
            .collect()
    }

    /// 查找配方步骤
    pub fn recipe_steps(&self, name: &str) -> Result<&'a [RecipeStep], ParseError> {
        self.settings
            .recipe(name)
            .ok_or_else(|| ParseError::UnknownRecipe(name.to_string()))
    }

    /// 校验配方步骤（设备与命令名），不读取计数器
    pub fn validate_step(&self, step: &RecipeStep) -> Result<(&'a Device, Action), ParseError> {
        let device = self.device(&step.shutter)?;
        let action = Action::from_name(&step.command).map_err(|_| ParseError::UnknownCommand(step.command.clone()))?;
        Ok((device, action))
    }

    /// 解析单个配方步骤（读取实时计数）
    pub fn resolve_step(&self, step: &RecipeStep) -> Result<ParsedCommand, DriverError> {
        let (device, action) = self.validate_step(step)?;
        let counter = self.store.value(device)?;
        Ok(ParsedCommand::Send {
            shutter: device.clone(),
            action,
            counter,
            counter_override: None,
        })
    }

    fn device(&self, name: &str) -> Result<&'a Device, ParseError> {
        self.settings
            .device(name)
            .ok_or_else(|| ParseError::UnknownShutter(name.to_string()))
    }

    fn resolve_send(&self, line: &str, arguments: &[Argument]) -> Result<ParsedCommand, DriverError> {
        if !(2..=3).contains(&arguments.len()) {
            return Err(ParseError::ArgumentCount {
                command: "send",
                expected: "2 or 3",
                count: arguments.len(),
                line: line.to_string(),
            }
            .into());
        }

        let device = self.device(&arguments[0].as_text())?;
        let action = resolve_action(&arguments[1])?;

        let counter_override = match arguments.get(2) {
            Some(argument) => Some(wrap_override(argument.as_integer()?)),
            None => None,
        };

        let counter = match counter_override {
            Some(counter) => counter,
            None => self.store.value(device)?,
        };

        Ok(ParsedCommand::Send {
            shutter: device.clone(),
            action,
            counter,
            counter_override,
        })
    }

    fn resolve_pulse(line: &str, arguments: &[Argument]) -> Result<ParsedCommand, ParseError> {
        if arguments.len() != 2 {
            return Err(ParseError::ArgumentCount {
                command: "pulse",
                expected: "2",
                count: arguments.len(),
                line: line.to_string(),
            });
        }

        let to_u32 = |argument: &Argument| -> Result<u32, ParseError> {
            let value = argument.as_integer()?;
            u32::try_from(value).map_err(|_| ParseError::InvalidLiteral(value.to_string()))
        };

        Ok(ParsedCommand::Pulse {
            pin: to_u32(&arguments[0])?,
            delay_ms: to_u32(&arguments[1])?,
            text: line.to_string(),
        })
    }
}

/// 命令参数：字符串按名称查表，数值作为原始命令码
fn resolve_action(argument: &Argument) -> Result<Action, ParseError> {
    match argument {
        Argument::Text(name) => Action::from_name(name).map_err(|_| ParseError::UnknownCommand(name.clone())),
        Argument::Integer(value) => Action::raw(*value).map_err(|e| match e {
            ProtocolError::CodeOutOfRange { value } => ParseError::CodeOutOfRange(value),
            _ => ParseError::InvalidLiteral(value.to_string()),
        }),
    }
}

/// 覆盖计数值取模 65536
fn wrap_override(value: u64) -> u16 {
    (value & 0xFFFF) as u16
}
