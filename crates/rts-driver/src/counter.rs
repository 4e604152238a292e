//! 滚动计数器持久化
//!
//! 每个设备一个文本文件 `<counters_path>/<device key>.txt`，内容只有十进制计数值。
//!
//! `increment` / `decrement` 是非原子的 读-改-写：同一设备同时只能有一个
//! 修改在进行，由 [`Remote`](crate::Remote) 的投递锁保证。

use crate::error::CounterError;
use crate::settings::Device;
use rts_protocol::wrap_counter;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// 计数器文件扩展名
const COUNTER_EXTENSION: &str = "txt";

/// 读取结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterReading {
    Value(u16),
    /// 文件存在但内容不是整数
    Unreadable,
}

impl CounterReading {
    pub fn value(self) -> Option<u16> {
        match self {
            CounterReading::Value(value) => Some(value),
            CounterReading::Unreadable => None,
        }
    }

    /// 用于 读-改-写 的原始值，不可读时视为 -1
    fn raw(self) -> i64 {
        match self {
            CounterReading::Value(value) => i64::from(value),
            CounterReading::Unreadable => -1,
        }
    }
}

/// 设备滚动计数器存储
#[derive(Debug, Clone)]
pub struct CounterStore {
    root: PathBuf,
}

impl CounterStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 设备计数器文件路径
    pub fn path_for(&self, device: &Device) -> PathBuf {
        self.root.join(format!("{}.{}", device.key, COUNTER_EXTENSION))
    }

    /// 读取计数器
    ///
    /// 文件不存在返回 [`CounterError::Missing`]，内容无法解析返回
    /// [`CounterReading::Unreadable`]（不报错）。
    pub fn read(&self, device: &Device) -> Result<CounterReading, CounterError> {
        let path = self.path_for(device);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(CounterError::Missing { path }),
            Err(source) => return Err(CounterError::Io { path, source }),
        };

        Ok(match content.trim().parse::<i64>() {
            Ok(raw) => CounterReading::Value(wrap_counter(raw)),
            Err(_) => CounterReading::Unreadable,
        })
    }

    /// 读取计数值，不可读时报错
    pub fn value(&self, device: &Device) -> Result<u16, CounterError> {
        self.read(device)?.value().ok_or_else(|| CounterError::Unreadable {
            path: self.path_for(device),
        })
    }

    /// 写入 `value mod 65536`，完整覆盖旧内容
    ///
    /// 目录不存在时自动创建；先写临时文件再原子重命名，崩溃时不会留下半截内容。
    pub fn save(&self, device: &Device, value: i64) -> Result<u16, CounterError> {
        let path = self.path_for(device);
        let stored = wrap_counter(value);
        let io_err = |source| CounterError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.root).map_err(io_err)?;

        let mut file = NamedTempFile::new_in(&self.root).map_err(io_err)?;
        write!(file, "{}", stored).map_err(io_err)?;
        file.as_file().sync_all().map_err(io_err)?;
        file.persist(&path).map_err(|e| io_err(e.error))?;

        debug!("Counter {} <- {}", device.key, stored);
        Ok(stored)
    }

    /// 手动设置计数值（维护用途）
    pub fn set(&self, device: &Device, value: i64) -> Result<u16, CounterError> {
        self.save(device, value)
    }

    /// 读取 + 1 后写回，返回新值
    pub fn increment(&self, device: &Device) -> Result<u16, CounterError> {
        let current = self.read(device)?;
        self.save(device, current.raw() + 1)
    }

    /// 读取 - 1 后写回，返回新值
    pub fn decrement(&self, device: &Device) -> Result<u16, CounterError> {
        let current = self.read(device)?;
        self.save(device, current.raw() - 1)
    }

    /// 确保计数器文件存在，不存在时以 0 创建
    pub fn ensure(&self, device: &Device) -> Result<CounterReading, CounterError> {
        match self.read(device) {
            Err(CounterError::Missing { .. }) => {
                self.save(device, 0)?;
                Ok(CounterReading::Value(0))
            },
            other => other,
        }
    }
}
