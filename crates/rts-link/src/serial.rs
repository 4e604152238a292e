//! 真实串口链路
//!
//! 基于 `serialport` crate，端口按硬件 ID（VID:PID）自动扫描。
//! 所有操作通过实例级 `parking_lot::Mutex` 串行化，锁守卫离开作用域即释放，
//! 包括错误路径。

use crate::{LinkError, SerialConfig, SerialLink, hardware_id, matches_hardware_id};
use parking_lot::Mutex;
use serialport::{ClearBuffer, SerialPort};
use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// 锁保护的端口状态
#[derive(Default)]
struct LinkState {
    port: Option<Box<dyn SerialPort>>,
    port_name: Option<String>,
}

impl LinkState {
    fn close(&mut self) -> bool {
        let was_open = self.port.take().is_some();
        self.port_name = None;
        was_open
    }
}

/// 串口发射器链路
pub struct SerialPortLink {
    config: SerialConfig,
    state: Mutex<LinkState>,
}

impl SerialPortLink {
    /// 创建链路（不打开端口）
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LinkState::default()),
        }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// 当前打开的端口名
    pub fn port_name(&self) -> Option<String> {
        self.state.lock().port_name.clone()
    }

    /// 查找第一个硬件 ID 匹配的端口（不持锁）
    fn find_port(&self) -> Result<String, LinkError> {
        serialport::available_ports()?
            .into_iter()
            .find(|port| matches_hardware_id(&hardware_id(&port.port_type), &self.config.vid_pid))
            .map(|port| port.port_name)
            .ok_or_else(|| LinkError::NotFound(self.config.vid_pid.clone()))
    }

    /// 打开端口并等待设备就绪（调用方持锁）
    fn open_port(&self, state: &mut LinkState, timeout: Duration) -> Result<(), LinkError> {
        // 先释放旧句柄，失败时端口保持关闭
        state.close();

        let name = self.find_port()?;
        let mut port = serialport::new(&name, self.config.baud_rate)
            .timeout(self.config.port_timeout)
            .open()?;

        // 设备上电后可能先输出启动信息，等待数据或超时
        let ready = self.wait_for_data(port.as_mut(), timeout)?;
        thread::sleep(self.config.settle_delay);

        debug!("Opened {} at {} baud (data ready: {})", name, self.config.baud_rate, ready);
        state.port = Some(port);
        state.port_name = Some(name);
        Ok(())
    }

    /// 轮询直到有数据可读或到达截止时间
    fn wait_for_data(&self, port: &mut dyn SerialPort, timeout: Duration) -> Result<bool, LinkError> {
        let deadline = Instant::now() + timeout;
        loop {
            if port.bytes_to_read()? > 0 {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            thread::sleep(self.config.poll_interval.min(deadline - now));
        }
    }

    /// 持续读取，直到没有立即可读的字节
    fn drain(&self, port: &mut dyn SerialPort) -> Result<Vec<u8>, LinkError> {
        let mut buffer = Vec::new();
        loop {
            let available = port.bytes_to_read()? as usize;
            if available == 0 {
                break;
            }

            let mut chunk = vec![0u8; available];
            match port.read(&mut chunk) {
                Ok(n) => buffer.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) => return Err(e.into()),
            }

            // 给发射器留出继续输出的时间
            thread::sleep(self.config.port_timeout);
        }
        Ok(buffer)
    }

    fn write_bytes(port: &mut dyn SerialPort, bytes: &[u8], flush: bool) -> Result<(), LinkError> {
        port.write_all(bytes)?;
        if flush {
            port.flush()?;
        }
        Ok(())
    }

    fn read_bytes(&self, port: &mut dyn SerialPort, timeout: Duration) -> Result<Vec<u8>, LinkError> {
        if !self.wait_for_data(port, timeout)? {
            return Ok(Vec::new());
        }
        self.drain(port)
    }
}

impl SerialLink for SerialPortLink {
    fn scan_port(&self) -> Option<String> {
        let _guard = self.state.lock();
        match self.find_port() {
            Ok(name) => Some(name),
            Err(e) => {
                debug!("Port scan failed: {}", e);
                None
            },
        }
    }

    fn connect(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        match self.open_port(&mut state, timeout) {
            Ok(()) => info!("Serial link connected on {:?}", state.port_name),
            Err(e) => warn!("Serial link connect failed: {}", e),
        }
        state.port.is_some()
    }

    fn disconnect(&self) -> bool {
        let mut state = self.state.lock();
        if state.close() {
            info!("Serial link disconnected");
        }
        state.port.is_none()
    }

    fn write(&self, bytes: &[u8], flush: bool) -> bool {
        let mut state = self.state.lock();
        let Some(port) = state.port.as_mut() else {
            return false;
        };

        match Self::write_bytes(port.as_mut(), bytes, flush) {
            Ok(()) => {
                trace!("TX {} bytes", bytes.len());
                true
            },
            Err(e) => {
                warn!("Serial write failed: {}", e);
                false
            },
        }
    }

    fn read_all(&self, timeout: Duration) -> Option<Vec<u8>> {
        let mut state = self.state.lock();
        let port = state.port.as_mut()?;

        match self.read_bytes(port.as_mut(), timeout) {
            Ok(bytes) => {
                trace!("RX {} bytes", bytes.len());
                Some(bytes)
            },
            Err(e) => {
                // 读失败通常意味着设备已拔出，关闭句柄让 check() 重新打开
                warn!("Serial read failed, closing port: {}", e);
                state.close();
                None
            },
        }
    }

    fn check(&self) -> bool {
        let mut state = self.state.lock();
        match self.find_port() {
            Ok(name) => {
                if state.port.is_some() && state.port_name.as_deref() == Some(name.as_str()) {
                    return true;
                }
                // 端口可枚举但句柄丢失或名称变化：静默重开
                if let Err(e) = self.open_port(&mut state, self.config.check_timeout) {
                    debug!("Silent reopen of {} failed: {}", name, e);
                }
                state.port.is_some()
            },
            Err(e) => {
                if state.close() {
                    warn!("Serial link lost: {}", e);
                }
                false
            },
        }
    }

    fn reset_input_buffer(&self) {
        let mut state = self.state.lock();
        if let Some(port) = state.port.as_mut()
            && let Err(e) = port.clear(ClearBuffer::Input)
        {
            warn!("Failed to clear input buffer: {}", e);
        }
    }

    fn is_open(&self) -> bool {
        self.state.lock().port.is_some()
    }
}
