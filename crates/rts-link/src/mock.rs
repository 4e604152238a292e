//! 模拟链路
//!
//! 不访问任何硬件，所有操作都是确定性的成功。默认模式模拟发射器固件的
//! 回显行为（原样返回写入的行并追加 `\r\n`），因此上层的回显校验可以通过；
//! [`MockLink::silent`] 则从不回显，用于演练重试路径。
//!
//! 内部互斥锁只保护写入历史与待回显缓冲区，不是串口链路锁：
//! 不打开串口，也不做任何 IO。

use crate::SerialLink;
use parking_lot::Mutex;
use std::time::Duration;

/// 模拟端口名
pub const MOCK_PORT_NAME: &str = "mock";

#[derive(Debug, Default)]
struct MockState {
    /// 已写入的数据（按写入顺序）
    sent: Vec<Vec<u8>>,
    /// 待读取的回显
    pending: Vec<u8>,
}

/// 确定性模拟链路
#[derive(Debug)]
pub struct MockLink {
    echo: bool,
    // 记账锁：写入历史与待回显缓冲区
    state: Mutex<MockState>,
}

impl MockLink {
    /// 回环模拟：写入的数据在下一次 `read_all` 时回显
    pub fn new() -> Self {
        Self {
            echo: true,
            state: Mutex::new(MockState::default()),
        }
    }

    /// 静默模拟：写入成功但从不回显
    pub fn silent() -> Self {
        Self {
            echo: false,
            state: Mutex::new(MockState::default()),
        }
    }

    /// 已写入的数据
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.state.lock().sent.clone()
    }

    /// 写入次数
    pub fn write_count(&self) -> usize {
        self.state.lock().sent.len()
    }
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialLink for MockLink {
    fn scan_port(&self) -> Option<String> {
        Some(MOCK_PORT_NAME.to_string())
    }

    fn connect(&self, _timeout: Duration) -> bool {
        true
    }

    fn disconnect(&self) -> bool {
        true
    }

    fn reconnect(&self, _timeout: Duration) -> bool {
        true
    }

    fn write(&self, bytes: &[u8], _flush: bool) -> bool {
        let mut state = self.state.lock();
        state.sent.push(bytes.to_vec());
        if self.echo {
            state.pending.extend_from_slice(bytes);
            state.pending.extend_from_slice(b"\r\n");
        }
        true
    }

    fn read_all(&self, _timeout: Duration) -> Option<Vec<u8>> {
        Some(std::mem::take(&mut self.state.lock().pending))
    }

    fn check(&self) -> bool {
        true
    }

    fn reset_input_buffer(&self) {
        self.state.lock().pending.clear();
    }

    fn is_open(&self) -> bool {
        true
    }

    fn is_mock(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_lifecycle_always_succeeds() {
        let link = MockLink::new();
        assert!(link.is_mock());
        assert_eq!(link.scan_port().as_deref(), Some(MOCK_PORT_NAME));
        assert!(link.connect(Duration::from_secs(10)));
        assert!(link.check());
        assert!(link.reconnect(Duration::ZERO));
        assert!(link.disconnect());
        // 断开后仍视为打开：模拟链路没有真实状态
        assert!(link.is_open());
    }

    #[test]
    fn test_mock_echoes_written_line() {
        let link = MockLink::new();
        link.reset_input_buffer();
        assert!(link.write(b"A7 8A 8A 8F 9D A9 FF", true));

        let rx = link.read_all(Duration::ZERO).unwrap();
        assert_eq!(rx, b"A7 8A 8A 8F 9D A9 FF\r\n".to_vec());

        // 回显只读取一次
        assert_eq!(link.read_all(Duration::ZERO), Some(Vec::new()));
        assert_eq!(link.sent_frames(), vec![b"A7 8A 8A 8F 9D A9 FF".to_vec()]);
    }

    #[test]
    fn test_reset_discards_stale_echo() {
        let link = MockLink::new();
        link.write(b"stale", false);
        link.reset_input_buffer();
        assert_eq!(link.read_all(Duration::ZERO), Some(Vec::new()));
        assert_eq!(link.write_count(), 1);
    }

    #[test]
    fn test_silent_mock_never_echoes() {
        let link = MockLink::silent();
        assert!(link.write(b"pulse(7, 100)", true));
        assert_eq!(link.read_all(Duration::from_secs(10)), Some(Vec::new()));
        assert_eq!(link.write_count(), 1);
    }

    #[test]
    fn test_concurrent_writes_are_all_recorded() {
        let link = std::sync::Arc::new(MockLink::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let link = link.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        assert!(link.write(format!("line {i}").as_bytes(), false));
                        assert!(link.is_open());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(link.write_count(), 100);
        assert!(link.sent_frames().iter().all(|frame| frame.starts_with(b"line ")));
    }
}
