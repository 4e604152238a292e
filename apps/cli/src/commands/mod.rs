//! 命令定义和实现

pub mod counter;
pub mod exec;
pub mod frame;
pub mod ports;
pub mod recipe;

pub use counter::CounterCommand;
pub use exec::ExecCommand;
pub use frame::FrameCommand;
pub use ports::PortsCommand;
pub use recipe::RecipeCommand;

use crate::GlobalOptions;
use anyhow::{Context, Result};
use rts_driver::{DeliveryResult, Remote, RemoteBuilder, Settings};
use tracing::{debug, warn};

/// 加载配置文件
pub fn load_settings(options: &GlobalOptions) -> Result<Settings> {
    Settings::load(&options.config)
        .with_context(|| format!("Failed to load settings from {}", options.config.display()))
}

/// 按全局选项构建遥控器
pub fn build_remote(options: &GlobalOptions) -> Result<Remote> {
    let mut builder = RemoteBuilder::new().settings(load_settings(options)?);
    if options.mock {
        debug!("Mock link forced from the command line");
        builder = builder.mock(true);
    }
    builder.build().context("Failed to initialise the remote")
}

/// 打印单次投递结果
pub fn print_result(result: &DeliveryResult) {
    let target = result.shutter.as_deref().unwrap_or("-");
    println!("TX [{}]: {}", target, String::from_utf8_lossy(&result.bytes_sent));
    println!("RX: {:?}", String::from_utf8_lossy(&result.bytes_received).trim_end());
    if result.verified {
        let counter = if result.counter_committed { "counter committed" } else { "counter unchanged" };
        println!("✅ 已确认（第 {} 次尝试，{}）", result.attempts, counter);
    } else {
        warn!("Remote did not echo {:?}", String::from_utf8_lossy(&result.bytes_sent));
        println!("❌ 遥控器无响应（{} 次尝试）", result.attempts);
    }
}
