//! 帧编码（离线）

use anyhow::{Context, Result};
use clap::Args;
use rts_protocol::{Action, Frame, parse_device_id, parse_literal, wrap_counter};

/// 编码命令参数
#[derive(Args, Debug)]
pub struct FrameCommand {
    /// 设备地址（十六进制，可带 0x）
    pub id: String,

    /// 滚动计数值（取模 65536）
    #[arg(allow_negative_numbers = true)]
    pub counter: i64,

    /// 命令名称或原始命令码（如 `up`、`0x2`）
    pub command: String,
}

impl FrameCommand {
    pub fn execute(&self) -> Result<()> {
        println!("{}", self.encode()?);
        Ok(())
    }

    fn encode(&self) -> Result<Frame> {
        let device_id = parse_device_id(&self.id).with_context(|| format!("Invalid device id {:?}", self.id))?;
        let action = match Action::from_name(&self.command) {
            Ok(action) => action,
            Err(_) => {
                let code = parse_literal(&self.command)
                    .with_context(|| format!("Unknown command {:?}", self.command))?;
                Action::raw(code)?
            },
        };
        Ok(Frame::for_action(action, wrap_counter(self.counter), device_id))
    }
}
