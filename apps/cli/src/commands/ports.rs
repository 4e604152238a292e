//! 串口列表

use super::load_settings;
use crate::GlobalOptions;
use anyhow::Result;
use clap::Args;
use rts_link::{list_ports, matches_hardware_id};

/// 列出串口参数
#[derive(Args, Debug)]
pub struct PortsCommand {
    /// VID:PID 过滤（默认取配置中的 `UART.VID_SR`）
    #[arg(long)]
    pub vid_pid: Option<String>,
}

impl PortsCommand {
    pub fn execute(&self, options: &GlobalOptions) -> Result<()> {
        let vid_pid = match &self.vid_pid {
            Some(vid_pid) => Some(vid_pid.clone()),
            None => load_settings(options)
                .ok()
                .and_then(|settings| settings.uart.map(|uart| uart.vid_pid)),
        };

        let ports = list_ports()?;
        if ports.is_empty() {
            println!("未发现串口");
            return Ok(());
        }

        for port in ports {
            let marker = match &vid_pid {
                Some(vid_pid) if matches_hardware_id(&port.hardware_id, vid_pid) => "*",
                _ => " ",
            };
            println!("{} {:<20} {}", marker, port.name, port.hardware_id);
        }
        Ok(())
    }
}
