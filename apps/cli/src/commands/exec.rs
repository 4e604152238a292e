//! 执行单条命令

use super::{build_remote, print_result};
use crate::GlobalOptions;
use anyhow::{Result, bail};
use clap::Args;

/// 执行命令参数
#[derive(Args, Debug)]
pub struct ExecCommand {
    /// 命令文本，如 `send('figuier', 'up')` 或 `pulse(7, 250)`
    pub command: String,
}

impl ExecCommand {
    pub fn execute(&self, options: &GlobalOptions) -> Result<()> {
        let remote = build_remote(options)?;
        let result = remote.execute(&self.command)?;
        print_result(&result);

        if !result.verified {
            bail!("No response from the remote");
        }
        Ok(())
    }
}
