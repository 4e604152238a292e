//! 执行配方

use super::{build_remote, print_result};
use crate::GlobalOptions;
use anyhow::{Result, bail};
use clap::Args;
use rts_driver::{DeliveryResult, DriverError};
use tracing::warn;

/// 配方命令参数
#[derive(Args, Debug)]
pub struct RecipeCommand {
    /// 配方名称（settings.json 中的 `Recipes`）
    pub name: String,
}

impl RecipeCommand {
    pub fn execute(&self, options: &GlobalOptions) -> Result<()> {
        let remote = build_remote(options)?;
        let results = match remote.execute_recipe(&self.name) {
            Ok(results) => results,
            Err(DriverError::RecipeAborted { completed, source, .. }) => {
                warn!("Recipe {:?} stopped after {} step(s)", self.name, completed.len());
                print_steps(&completed);
                return Err((*source).into());
            },
            Err(e) => return Err(e.into()),
        };
        print_steps(&results);

        let failed = results.iter().filter(|r| !r.verified).count();
        if failed > 0 {
            bail!("{} of {} recipe steps were not acknowledged", failed, results.len());
        }
        Ok(())
    }
}

fn print_steps(results: &[DeliveryResult]) {
    for (index, result) in results.iter().enumerate() {
        println!("--- step {}/{} ---", index + 1, results.len());
        print_result(result);
    }
}
