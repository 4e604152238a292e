//! 计数器维护命令
//!
//! 直接操作计数器文件，不访问串口。用于遥控器与电机失步后的手动校正。

use super::load_settings;
use crate::GlobalOptions;
use anyhow::{Result, anyhow};
use clap::Subcommand;
use rts_driver::{CounterReading, CounterStore, Device, Settings};

#[derive(Subcommand, Debug)]
pub enum CounterCommand {
    /// 读取当前计数
    Get { shutter: String },

    /// 设置计数（取模 65536）
    Set {
        shutter: String,
        #[arg(allow_negative_numbers = true)]
        value: i64,
    },

    /// 计数 + 1
    Inc { shutter: String },

    /// 计数 - 1
    Dec { shutter: String },
}

impl CounterCommand {
    pub fn execute(&self, options: &GlobalOptions) -> Result<()> {
        let settings = load_settings(options)?;
        let store = CounterStore::new(settings.counters_path.clone());
        let value = self.apply(&settings, &store)?;
        println!("{}", value);
        Ok(())
    }

    fn apply(&self, settings: &Settings, store: &CounterStore) -> Result<String> {
        let device = |name: &str| -> Result<Device> {
            settings
                .device(name)
                .cloned()
                .ok_or_else(|| anyhow!("Unknown shutter: {:?}", name))
        };

        let value = match self {
            CounterCommand::Get { shutter } => match store.read(&device(shutter)?)? {
                CounterReading::Value(value) => value.to_string(),
                CounterReading::Unreadable => "unreadable".to_string(),
            },
            CounterCommand::Set { shutter, value } => store.set(&device(shutter)?, *value)?.to_string(),
            CounterCommand::Inc { shutter } => store.increment(&device(shutter)?)?.to_string(),
            CounterCommand::Dec { shutter } => store.decrement(&device(shutter)?)?.to_string(),
        };
        Ok(value)
    }
}
