//! # RTS CLI
//!
//! Somfy RTS 串口遥控器命令行工具（one-shot 模式：加载配置 -> 连接 -> 执行 -> 退出）。
//!
//! ```bash
//! # 发送一条命令
//! rts-cli --config settings.json exec "send('figuier', 'up')"
//!
//! # 执行配方
//! rts-cli --config settings.json recipe night_down
//!
//! # 仅编码，不访问硬件
//! rts-cli frame 0x123456 5 up
//!
//! # 计数器维护
//! rts-cli --config settings.json counter get figuier
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{CounterCommand, ExecCommand, FrameCommand, PortsCommand, RecipeCommand};

/// 默认日志过滤
const DEFAULT_FILTER: &str = "rts_cli=info,rts_driver=info,rts_link=info";
const VERBOSE_FILTER: &str = "rts_cli=debug,rts_driver=debug,rts_link=debug";

/// RTS CLI - 卷帘遥控命令行工具
#[derive(Parser, Debug)]
#[command(name = "rts-cli")]
#[command(about = "Command-line interface for the Somfy RTS serial remote", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件（settings.json）
    #[arg(short, long, global = true, default_value = "settings.json")]
    config: PathBuf,

    /// 使用模拟链路（不访问串口）
    #[arg(long, global = true)]
    mock: bool,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 执行一条命令文本
    Exec {
        #[command(flatten)]
        args: ExecCommand,
    },

    /// 执行配置中的配方
    Recipe {
        #[command(flatten)]
        args: RecipeCommand,
    },

    /// 编码一帧（不访问硬件）
    Frame {
        #[command(flatten)]
        args: FrameCommand,
    },

    /// 计数器维护
    #[command(subcommand)]
    Counter(CounterCommand),

    /// 列出串口
    Ports {
        #[command(flatten)]
        args: PortsCommand,
    },
}

/// 公共选项
pub struct GlobalOptions {
    pub config: PathBuf,
    pub mock: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = GlobalOptions {
        config: cli.config,
        mock: cli.mock,
    };

    match cli.command {
        Commands::Exec { args } => args.execute(&options),
        Commands::Recipe { args } => args.execute(&options),
        Commands::Frame { args } => args.execute(),
        Commands::Counter(cmd) => cmd.execute(&options),
        Commands::Ports { args } => args.execute(&options),
    }
}
