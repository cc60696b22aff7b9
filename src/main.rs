mod cli;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use anyhow::Result;
use std::path::PathBuf;

/// JMX Monitoring Client
///
/// 通过录制的网关响应探测应用服务器、解析别名、生成 JVM 报告
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// 输出 JSON 格式 (默认输出人类可读文本)
    #[arg(long, global = true)]
    json: bool,

    /// 产品定义目录 (*.yaml / *.yml)
    #[arg(long, global = true)]
    products: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// 📋 列出别名目录
    Aliases,

    /// 🔍 自动探测产品 (多个录制文件并行探测)
    Detect {
        /// 录制的响应文件
        #[arg(short, long, required = true, num_args = 1..)]
        replay: Vec<PathBuf>,
    },

    /// 🧭 解析别名为 MBean 坐标
    Resolve {
        #[arg(short, long)]
        replay: PathBuf,

        /// 别名，如 MEMORY_HEAP_USED
        #[arg(short, long)]
        alias: String,
    },

    /// 📥 通过别名读取属性值
    Get {
        #[arg(short, long)]
        replay: PathBuf,

        #[arg(short, long)]
        alias: String,
    },

    /// ℹ️ 服务器与 JVM 报告
    Info {
        #[arg(short, long)]
        replay: PathBuf,

        /// 附带启动参数与系统属性
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志 (RUST_LOG 优先)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    cli::handle_command(args.command, args.json, args.products.as_deref())
}
