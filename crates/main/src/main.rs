mod bootstrap;

use anyhow::Result;
use clap::Parser;
use config_crate::LogConfig;
use std::path::PathBuf;
use tracing::{error, info};
use utils::LoggerManager;

use crate::bootstrap::{setup_panic_hook, Application};

#[derive(Parser, Debug)]
#[command(name = "swap_volume_bot")]
#[command(about = "DEX swap 交易量机器人")]
struct Cli {
    /// swap 参数 JSON 文件 (不存在时使用默认参数)
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// .env 文件路径 (默认从当前目录查找)
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 日志目录和级别来自环境变量，需先加载 .env
    if let Err(e) = config_crate::load_env(cli.env_file.as_deref()) {
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }

    let log = LogConfig::from_env();
    let logger = LoggerManager::init(&log.dir, &log.level);

    setup_panic_hook();

    info!("========================================");
    info!("  DEX Swap 交易量机器人启动");
    info!("========================================");

    let code = match run(&cli).await {
        Ok(()) => 0,
        Err(e) => {
            error!("❌ 运行失败: {:#}", e);
            1
        }
    };

    // 退出前刷新日志文件
    drop(logger);
    std::process::exit(code);
}

async fn run(cli: &Cli) -> Result<()> {
    let app = Application::start(&cli.config).await?;
    app.run().await
}
