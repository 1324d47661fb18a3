//! 应用启动引导模块
//!
//! 加载配置、连接节点、构建并运行 swap 活动

use anyhow::{Context, Result};
use campaign::{CampaignRunner, CampaignSummary, RunnerSettings};
use config_crate::AppConfig;
use executor::{
    ChainClient, EthersChainClient, GasSettings, NonceError, ReceiptPolling, SignerClient,
};
use std::future::Future;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// 应用程序实例
pub struct Application {
    config: AppConfig,
    client: Arc<EthersChainClient<SignerClient>>,
}

impl Application {
    /// 加载配置并连接节点
    pub async fn start(config_path: &Path) -> Result<Self> {
        info!("加载配置文件 {} ...", config_path.display());
        let config = AppConfig::load(config_path)?;
        Self::log_config(&config);

        let polling = Self::receipt_polling(&config);
        let client = EthersChainClient::connect(
            &config.network.rpc_url,
            &config.wallet.private_key,
            config.network.chain_id,
            polling,
        )
        .await
        .context("Failed to initialize chain client")?;

        Ok(Self {
            config,
            client: Arc::new(client),
        })
    }

    /// 运行 swap 活动直到结束或收到 Ctrl+C
    pub async fn run(self) -> Result<()> {
        let plan = self.config.campaign_plan()?;

        let mut runner = CampaignRunner::new(self.client.clone(), plan, self.runner_settings())
            .await
            .context("Failed to initialize nonce")?;

        self.log_startup_complete();

        if let Some(summary) = supervise(runner.run(), tokio::signal::ctrl_c()).await? {
            info!("========================================");
            info!("  活动完成");
            info!("  迭代: {}", summary.iterations);
            info!(
                "  授权: 发送 {} / 跳过 {} / 失败 {}",
                summary.approvals_sent, summary.approvals_skipped, summary.approval_failures
            );
            info!("  Swap: 成功 {} / 失败 {}", summary.swaps_succeeded, summary.swap_failures);
            info!("  Gas 合计: {}", summary.total_gas_used);
            info!("========================================");
        }

        Ok(())
    }

    fn runner_settings(&self) -> RunnerSettings {
        let swap = &self.config.swap;
        RunnerSettings {
            router: self.config.contracts.router,
            fee_tier: swap.fee_tier,
            gas: GasSettings {
                approve_gas_limit: swap.approve_gas_limit,
                swap_gas_limit: swap.swap_gas_limit,
                gas_price_multiplier: swap.gas_price_multiplier,
            },
            native_symbol: self.config.network.native_symbol.clone(),
            tracked_tokens: self.config.tokens().to_vec(),
        }
    }

    fn receipt_polling(config: &AppConfig) -> ReceiptPolling {
        ReceiptPolling {
            poll_interval: Duration::from_millis(config.swap.receipt_poll_interval_ms),
            timeout: config.swap.confirmation_timeout_secs.map(Duration::from_secs),
        }
    }

    fn log_config(config: &AppConfig) {
        let swap = &config.swap;
        info!("配置加载成功");
        info!("========================================");
        info!("网络: {} (chain_id={:?})", config.network.name, config.network.chain_id);
        info!("RPC: {}", config.network.rpc_url);
        info!("私钥: {}", mask_secret(&config.wallet.private_key));
        info!("路由合约: {:?}", config.contracts.router);
        info!("USDT: {:?}", config.contracts.usdt);
        info!("ETH:  {:?}", config.contracts.eth);
        info!("USDC: {:?}", config.contracts.usdc);
        info!("========================================");
        info!("USDT -> ETH:  {} USDT x {}", swap.usdt_amount, swap.usdt_to_eth_count);
        info!("ETH -> USDC:  {} ETH x {}", swap.eth_amount, swap.eth_to_usdc_count);
        info!("USDC -> USDT: {} USDC x {}", swap.usdc_amount, swap.usdc_to_usdt_count);
        info!("延迟: {}-{} 秒 | 费率: {}", swap.min_delay_secs, swap.max_delay_secs, swap.fee_tier);
        info!(
            "Gas limit: approve {} / swap {} | gas price 倍数: {}",
            swap.approve_gas_limit, swap.swap_gas_limit, swap.gas_price_multiplier
        );
        match swap.confirmation_timeout_secs {
            Some(secs) => info!("确认超时: {} 秒", secs),
            None => info!("确认超时: 不限"),
        }
    }

    fn log_startup_complete(&self) {
        info!("========================================");
        info!("  系统启动完成");
        info!("  钱包地址: {:?}", self.client.address());
        info!("  网络: {}", self.config.network.name);
        info!("========================================");
    }
}

/// 运行活动直到结束或收到退出信号
///
/// 收到退出信号返回 `Ok(None)`；信号监听安装失败视为错误。
async fn supervise<F, S>(campaign: F, shutdown: S) -> Result<Option<CampaignSummary>>
where
    F: Future<Output = Result<CampaignSummary, NonceError>>,
    S: Future<Output = io::Result<()>>,
{
    tokio::select! {
        result = campaign => {
            let summary = result.context("Campaign aborted")?;
            Ok(Some(summary))
        }
        signal = shutdown => {
            signal.context("Failed to listen for shutdown signal")?;
            warn!("🛑 收到退出信号，停止活动");
            Ok(None)
        }
    }
}

/// 只保留首尾各 4 个字符
fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// 设置 panic hook，确保 panic 信息写入日志
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("========================================");
        error!("!!! 系统发生 PANIC !!!");
        error!("========================================");
        error!("Panic 信息: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            error!(
                "发生位置: {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            );
        }
        if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            error!("Panic 消息: {}", s);
        }
        error!("========================================");
    }));
}
