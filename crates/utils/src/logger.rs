use std::fs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, fmt, Layer};
use tracing_subscriber::filter::{EnvFilter, LevelFilter, FilterFn};
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_appender::{non_blocking, rolling};
use time::macros::offset;

/// 交易提交日志 target (授权 / swap)
pub const TRADE_TARGET: &str = "trade_executor";
/// 活动进度日志 target (迭代 / 余额)
pub const CAMPAIGN_TARGET: &str = "campaign";

/// 日志管理器 - 基于target分类的日志系统
pub struct LoggerManager {
    _guards: Vec<non_blocking::WorkerGuard>,
}

impl LoggerManager {
    /// 初始化日志系统
    ///
    /// 日志分类：
    /// - 控制台: 按 `level` 过滤的全部日志
    /// - app.log: 通用应用日志
    /// - trade.log: 授权与 swap 交易日志
    /// - campaign.log: 活动迭代与余额日志
    pub fn init(log_dir: &str, level: &str) -> Self {
        let mut guards = Vec::new();

        // 创建日志目录
        fs::create_dir_all(log_dir).ok();

        // 配置时区为东八区 (UTC+8 上海时间)
        let timer = OffsetTime::new(
            offset!(+8),
            time::format_description::well_known::Rfc3339,
        );

        // 1. 控制台输出
        let console_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        let console_layer = fmt::layer()
            .compact()
            .with_target(true)
            .with_timer(timer.clone())
            .with_filter(console_filter);

        // 2. 通用应用日志 (app.log)
        let (app_writer, app_guard) = non_blocking(rolling::daily(log_dir, "app.log"));
        guards.push(app_guard);

        let app_layer = fmt::layer()
            .compact()
            .with_writer(app_writer)
            .with_ansi(false)
            .with_target(true)
            .with_timer(timer.clone())
            .with_filter(LevelFilter::INFO)
            .with_filter(FilterFn::new(|metadata| {
                !matches!(metadata.target(), TRADE_TARGET | CAMPAIGN_TARGET)
            }));

        // 3. 交易日志 (trade.log)
        let (trade_writer, trade_guard) = non_blocking(rolling::daily(log_dir, "trade.log"));
        guards.push(trade_guard);

        let trade_layer = fmt::layer()
            .compact()
            .with_writer(trade_writer)
            .with_ansi(false)
            .with_target(true)
            .with_timer(timer.clone())
            .with_filter(FilterFn::new(|metadata| {
                metadata.target() == TRADE_TARGET
            }));

        // 4. 活动日志 (campaign.log)
        let (campaign_writer, campaign_guard) = non_blocking(rolling::daily(log_dir, "campaign.log"));
        guards.push(campaign_guard);

        let campaign_layer = fmt::layer()
            .compact()
            .with_writer(campaign_writer)
            .with_ansi(false)
            .with_target(true)
            .with_timer(timer)
            .with_filter(FilterFn::new(|metadata| {
                metadata.target() == CAMPAIGN_TARGET
            }));

        // 初始化tracing订阅器
        tracing_subscriber::registry()
            .with(console_layer)
            .with(app_layer)
            .with(trade_layer)
            .with(campaign_layer)
            .init();

        Self { _guards: guards }
    }
}
