mod logger;

pub use logger::{LoggerManager, CAMPAIGN_TARGET, TRADE_TARGET};
