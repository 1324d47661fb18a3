mod balances;
mod runner;

pub use balances::{BalanceEntry, BalanceReporter, BalanceSnapshot};
pub use runner::{CampaignRunner, CampaignSummary, RunnerSettings};
