use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{Amount, TokenDescriptor};

/// 单个交易对的执行计划
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairPlan {
    pub token_in: TokenDescriptor,
    pub token_out: TokenDescriptor,
    /// 每次 swap 的输入金额 (token_in 的精度)
    pub amount: Amount,
    /// 重复次数
    pub repetitions: u32,
}

impl PairPlan {
    pub fn label(&self) -> String {
        format!("{} -> {}", self.token_in.symbol, self.token_out.symbol)
    }
}

/// 迭代间随机延迟区间 (秒，两端包含)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_secs: u64,
    pub max_secs: u64,
}

impl DelayRange {
    /// min > max 时返回 None
    pub fn new(min_secs: u64, max_secs: u64) -> Option<Self> {
        if min_secs > max_secs {
            return None;
        }
        Some(Self { min_secs, max_secs })
    }

    /// 均匀抽取整秒延迟
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_secs(rng.gen_range(self.min_secs..=self.max_secs))
    }
}

/// 完整的 swap 活动计划，加载后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignPlan {
    pub pairs: Vec<PairPlan>,
    pub delay: DelayRange,
}

impl CampaignPlan {
    /// 计划内的总迭代数 (交易对 × 重复次数)
    pub fn total_iterations(&self) -> u64 {
        self.pairs.iter().map(|p| p.repetitions as u64).sum()
    }
}
