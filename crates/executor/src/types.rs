//! 执行器类型定义

use ethers::types::{Address, H256, U256};
use thiserror::Error;

/// 链上交互错误
///
/// 节点返回的错误文本只在链客户端边界分类一次，
/// 上层的恢复逻辑只依赖变体，不再匹配字符串。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// nonce 冲突 (nonce too low / replacement underpriced 等)
    #[error("Sequencing conflict: {0}")]
    SequencingConflict(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// 交易已上链但执行失败，nonce 已被消耗
    #[error("Transaction {tx_hash:?} reverted in block {block_number}")]
    Reverted {
        tx_hash: H256,
        block_number: u64,
        gas_used: U256,
    },

    #[error("Timeout waiting for transaction {0:?}")]
    Timeout(H256),

    #[error("Contract call failed: {0}")]
    Contract(String),

    #[error("Provider error: {0}")]
    Provider(String),
}

impl ChainError {
    /// 按节点错误文本分类发送错误
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        if lower.contains("nonce") || lower.contains("replacement transaction underpriced") {
            ChainError::SequencingConflict(message)
        } else if lower.contains("insufficient funds") {
            ChainError::InsufficientFunds(message)
        } else {
            ChainError::Provider(message)
        }
    }

    pub fn is_sequencing_conflict(&self) -> bool {
        matches!(self, ChainError::SequencingConflict(_))
    }
}

/// 单次授权 / swap 失败原因
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    /// 只支持 ERC20 -> ERC20，原生资产直接拒绝
    #[error("Native asset {0:?} is not supported on this route")]
    NativeAssetUnsupported(Address),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// nonce 获取失败，无法继续安全地排序交易
#[derive(Debug, Clone, Error)]
pub enum NonceError {
    #[error("Failed to fetch pending nonce: {0}")]
    Fetch(#[source] ChainError),
}

/// 已上链的交易回执
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: H256,
    pub block_number: u64,
    pub gas_used: U256,
}

/// Gas 设置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasSettings {
    /// approve 调用的固定 gas limit
    pub approve_gas_limit: u64,
    /// 单跳 swap 的固定 gas limit
    pub swap_gas_limit: u64,
    /// 基础 gas price 倍数 (1.0 = 当前 gas price)
    pub gas_price_multiplier: f64,
}

impl Default for GasSettings {
    fn default() -> Self {
        Self {
            approve_gas_limit: 100_000,
            swap_gas_limit: 300_000,
            gas_price_multiplier: 1.0,
        }
    }
}

impl GasSettings {
    pub fn apply_multiplier(&self, base_price: U256) -> U256 {
        if (self.gas_price_multiplier - 1.0).abs() < f64::EPSILON {
            return base_price;
        }
        U256::from((base_price.low_u128() as f64 * self.gas_price_multiplier) as u128)
    }
}

/// 授权检查结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalStatus {
    /// 当前额度已足够，未发送交易
    AlreadyApproved { allowance: U256 },
    /// 已发送并确认授权交易
    Approved(TxReceipt),
    Failed(ExecutionError),
}

impl ApprovalStatus {
    /// 是否可以继续 swap
    pub fn is_ready(&self) -> bool {
        !matches!(self, ApprovalStatus::Failed(_))
    }
}

/// swap 结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapStatus {
    Executed(TxReceipt),
    /// 前置检查未通过，未发生任何网络调用
    Rejected(ExecutionError),
    Failed(ExecutionError),
}

impl SwapStatus {
    pub fn is_executed(&self) -> bool {
        matches!(self, SwapStatus::Executed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_nonce_errors() {
        assert!(ChainError::classify("nonce too low").is_sequencing_conflict());
        assert!(ChainError::classify("(code: -32000, message: Nonce too high)").is_sequencing_conflict());
        assert!(ChainError::classify("replacement transaction underpriced").is_sequencing_conflict());
    }

    #[test]
    fn test_classify_other_errors() {
        assert!(matches!(
            ChainError::classify("insufficient funds for gas * price + value"),
            ChainError::InsufficientFunds(_)
        ));
        assert!(matches!(
            ChainError::classify("execution reverted: STF"),
            ChainError::Provider(_)
        ));
    }

    #[test]
    fn test_gas_multiplier() {
        let gas = GasSettings::default();
        assert_eq!(gas.apply_multiplier(U256::from(1_000u64)), U256::from(1_000u64));

        let gas = GasSettings {
            gas_price_multiplier: 1.5,
            ..Default::default()
        };
        assert_eq!(gas.apply_multiplier(U256::from(1_000u64)), U256::from(1_500u64));
    }

    #[test]
    fn test_status_helpers() {
        assert!(ApprovalStatus::AlreadyApproved { allowance: U256::one() }.is_ready());
        assert!(!ApprovalStatus::Failed(ExecutionError::NativeAssetUnsupported(Address::zero())).is_ready());
        assert!(!SwapStatus::Rejected(ExecutionError::NativeAssetUnsupported(Address::zero())).is_executed());
    }
}
