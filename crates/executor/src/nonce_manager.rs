//! Nonce 管理器
//!
//! 钱包下一笔交易 nonce 的唯一来源。由活动主循环持有，
//! 以 `&mut` 借给授权和 swap 组件，单写者，无需加锁。

use ethers::types::U256;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::chain_client::ChainClient;
use crate::types::{ChainError, NonceError};

pub struct NonceManager<C: ChainClient + ?Sized> {
    client: Arc<C>,
    current: U256,
    resyncs: u64,
}

impl<C: ChainClient + ?Sized> NonceManager<C> {
    /// 从链上 pending 视图读取初始 nonce，失败即致命
    pub async fn initialize(client: Arc<C>) -> Result<Self, NonceError> {
        let current = client.pending_nonce().await.map_err(NonceError::Fetch)?;
        debug!("初始 nonce: {}", current);

        Ok(Self {
            client,
            current,
            resyncs: 0,
        })
    }

    /// 下一笔交易使用的 nonce (不递增)
    pub fn next(&self) -> U256 {
        self.current
    }

    /// 交易被节点接受并上链后调用
    pub fn advance(&mut self) {
        self.current += U256::one();
    }

    /// 丢弃本地值，重新读取链上 pending nonce
    pub async fn resync(&mut self) -> Result<U256, NonceError> {
        let fresh = self.client.pending_nonce().await.map_err(NonceError::Fetch)?;
        warn!("🔄 Nonce 重新同步: {} -> {}", self.current, fresh);

        self.current = fresh;
        self.resyncs += 1;
        Ok(fresh)
    }

    /// 已执行的重新同步次数
    pub fn resync_count(&self) -> u64 {
        self.resyncs
    }

    /// 根据失败类型修正 nonce
    ///
    /// - nonce 冲突: 重新同步一次
    /// - 确认超时: 交易仍在 mempool 中占用该 nonce，重新同步一次
    /// - 已上链但 revert: nonce 已消耗，递增
    /// - 其他错误: 交易未被接受，保持不变
    pub async fn reconcile(&mut self, error: &ChainError) -> Result<(), NonceError> {
        match error {
            ChainError::SequencingConflict(_) | ChainError::Timeout(_) => {
                self.resync().await?;
            }
            ChainError::Reverted { .. } => self.advance(),
            _ => {}
        }
        Ok(())
    }
}
