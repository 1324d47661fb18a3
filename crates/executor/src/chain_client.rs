//! 链客户端
//!
//! 钱包维度的链上读写接口：余额 / 额度 / 精度 / gas price 查询，
//! 交易广播与确认等待。上层组件只依赖 `ChainClient` trait，
//! 测试中可替换为 mock 实现。

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::prelude::*;
use ethers::types::{Address, BlockNumber, TransactionRequest, H256, U256, U64};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::contracts::IERC20;
use crate::types::{ChainError, TxReceipt};

/// 链上读写接口
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// 钱包地址
    fn address(&self) -> Address;

    /// 包含 pending 交易的 nonce
    async fn pending_nonce(&self) -> Result<U256, ChainError>;

    /// 原生代币余额
    async fn native_balance(&self) -> Result<U256, ChainError>;

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError>;

    async fn token_decimals(&self, token: Address) -> Result<u8, ChainError>;

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256, ChainError>;

    async fn gas_price(&self) -> Result<U256, ChainError>;

    /// 签名并广播交易 (调用方需显式设置 gas / gas_price / nonce)
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<H256, ChainError>;

    /// 等待交易上链
    ///
    /// status = 0 的回执返回 `ChainError::Reverted`
    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<TxReceipt, ChainError>;
}

/// 回执轮询设置
#[derive(Debug, Clone, Copy)]
pub struct ReceiptPolling {
    pub poll_interval: Duration,
    /// None 表示一直等待
    pub timeout: Option<Duration>,
}

impl Default for ReceiptPolling {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: None,
        }
    }
}

/// 带签名的 HTTP 客户端
pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// 基于 ethers Middleware 的链客户端
pub struct EthersChainClient<M: Middleware + 'static> {
    client: Arc<M>,
    address: Address,
    polling: ReceiptPolling,
}

impl<M: Middleware + 'static> EthersChainClient<M> {
    pub fn new(client: Arc<M>, address: Address, polling: ReceiptPolling) -> Self {
        Self {
            client,
            address,
            polling,
        }
    }
}

impl EthersChainClient<SignerClient> {
    /// 连接节点并加载钱包
    ///
    /// chain_id 未配置时从节点读取
    pub async fn connect(
        rpc_url: &str,
        private_key: &str,
        chain_id: Option<u64>,
        polling: ReceiptPolling,
    ) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .with_context(|| format!("Invalid RPC_URL: {}", rpc_url))?
            .interval(polling.poll_interval);

        let chain_id = match chain_id {
            Some(id) => id,
            None => provider
                .get_chainid()
                .await
                .context("Failed to fetch chain id")?
                .as_u64(),
        };

        let wallet = private_key
            .parse::<LocalWallet>()
            .context("Invalid PRIVATE_KEY")?
            .with_chain_id(chain_id);
        let address = wallet.address();

        info!("✅ 钱包已加载: {:?} (chain_id={})", address, chain_id);

        let client = SignerMiddleware::new(provider, wallet);
        Ok(Self::new(Arc::new(client), address, polling))
    }
}

#[async_trait]
impl<M: Middleware + 'static> ChainClient for EthersChainClient<M> {
    fn address(&self) -> Address {
        self.address
    }

    async fn pending_nonce(&self) -> Result<U256, ChainError> {
        self.client
            .get_transaction_count(self.address, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| ChainError::Provider(e.to_string()))
    }

    async fn native_balance(&self) -> Result<U256, ChainError> {
        self.client
            .get_balance(self.address, None)
            .await
            .map_err(|e| ChainError::Provider(e.to_string()))
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        let erc20 = IERC20::new(token, self.client.clone());
        erc20
            .balance_of(owner)
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))
    }

    async fn token_decimals(&self, token: Address) -> Result<u8, ChainError> {
        let erc20 = IERC20::new(token, self.client.clone());
        erc20
            .decimals()
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256, ChainError> {
        let erc20 = IERC20::new(token, self.client.clone());
        erc20
            .allowance(owner, spender)
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))
    }

    async fn gas_price(&self) -> Result<U256, ChainError> {
        self.client
            .get_gas_price()
            .await
            .map_err(|e| ChainError::Provider(e.to_string()))
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<H256, ChainError> {
        self.client
            .send_transaction(tx, None)
            .await
            .map(|pending| pending.tx_hash())
            .map_err(|e| ChainError::classify(e.to_string()))
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<TxReceipt, ChainError> {
        let start = Instant::now();

        loop {
            if let Some(timeout) = self.polling.timeout {
                if start.elapsed() > timeout {
                    return Err(ChainError::Timeout(tx_hash));
                }
            }

            match self.client.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    let block_number = receipt.block_number.map(|n| n.as_u64()).unwrap_or(0);
                    let gas_used = receipt.gas_used.unwrap_or_default();

                    // 拜占庭分叉之前的回执没有 status 字段
                    if receipt.status == Some(U64::zero()) {
                        return Err(ChainError::Reverted {
                            tx_hash,
                            block_number,
                            gas_used,
                        });
                    }

                    debug!("交易确认成功: {:?} | Block: {}", tx_hash, block_number);
                    return Ok(TxReceipt {
                        tx_hash,
                        block_number,
                        gas_used,
                    });
                }
                Ok(None) => {
                    debug!("等待交易确认: {:?}", tx_hash);
                    tokio::time::sleep(self.polling.poll_interval).await;
                }
                Err(e) => {
                    warn!("获取交易回执失败: {:?}", e);
                    tokio::time::sleep(self.polling.poll_interval).await;
                }
            }
        }
    }
}
