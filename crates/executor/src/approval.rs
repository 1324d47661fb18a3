//! 代币授权控制器
//!
//! swap 之前确保路由合约拥有足够的 allowance。
//! 额度只授权本次 swap 的精确数量，不做无限授权。

use ethers::abi::AbiEncode;
use ethers::types::{Address, TransactionRequest, U256};
use models::TokenDescriptor;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::chain_client::ChainClient;
use crate::contracts::ApproveCall;
use crate::nonce_manager::NonceManager;
use crate::types::{ApprovalStatus, ChainError, ExecutionError, GasSettings, NonceError, TxReceipt};

pub struct ApprovalController<C: ChainClient + ?Sized> {
    client: Arc<C>,
    gas: GasSettings,
}

impl<C: ChainClient + ?Sized> ApprovalController<C> {
    pub fn new(client: Arc<C>, gas: GasSettings) -> Self {
        Self { client, gas }
    }

    /// 确保 spender 对 token 的额度 >= required
    ///
    /// 额度足够时不发送任何交易。否则发送一笔精确额度的 approve
    /// 并等待上链。失败不重试，只返回 `ApprovalStatus::Failed`；
    /// 只有 nonce 重新同步失败才返回 `Err`。
    pub async fn ensure_approved(
        &self,
        nonce: &mut NonceManager<C>,
        token: &TokenDescriptor,
        spender: Address,
        required: U256,
    ) -> Result<ApprovalStatus, NonceError> {
        if token.is_native() {
            warn!(target: "trade_executor", "⚠️ {} 是原生资产，无需也无法授权", token.symbol);
            return Ok(ApprovalStatus::Failed(ExecutionError::NativeAssetUnsupported(token.address)));
        }

        let owner = self.client.address();
        let allowance = match self.client.allowance(token.address, owner, spender).await {
            Ok(allowance) => allowance,
            Err(e) => {
                error!(target: "trade_executor", "❌ 读取 {} 授权额度失败: {}", token.symbol, e);
                return Ok(ApprovalStatus::Failed(e.into()));
            }
        };

        if allowance >= required {
            debug!(
                target: "trade_executor",
                "{} 授权额度充足: {} >= {}", token.symbol, allowance, required
            );
            return Ok(ApprovalStatus::AlreadyApproved { allowance });
        }

        info!(
            target: "trade_executor",
            "🔐 授权 {} 给路由合约: 当前 {} < 需要 {} (nonce={})",
            token.symbol, allowance, required, nonce.next()
        );

        match self.submit_approval(nonce.next(), token.address, spender, required).await {
            Ok(receipt) => {
                nonce.advance();
                info!(
                    target: "trade_executor",
                    "✅ {} 授权成功: {:?} | Block: {} | Gas: {}",
                    token.symbol, receipt.tx_hash, receipt.block_number, receipt.gas_used
                );
                Ok(ApprovalStatus::Approved(receipt))
            }
            Err(e) => {
                error!(target: "trade_executor", "❌ {} 授权失败: {}", token.symbol, e);
                if e.is_sequencing_conflict() {
                    warn!(target: "trade_executor", "💡 检测到 nonce 冲突，重新同步...");
                }
                nonce.reconcile(&e).await?;
                Ok(ApprovalStatus::Failed(e.into()))
            }
        }
    }

    async fn submit_approval(
        &self,
        nonce: U256,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxReceipt, ChainError> {
        let gas_price = self.gas.apply_multiplier(self.client.gas_price().await?);

        let data = ApproveCall { spender, amount }.encode();

        let tx = TransactionRequest::new()
            .from(self.client.address())
            .to(token)
            .data(data)
            .gas(self.gas.approve_gas_limit)
            .gas_price(gas_price)
            .nonce(nonce);

        let tx_hash = self.client.send_transaction(tx).await?;
        info!(target: "trade_executor", "📤 授权交易已发送: {:?}", tx_hash);

        self.client.wait_for_receipt(tx_hash).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCall, MockChainClient};
    use ethers::abi::AbiDecode;
    use ethers::types::H256;

    fn usdt() -> TokenDescriptor {
        TokenDescriptor::new("USDT", Address::from_low_u64_be(0x1001))
    }

    fn router() -> Address {
        Address::from_low_u64_be(0xBEEF)
    }

    async fn setup(initial_nonce: u64) -> (Arc<MockChainClient>, ApprovalController<MockChainClient>, NonceManager<MockChainClient>) {
        let client = Arc::new(MockChainClient::new());
        client.set_pending_nonce(U256::from(initial_nonce));
        let nonce = NonceManager::initialize(client.clone()).await.unwrap();
        let controller = ApprovalController::new(client.clone(), GasSettings::default());
        (client, controller, nonce)
    }

    #[tokio::test]
    async fn test_sufficient_allowance_sends_nothing() {
        let (client, controller, mut nonce) = setup(4).await;
        client.set_allowance(usdt().address, router(), U256::from(100));

        let status = controller
            .ensure_approved(&mut nonce, &usdt(), router(), U256::from(100))
            .await
            .unwrap();

        assert_eq!(status, ApprovalStatus::AlreadyApproved { allowance: U256::from(100) });
        assert_eq!(client.send_calls(), 0);
        assert_eq!(nonce.next(), U256::from(4));
    }

    #[tokio::test]
    async fn test_insufficient_allowance_sends_exact_approval() {
        let (client, controller, mut nonce) = setup(4).await;
        client.set_allowance(usdt().address, router(), U256::from(10));

        let status = controller
            .ensure_approved(&mut nonce, &usdt(), router(), U256::from(50))
            .await
            .unwrap();

        assert!(matches!(status, ApprovalStatus::Approved(_)));
        assert_eq!(client.send_calls(), 1);
        assert_eq!(nonce.next(), U256::from(5));

        let sent = client.sent();
        let tx = &sent[0];
        assert_eq!(tx.nonce, Some(U256::from(4)));
        assert_eq!(tx.gas, Some(U256::from(100_000u64)));
        assert_eq!(tx.gas_price, Some(U256::from(1_000_000_000u64)));

        // 精确额度，不是无限授权
        let call = ApproveCall::decode(tx.data.as_ref().unwrap().as_ref()).unwrap();
        assert_eq!(call.spender, router());
        assert_eq!(call.amount, U256::from(50));
        assert_eq!(client.allowance_of(usdt().address, router()), U256::from(50));
    }

    #[tokio::test]
    async fn test_nonce_conflict_triggers_single_resync() {
        let (client, controller, mut nonce) = setup(4).await;
        client.script_send_error(ChainError::SequencingConflict("nonce too low".to_string()));
        client.set_pending_nonce(U256::from(6));

        let status = controller
            .ensure_approved(&mut nonce, &usdt(), router(), U256::from(50))
            .await
            .unwrap();

        assert!(matches!(status, ApprovalStatus::Failed(ExecutionError::Chain(ChainError::SequencingConflict(_)))));
        assert_eq!(nonce.resync_count(), 1);
        assert_eq!(nonce.next(), U256::from(6));
        // initialize + resync
        assert_eq!(client.pending_nonce_calls(), 2);
    }

    #[tokio::test]
    async fn test_other_failure_keeps_nonce() {
        let (client, controller, mut nonce) = setup(4).await;
        client.script_send_error(ChainError::InsufficientFunds("insufficient funds".to_string()));

        let status = controller
            .ensure_approved(&mut nonce, &usdt(), router(), U256::from(50))
            .await
            .unwrap();

        assert!(!status.is_ready());
        assert_eq!(nonce.next(), U256::from(4));
        assert_eq!(nonce.resync_count(), 0);
        // 不重试
        assert_eq!(client.send_calls(), 1);
    }

    #[tokio::test]
    async fn test_reverted_approval_consumes_nonce() {
        let (client, controller, mut nonce) = setup(4).await;
        client.script_receipt_error(ChainError::Reverted {
            tx_hash: H256::from_low_u64_be(1),
            block_number: 10,
            gas_used: U256::from(40_000),
        });

        let status = controller
            .ensure_approved(&mut nonce, &usdt(), router(), U256::from(50))
            .await
            .unwrap();

        assert!(!status.is_ready());
        assert_eq!(nonce.next(), U256::from(5));
    }

    #[tokio::test]
    async fn test_native_token_rejected_without_network() {
        let (client, controller, mut nonce) = setup(0).await;
        let eth = TokenDescriptor::new("ETH", Address::zero());

        let status = controller
            .ensure_approved(&mut nonce, &eth, router(), U256::from(1))
            .await
            .unwrap();

        assert_eq!(status, ApprovalStatus::Failed(ExecutionError::NativeAssetUnsupported(Address::zero())));
        assert_eq!(client.calls(), vec![MockCall::PendingNonce]);
    }

    #[tokio::test]
    async fn test_tokens_checked_independently() {
        let (client, controller, mut nonce) = setup(0).await;
        let usdc = TokenDescriptor::new("USDC", Address::from_low_u64_be(0x1003));
        client.set_allowance(usdt().address, router(), U256::from(1_000));

        // USDT 额度充足不代表 USDC 也已授权
        let first = controller.ensure_approved(&mut nonce, &usdt(), router(), U256::from(10)).await.unwrap();
        let second = controller.ensure_approved(&mut nonce, &usdc, router(), U256::from(10)).await.unwrap();

        assert!(matches!(first, ApprovalStatus::AlreadyApproved { .. }));
        assert!(matches!(second, ApprovalStatus::Approved(_)));
        assert_eq!(client.send_calls(), 1);
    }
}
