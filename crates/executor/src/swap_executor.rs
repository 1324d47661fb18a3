//! Swap 执行器
//!
//! 构造并发送单跳 exactInputSingle 交易，等待上链。
//! 只支持 ERC20 -> ERC20，不附带 value。

use ethers::abi::AbiEncode;
use ethers::types::{Address, TransactionRequest, U256};
use models::{SwapIntent, TokenDescriptor};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::chain_client::ChainClient;
use crate::contracts::ExactInputSingleCall;
use crate::nonce_manager::NonceManager;
use crate::types::{ChainError, ExecutionError, GasSettings, NonceError, SwapStatus, TxReceipt};

pub struct SwapExecutor<C: ChainClient + ?Sized> {
    client: Arc<C>,
    router: Address,
    fee_tier: u32,
    gas: GasSettings,
}

impl<C: ChainClient + ?Sized> SwapExecutor<C> {
    pub fn new(client: Arc<C>, router: Address, fee_tier: u32, gas: GasSettings) -> Self {
        Self {
            client,
            router,
            fee_tier,
            gas,
        }
    }

    /// 执行一次精确输入 swap
    ///
    /// 输出最小值与价格限制都为 0，收款地址为钱包自身。
    /// 失败不重试；只有 nonce 重新同步失败才返回 `Err`。
    pub async fn swap(
        &self,
        nonce: &mut NonceManager<C>,
        token_in: &TokenDescriptor,
        token_out: &TokenDescriptor,
        amount_in: U256,
    ) -> Result<SwapStatus, NonceError> {
        if let Some(native) = [token_in, token_out].into_iter().find(|t| t.is_native()) {
            warn!(
                target: "trade_executor",
                "⚠️ 拒绝 swap {} -> {}: {} 是原生资产，该路由只支持 ERC20",
                token_in.symbol, token_out.symbol, native.symbol
            );
            return Ok(SwapStatus::Rejected(ExecutionError::NativeAssetUnsupported(native.address)));
        }

        let intent = SwapIntent::new(
            token_in.address,
            token_out.address,
            self.fee_tier,
            self.client.address(),
            amount_in,
        );

        info!(
            target: "trade_executor",
            "🔄 Swap {} -> {} | 数量(raw): {} | 费率: {} | nonce: {}",
            token_in.symbol, token_out.symbol, amount_in, self.fee_tier, nonce.next()
        );

        match self.submit_swap(nonce.next(), intent).await {
            Ok(receipt) => {
                nonce.advance();
                info!(
                    target: "trade_executor",
                    "✅ Swap 成功: {:?} | Block: {} | Gas Used: {}",
                    receipt.tx_hash, receipt.block_number, receipt.gas_used
                );
                Ok(SwapStatus::Executed(receipt))
            }
            Err(e) => {
                error!(
                    target: "trade_executor",
                    "❌ Swap {} -> {} 失败: {}", token_in.symbol, token_out.symbol, e
                );
                if e.is_sequencing_conflict() {
                    warn!(target: "trade_executor", "💡 检测到 nonce 冲突，重新同步...");
                }
                nonce.reconcile(&e).await?;
                Ok(SwapStatus::Failed(e.into()))
            }
        }
    }

    async fn submit_swap(&self, nonce: U256, intent: SwapIntent) -> Result<TxReceipt, ChainError> {
        let gas_price = self.gas.apply_multiplier(self.client.gas_price().await?);

        let data = ExactInputSingleCall {
            params: intent.into_tuple(),
        }
        .encode();

        let tx = TransactionRequest::new()
            .from(self.client.address())
            .to(self.router)
            .data(data)
            .gas(self.gas.swap_gas_limit)
            .gas_price(gas_price)
            .nonce(nonce);

        let tx_hash = self.client.send_transaction(tx).await?;
        info!(target: "trade_executor", "📤 Swap 交易已发送: {:?}", tx_hash);

        self.client.wait_for_receipt(tx_hash).await
    }
}
