//! Swap 活动主循环
//!
//! 按计划顺序执行每个交易对：授权 -> swap -> 余额快照 -> 随机等待。
//! 单次迭代失败只记录日志，继续下一次；只有 nonce 无法同步时终止。

use ethers::types::{Address, U256};
use executor::{
    ApprovalController, ApprovalStatus, ChainClient, GasSettings, NonceError, NonceManager,
    SwapExecutor, SwapStatus,
};
use models::{CampaignPlan, PairPlan, TokenDescriptor};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::{info, warn};

use crate::balances::BalanceReporter;

/// 执行参数
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub router: Address,
    pub fee_tier: u32,
    pub gas: GasSettings,
    pub native_symbol: String,
    /// 余额快照中跟踪的代币
    pub tracked_tokens: Vec<TokenDescriptor>,
}

/// 活动统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignSummary {
    pub iterations: u64,
    pub approvals_sent: u64,
    pub approvals_skipped: u64,
    pub approval_failures: u64,
    pub swaps_succeeded: u64,
    pub swap_failures: u64,
    /// 授权 + swap 的 gas 合计
    pub total_gas_used: U256,
}

pub struct CampaignRunner<C: ChainClient + ?Sized> {
    plan: CampaignPlan,
    router: Address,
    nonce: NonceManager<C>,
    approvals: ApprovalController<C>,
    swaps: SwapExecutor<C>,
    balances: BalanceReporter<C>,
    rng: StdRng,
}

impl<C: ChainClient + ?Sized> CampaignRunner<C> {
    /// 创建运行器并读取初始 nonce
    pub async fn new(client: Arc<C>, plan: CampaignPlan, settings: RunnerSettings) -> Result<Self, NonceError> {
        let nonce = NonceManager::initialize(client.clone()).await?;
        info!(target: "campaign", "🔢 初始 nonce: {}", nonce.next());

        Ok(Self {
            plan,
            router: settings.router,
            nonce,
            approvals: ApprovalController::new(client.clone(), settings.gas),
            swaps: SwapExecutor::new(client.clone(), settings.router, settings.fee_tier, settings.gas),
            balances: BalanceReporter::new(client, settings.native_symbol, settings.tracked_tokens),
            rng: StdRng::from_entropy(),
        })
    }

    /// 替换延迟抽样用的随机源
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// 执行整个活动
    pub async fn run(&mut self) -> Result<CampaignSummary, NonceError> {
        let mut summary = CampaignSummary::default();

        info!(
            target: "campaign",
            "🚀 开始 swap 活动: {} 个交易对, 共 {} 次迭代, 延迟 {}-{} 秒",
            self.plan.pairs.len(),
            self.plan.total_iterations(),
            self.plan.delay.min_secs,
            self.plan.delay.max_secs
        );

        self.balances.report("初始").await;

        let pairs = self.plan.pairs.clone();
        for pair in &pairs {
            self.run_pair(pair, &mut summary).await?;
        }

        self.balances.report("最终").await;

        info!(
            target: "campaign",
            "🏁 活动结束: 迭代 {} | 授权 发送 {} 跳过 {} 失败 {} | Swap 成功 {} 失败 {} | Gas 合计 {}",
            summary.iterations,
            summary.approvals_sent,
            summary.approvals_skipped,
            summary.approval_failures,
            summary.swaps_succeeded,
            summary.swap_failures,
            summary.total_gas_used
        );

        Ok(summary)
    }

    async fn run_pair(&mut self, pair: &PairPlan, summary: &mut CampaignSummary) -> Result<(), NonceError> {
        let label = pair.label();

        if pair.repetitions == 0 {
            info!(target: "campaign", "⏭️ {} 重复次数为 0，跳过", label);
            return Ok(());
        }

        info!(
            target: "campaign",
            "📊 交易对 {}: 每次 {} {}, 共 {} 次",
            label, pair.amount, pair.token_in.symbol, pair.repetitions
        );

        for i in 0..pair.repetitions {
            summary.iterations += 1;
            info!(target: "campaign", "▶️ {} 第 {}/{} 次", label, i + 1, pair.repetitions);

            self.run_iteration(pair, summary).await?;

            if i + 1 < pair.repetitions {
                let delay = self.plan.delay.sample(&mut self.rng);
                info!(target: "campaign", "⏳ 等待 {} 秒...", delay.as_secs());
                tokio::time::sleep(delay).await;
            }
        }

        Ok(())
    }

    async fn run_iteration(&mut self, pair: &PairPlan, summary: &mut CampaignSummary) -> Result<(), NonceError> {
        let approval = self
            .approvals
            .ensure_approved(&mut self.nonce, &pair.token_in, self.router, pair.amount.raw)
            .await?;

        match &approval {
            ApprovalStatus::AlreadyApproved { .. } => summary.approvals_skipped += 1,
            ApprovalStatus::Approved(receipt) => {
                summary.approvals_sent += 1;
                summary.total_gas_used += receipt.gas_used;
            }
            ApprovalStatus::Failed(e) => {
                summary.approval_failures += 1;
                warn!(target: "campaign", "⚠️ {} 授权失败，跳过本次 swap: {}", pair.token_in.symbol, e);
                return Ok(());
            }
        }

        let status = self
            .swaps
            .swap(&mut self.nonce, &pair.token_in, &pair.token_out, pair.amount.raw)
            .await?;

        match status {
            SwapStatus::Executed(receipt) => {
                summary.swaps_succeeded += 1;
                summary.total_gas_used += receipt.gas_used;
                self.balances.report(&pair.label()).await;
            }
            SwapStatus::Rejected(e) | SwapStatus::Failed(e) => {
                summary.swap_failures += 1;
                warn!(target: "campaign", "⚠️ {} swap 未成功: {}", pair.label(), e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use executor::mock::{MockCall, MockChainClient};
    use executor::ChainError;
    use models::{Amount, DelayRange};
    use std::time::Duration;

    fn usdt() -> TokenDescriptor {
        TokenDescriptor::new("USDT", Address::from_low_u64_be(0x1001))
    }

    fn weth() -> TokenDescriptor {
        TokenDescriptor::new("ETH", Address::from_low_u64_be(0x1002))
    }

    fn usdc() -> TokenDescriptor {
        TokenDescriptor::new("USDC", Address::from_low_u64_be(0x1003))
    }

    fn router() -> Address {
        Address::from_low_u64_be(0xBEEF)
    }

    fn settings() -> RunnerSettings {
        RunnerSettings {
            router: router(),
            fee_tier: 500,
            gas: GasSettings::default(),
            native_symbol: "ETH".to_string(),
            tracked_tokens: vec![usdt(), weth(), usdc()],
        }
    }

    fn pair(token_in: TokenDescriptor, token_out: TokenDescriptor, raw: u64, repetitions: u32) -> PairPlan {
        PairPlan {
            token_in,
            token_out,
            amount: Amount::new(U256::from(raw), 6),
            repetitions,
        }
    }

    fn plan(pairs: Vec<PairPlan>, min: u64, max: u64) -> CampaignPlan {
        CampaignPlan {
            pairs,
            delay: DelayRange::new(min, max).unwrap(),
        }
    }

    async fn runner(client: &Arc<MockChainClient>, plan: CampaignPlan) -> CampaignRunner<MockChainClient> {
        CampaignRunner::new(client.clone(), plan, settings())
            .await
            .unwrap()
            .with_rng(StdRng::seed_from_u64(7))
    }

    /// 去掉余额快照相关的调用
    fn trade_calls(client: &MockChainClient) -> Vec<MockCall> {
        client
            .calls()
            .into_iter()
            .filter(|c| {
                !matches!(
                    c,
                    MockCall::NativeBalance | MockCall::TokenBalance(_) | MockCall::Decimals(_)
                )
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_pair_call_sequence() {
        let client = Arc::new(MockChainClient::new());
        client.set_pending_nonce(U256::from(3));
        let amount = 50_000_000u64;

        let mut runner = runner(&client, plan(vec![pair(usdt(), weth(), amount, 2)], 5, 5)).await;
        let summary = runner.run().await.unwrap();

        let allowance = MockCall::Allowance {
            token: usdt().address,
            spender: router(),
        };
        let expected = vec![
            MockCall::PendingNonce,
            // 第一次: 授权 + swap
            allowance.clone(),
            MockCall::GasPrice,
            MockCall::Send { to: usdt().address, nonce: U256::from(3) },
            MockCall::WaitReceipt(ethers::types::H256::from_low_u64_be(1)),
            MockCall::GasPrice,
            MockCall::Send { to: router(), nonce: U256::from(4) },
            MockCall::WaitReceipt(ethers::types::H256::from_low_u64_be(2)),
            // 第二次: 上次授权的额度仍然足够
            allowance,
            MockCall::GasPrice,
            MockCall::Send { to: router(), nonce: U256::from(5) },
            MockCall::WaitReceipt(ethers::types::H256::from_low_u64_be(3)),
        ];
        assert_eq!(trade_calls(&client), expected);

        assert_eq!(summary.iterations, 2);
        assert_eq!(summary.approvals_sent, 1);
        assert_eq!(summary.approvals_skipped, 1);
        assert_eq!(summary.swaps_succeeded, 2);
        // 50_000 + 2 * 150_000
        assert_eq!(summary.total_gas_used, U256::from(350_000u64));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sufficient_allowance_skips_approval() {
        let client = Arc::new(MockChainClient::new());
        client.set_allowance(usdt().address, router(), U256::MAX);

        let mut runner = runner(&client, plan(vec![pair(usdt(), weth(), 10, 3)], 0, 0)).await;
        let summary = runner.run().await.unwrap();

        assert_eq!(summary.approvals_skipped, 3);
        assert_eq!(summary.approvals_sent, 0);
        assert_eq!(summary.swaps_succeeded, 3);
        assert_eq!(client.send_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_only_between_iterations() {
        let client = Arc::new(MockChainClient::new());
        client.set_allowance(usdt().address, router(), U256::MAX);
        client.set_allowance(weth().address, router(), U256::MAX);

        let pairs = vec![pair(usdt(), weth(), 10, 3), pair(weth(), usdc(), 10, 1)];
        let mut runner = runner(&client, plan(pairs, 5, 5)).await;

        let start = tokio::time::Instant::now();
        runner.run().await.unwrap();

        // 3 次迭代之间等待 2 次，第二个交易对只有 1 次，不等待
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_random_delay_within_bounds() {
        let client = Arc::new(MockChainClient::new());
        client.set_allowance(usdt().address, router(), U256::MAX);

        let mut runner = runner(&client, plan(vec![pair(usdt(), weth(), 10, 4)], 2, 6)).await;

        let start = tokio::time::Instant::now();
        runner.run().await.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3 * 2));
        assert!(elapsed <= Duration::from_secs(3 * 6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_abort() {
        let client = Arc::new(MockChainClient::new());
        client.set_allowance(usdt().address, router(), U256::MAX);
        client.script_send_error(ChainError::InsufficientFunds("insufficient funds".to_string()));

        let mut runner = runner(&client, plan(vec![pair(usdt(), weth(), 10, 3)], 0, 0)).await;
        let summary = runner.run().await.unwrap();

        assert_eq!(summary.iterations, 3);
        assert_eq!(summary.swap_failures, 1);
        assert_eq!(summary.swaps_succeeded, 2);
        // 每次迭代最多一次 swap 尝试
        assert_eq!(client.send_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_approval_skips_swap() {
        let client = Arc::new(MockChainClient::new());
        client.script_send_error(ChainError::Provider("connection reset".to_string()));

        let mut runner = runner(&client, plan(vec![pair(usdt(), weth(), 10, 2)], 0, 0)).await;
        let summary = runner.run().await.unwrap();

        assert_eq!(summary.approval_failures, 1);
        assert_eq!(summary.approvals_sent, 1);
        assert_eq!(summary.swaps_succeeded, 1);
        // 失败的授权 + 第二次的授权和 swap
        assert_eq!(client.send_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_native_pair_rejected_and_campaign_continues() {
        let client = Arc::new(MockChainClient::new());
        client.set_allowance(usdt().address, router(), U256::MAX);
        let native = TokenDescriptor::new("ETH", Address::zero());

        let pairs = vec![pair(native, usdc(), 10, 1), pair(usdt(), weth(), 10, 1)];
        let mut runner = runner(&client, plan(pairs, 0, 0)).await;
        let summary = runner.run().await.unwrap();

        assert_eq!(summary.approval_failures, 1);
        assert_eq!(summary.swaps_succeeded, 1);
        assert_eq!(client.send_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_repetitions_skipped() {
        let client = Arc::new(MockChainClient::new());

        let mut runner = runner(&client, plan(vec![pair(usdt(), weth(), 10, 0)], 0, 0)).await;
        let summary = runner.run().await.unwrap();

        assert_eq!(summary, CampaignSummary::default());
        assert_eq!(trade_calls(&client), vec![MockCall::PendingNonce]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_failure_is_fatal() {
        let client = Arc::new(MockChainClient::new());
        client.set_allowance(usdt().address, router(), U256::MAX);

        let mut runner = runner(&client, plan(vec![pair(usdt(), weth(), 10, 3)], 0, 0)).await;

        client.script_send_error(ChainError::SequencingConflict("nonce too low".to_string()));
        client.fail_nonce_fetch(true);

        assert!(runner.run().await.is_err());
        assert_eq!(client.send_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_conflict_resync_then_continue() {
        let client = Arc::new(MockChainClient::new());
        client.set_pending_nonce(U256::from(10));
        client.set_allowance(usdt().address, router(), U256::MAX);

        let mut runner = runner(&client, plan(vec![pair(usdt(), weth(), 10, 2)], 0, 0)).await;

        // 外部交易占用了 nonce 10
        client.script_send_error(ChainError::SequencingConflict("nonce too low".to_string()));
        client.set_pending_nonce(U256::from(11));

        let summary = runner.run().await.unwrap();

        assert_eq!(summary.swap_failures, 1);
        assert_eq!(summary.swaps_succeeded, 1);
        let sent = client.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].nonce, Some(U256::from(11)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_swap_never_reuses_nonce() {
        let client = Arc::new(MockChainClient::new());
        client.set_pending_nonce(U256::from(20));
        client.set_allowance(usdt().address, router(), U256::MAX);

        let mut runner = runner(&client, plan(vec![pair(usdt(), weth(), 10, 3)], 1, 1)).await;

        // 第一次 swap 已被节点接受，但等待确认超时
        client.script_receipt_error(ChainError::Timeout(ethers::types::H256::from_low_u64_be(1)));

        let summary = runner.run().await.unwrap();

        assert_eq!(summary.swap_failures, 1);
        assert_eq!(summary.swaps_succeeded, 2);

        let mut nonces: Vec<U256> = client.sent().iter().filter_map(|tx| tx.nonce).collect();
        assert_eq!(nonces.len(), 3);
        nonces.dedup();
        assert_eq!(nonces, vec![U256::from(20), U256::from(21), U256::from(22)]);
    }
}
