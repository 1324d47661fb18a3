//! 测试用链客户端
//!
//! 记录所有调用，支持脚本化的发送 / 确认失败。
//! nonce 低于 pending 计数的交易按节点行为拒绝；
//! 发送成功时 pending nonce 加一；授权交易确认后自动更新额度。

use async_trait::async_trait;
use ethers::abi::AbiDecode;
use ethers::types::{Address, NameOrAddress, TransactionRequest, H256, U256};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use crate::chain_client::ChainClient;
use crate::contracts::ApproveCall;
use crate::types::{ChainError, TxReceipt};

/// 记录的调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    PendingNonce,
    NativeBalance,
    TokenBalance(Address),
    Decimals(Address),
    Allowance { token: Address, spender: Address },
    GasPrice,
    Send { to: Address, nonce: U256 },
    WaitReceipt(H256),
}

#[derive(Default)]
struct MockState {
    pending_nonce: U256,
    fail_nonce_fetch: bool,
    native_balance: U256,
    balances: HashMap<Address, U256>,
    decimals: HashMap<Address, u8>,
    allowances: HashMap<(Address, Address), U256>,
    gas_price: U256,
    send_script: VecDeque<ChainError>,
    receipt_script: VecDeque<ChainError>,
    fail_balance_reads: bool,
    pending: HashMap<H256, TransactionRequest>,
    sent: Vec<TransactionRequest>,
    calls: Vec<MockCall>,
    next_hash: u64,
}

pub struct MockChainClient {
    address: Address,
    state: Mutex<MockState>,
}

impl Default for MockChainClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChainClient {
    pub fn new() -> Self {
        Self::with_address(Address::from_low_u64_be(0xA11CE))
    }

    pub fn with_address(address: Address) -> Self {
        let state = MockState {
            gas_price: U256::from(1_000_000_000u64),
            ..Default::default()
        };
        Self {
            address,
            state: Mutex::new(state),
        }
    }

    pub fn set_pending_nonce(&self, nonce: U256) {
        self.state.lock().pending_nonce = nonce;
    }

    pub fn fail_nonce_fetch(&self, fail: bool) {
        self.state.lock().fail_nonce_fetch = fail;
    }

    pub fn set_native_balance(&self, balance: U256) {
        self.state.lock().native_balance = balance;
    }

    pub fn set_token(&self, token: Address, decimals: u8, balance: U256) {
        let mut state = self.state.lock();
        state.decimals.insert(token, decimals);
        state.balances.insert(token, balance);
    }

    pub fn set_allowance(&self, token: Address, spender: Address, amount: U256) {
        self.state.lock().allowances.insert((token, spender), amount);
    }

    pub fn fail_balance_reads(&self, fail: bool) {
        self.state.lock().fail_balance_reads = fail;
    }

    /// 下一次发送失败
    pub fn script_send_error(&self, error: ChainError) {
        self.state.lock().send_script.push_back(error);
    }

    /// 下一次等待确认失败 (交易已被接受)
    pub fn script_receipt_error(&self, error: ChainError) {
        self.state.lock().receipt_script.push_back(error);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    /// 已广播的交易
    pub fn sent(&self) -> Vec<TransactionRequest> {
        self.state.lock().sent.clone()
    }

    pub fn pending_nonce_calls(&self) -> usize {
        self.count(|c| matches!(c, MockCall::PendingNonce))
    }

    pub fn send_calls(&self) -> usize {
        self.count(|c| matches!(c, MockCall::Send { .. }))
    }

    pub fn allowance_of(&self, token: Address, spender: Address) -> U256 {
        self.state
            .lock()
            .allowances
            .get(&(token, spender))
            .copied()
            .unwrap_or_default()
    }

    fn count(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }
}

fn target_of(tx: &TransactionRequest) -> Address {
    match &tx.to {
        Some(NameOrAddress::Address(addr)) => *addr,
        _ => Address::zero(),
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn address(&self) -> Address {
        self.address
    }

    async fn pending_nonce(&self) -> Result<U256, ChainError> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::PendingNonce);
        if state.fail_nonce_fetch {
            return Err(ChainError::Provider("connection refused".to_string()));
        }
        Ok(state.pending_nonce)
    }

    async fn native_balance(&self) -> Result<U256, ChainError> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::NativeBalance);
        if state.fail_balance_reads {
            return Err(ChainError::Provider("balance unavailable".to_string()));
        }
        Ok(state.native_balance)
    }

    async fn token_balance(&self, token: Address, _owner: Address) -> Result<U256, ChainError> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::TokenBalance(token));
        if state.fail_balance_reads {
            return Err(ChainError::Contract("balanceOf reverted".to_string()));
        }
        Ok(state.balances.get(&token).copied().unwrap_or_default())
    }

    async fn token_decimals(&self, token: Address) -> Result<u8, ChainError> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Decimals(token));
        Ok(state.decimals.get(&token).copied().unwrap_or(18))
    }

    async fn allowance(&self, token: Address, _owner: Address, spender: Address) -> Result<U256, ChainError> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Allowance { token, spender });
        Ok(state.allowances.get(&(token, spender)).copied().unwrap_or_default())
    }

    async fn gas_price(&self) -> Result<U256, ChainError> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::GasPrice);
        Ok(state.gas_price)
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<H256, ChainError> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Send {
            to: target_of(&tx),
            nonce: tx.nonce.unwrap_or_default(),
        });

        if let Some(error) = state.send_script.pop_front() {
            return Err(error);
        }

        let nonce = tx.nonce.unwrap_or_default();
        if nonce < state.pending_nonce {
            return Err(ChainError::SequencingConflict(format!(
                "nonce too low: next nonce {}, tx nonce {}",
                state.pending_nonce, nonce
            )));
        }

        state.next_hash += 1;
        let hash = H256::from_low_u64_be(state.next_hash);
        state.pending_nonce += U256::one();
        state.sent.push(tx.clone());
        state.pending.insert(hash, tx);
        Ok(hash)
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<TxReceipt, ChainError> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::WaitReceipt(tx_hash));

        let tx = state
            .pending
            .remove(&tx_hash)
            .ok_or_else(|| ChainError::Provider(format!("unknown transaction {:?}", tx_hash)))?;

        if let Some(error) = state.receipt_script.pop_front() {
            return Err(error);
        }

        // 授权交易确认后更新额度
        if let Some(data) = tx.data.as_ref() {
            if let Ok(call) = ApproveCall::decode(data.as_ref()) {
                let token = target_of(&tx);
                state.allowances.insert((token, call.spender), call.amount);
            }
        }

        Ok(TxReceipt {
            tx_hash,
            block_number: 100 + state.next_hash,
            gas_used: tx.gas.unwrap_or_default() / U256::from(2),
        })
    }
}
