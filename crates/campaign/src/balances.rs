//! 钱包余额快照

use ethers::types::U256;
use ethers::utils::format_units;
use executor::ChainClient;
use models::TokenDescriptor;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

const NATIVE_DECIMALS: u32 = 18;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceEntry {
    pub symbol: String,
    pub raw: U256,
    /// 按精度格式化后的数量
    pub display: String,
}

/// 某一时刻的余额，读取失败的条目被跳过
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub entries: Vec<BalanceEntry>,
}

impl BalanceSnapshot {
    pub fn get(&self, symbol: &str) -> Option<&BalanceEntry> {
        self.entries.iter().find(|e| e.symbol == symbol)
    }
}

impl fmt::Display for BalanceSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|e| format!("{}: {}", e.symbol, e.display))
            .collect();
        write!(f, "{}", parts.join(" | "))
    }
}

pub struct BalanceReporter<C: ChainClient + ?Sized> {
    client: Arc<C>,
    native_symbol: String,
    tokens: Vec<TokenDescriptor>,
}

impl<C: ChainClient + ?Sized> BalanceReporter<C> {
    pub fn new(client: Arc<C>, native_symbol: impl Into<String>, tokens: Vec<TokenDescriptor>) -> Self {
        Self {
            client,
            native_symbol: native_symbol.into(),
            tokens,
        }
    }

    /// 读取原生代币和所有跟踪代币的余额
    ///
    /// 精度每次都重新读取，不做缓存
    pub async fn snapshot(&self) -> BalanceSnapshot {
        let mut snapshot = BalanceSnapshot::default();

        match self.client.native_balance().await {
            Ok(raw) => snapshot.entries.push(entry(&self.native_symbol, raw, NATIVE_DECIMALS)),
            Err(e) => warn!(target: "campaign", "⚠️ 读取 {} 余额失败: {}", self.native_symbol, e),
        }

        let owner = self.client.address();
        for token in &self.tokens {
            let raw = match self.client.token_balance(token.address, owner).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(target: "campaign", "⚠️ 读取 {} 余额失败: {}", token.symbol, e);
                    continue;
                }
            };
            match self.client.token_decimals(token.address).await {
                Ok(decimals) => snapshot.entries.push(entry(&token.symbol, raw, decimals as u32)),
                Err(e) => warn!(target: "campaign", "⚠️ 读取 {} 精度失败: {}", token.symbol, e),
            }
        }

        snapshot
    }

    /// 读取并打印余额
    pub async fn report(&self, stage: &str) -> BalanceSnapshot {
        let snapshot = self.snapshot().await;
        info!(target: "campaign", "💰 [{}] 余额: {}", stage, snapshot);
        snapshot
    }
}

fn entry(symbol: &str, raw: U256, decimals: u32) -> BalanceEntry {
    let display = format_units(raw, decimals).unwrap_or_else(|_| raw.to_string());
    BalanceEntry {
        symbol: symbol.to_string(),
        raw,
        display,
    }
}
