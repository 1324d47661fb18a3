use anyhow::{bail, Context, Result};
use ethers::types::Address;
use models::{Amount, CampaignPlan, DelayRange, PairPlan, TokenDescriptor};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// 支持的 V3 池子费率
pub const SUPPORTED_FEE_TIERS: [u32; 4] = [100, 500, 3000, 10000];

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub wallet: WalletConfig,
    pub contracts: ContractsConfig,
    pub swap: SwapConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// 网络名称，仅用于日志
    pub name: String,
    pub rpc_url: String,
    /// 未配置时从节点读取
    pub chain_id: Option<u64>,
    /// 原生代币符号 (ETH/BNB/MON 等)
    pub native_symbol: String,
}

#[derive(Clone)]
pub struct WalletConfig {
    pub private_key: String,
}

impl fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletConfig")
            .field("private_key", &"***")
            .finish()
    }
}

/// 链上合约地址
#[derive(Debug, Clone)]
pub struct ContractsConfig {
    /// SwapRouter 地址
    pub router: Address,
    pub usdt: Address,
    /// WETH (ERC-20)
    pub eth: Address,
    pub usdc: Address,
}

/// swap 参数 (来自 JSON 配置文件，缺省字段使用默认值)
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SwapConfig {
    pub usdt_amount: String,
    pub eth_amount: String,
    pub usdc_amount: String,
    pub usdt_decimals: u8,
    pub eth_decimals: u8,
    pub usdc_decimals: u8,
    pub usdt_to_eth_count: u32,
    pub eth_to_usdc_count: u32,
    pub usdc_to_usdt_count: u32,
    pub min_delay_secs: u64,
    pub max_delay_secs: u64,
    pub fee_tier: u32,
    pub approve_gas_limit: u64,
    pub swap_gas_limit: u64,
    pub gas_price_multiplier: f64,
    pub receipt_poll_interval_ms: u64,
    /// 不设置则无限等待确认
    pub confirmation_timeout_secs: Option<u64>,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            usdt_amount: "50".to_string(),
            eth_amount: "0.01".to_string(),
            usdc_amount: "50".to_string(),
            usdt_decimals: 6,
            eth_decimals: 18,
            usdc_decimals: 6,
            usdt_to_eth_count: 2,
            eth_to_usdc_count: 2,
            usdc_to_usdt_count: 2,
            min_delay_secs: 30,
            max_delay_secs: 90,
            fee_tier: 3000,
            approve_gas_limit: 100_000,
            swap_gas_limit: 300_000,
            gas_price_multiplier: 1.0,
            receipt_poll_interval_ms: 1000,
            confirmation_timeout_secs: None,
        }
    }
}

impl SwapConfig {
    /// 从 JSON 文本解析，未出现的字段取默认值
    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).context("Invalid swap config JSON")
    }

    /// 读取配置文件；文件不存在时使用默认值
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("⚠️ 配置文件 {} 不存在，使用默认参数", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&contents)
    }

    fn validate(&self) -> Result<()> {
        if self.min_delay_secs > self.max_delay_secs {
            bail!(
                "min_delay_secs ({}) must not exceed max_delay_secs ({})",
                self.min_delay_secs,
                self.max_delay_secs
            );
        }
        if !SUPPORTED_FEE_TIERS.contains(&self.fee_tier) {
            bail!("Unsupported fee_tier {}, expected one of {:?}", self.fee_tier, SUPPORTED_FEE_TIERS);
        }
        if !self.gas_price_multiplier.is_finite() || self.gas_price_multiplier <= 0.0 {
            bail!("gas_price_multiplier must be positive, got {}", self.gas_price_multiplier);
        }
        if self.approve_gas_limit == 0 || self.swap_gas_limit == 0 {
            bail!("Gas limits must be non-zero");
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub dir: String,
}

/// 加载 .env 文件到进程环境变量
///
/// 未指定路径时从当前目录向上查找 `.env`，找不到不报错。
/// 已存在的环境变量不会被覆盖。
pub fn load_env(env_file: Option<&Path>) -> Result<()> {
    match env_file {
        Some(path) => {
            dotenv::from_path(path).with_context(|| format!("Failed to load env file {}", path.display()))?;
        }
        None => {
            dotenv::dotenv().ok();
        }
    }
    Ok(())
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            dir: lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
        }
    }
}

impl AppConfig {
    /// 从环境变量与 JSON 配置文件加载 (需先调用 `load_env`)
    pub fn load(config_path: &Path) -> Result<Self> {
        let swap = SwapConfig::from_file(config_path)?;
        Self::from_sources(|key| env::var(key).ok(), swap)
    }

    /// 从指定的环境变量来源和 swap 参数构建配置
    pub fn from_sources<F>(lookup: F, swap: SwapConfig) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .with_context(|| format!("{} not set", key))
        };
        let address = |key: &str| -> Result<Address> {
            let raw = required(key)?;
            Address::from_str(&raw).with_context(|| format!("Invalid {}: {}", key, raw))
        };

        let network = NetworkConfig {
            name: required("NETWORK_NAME")?,
            rpc_url: required("RPC_URL")?,
            chain_id: match lookup("CHAIN_ID").filter(|s| !s.trim().is_empty()) {
                Some(raw) => Some(raw.trim().parse().context("Invalid CHAIN_ID")?),
                None => None,
            },
            native_symbol: lookup("NATIVE_SYMBOL")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "ETH".to_string()),
        };

        let wallet = WalletConfig {
            private_key: required("PRIVATE_KEY")?,
        };

        let contracts = ContractsConfig {
            router: address("ROUTER_ADDRESS")?,
            usdt: address("USDT_ADDRESS")?,
            eth: address("ETH_ADDRESS")?,
            usdc: address("USDC_ADDRESS")?,
        };

        let log = LogConfig::from_lookup(&lookup);

        swap.validate()?;

        let config = Self {
            network,
            wallet,
            contracts,
            swap,
            log,
        };

        // 金额在加载阶段解析，失败即退出
        config.campaign_plan()?;

        Ok(config)
    }

    /// 参与活动的三个代币
    pub fn tokens(&self) -> [TokenDescriptor; 3] {
        [
            TokenDescriptor::new("USDT", self.contracts.usdt),
            TokenDescriptor::new("ETH", self.contracts.eth),
            TokenDescriptor::new("USDC", self.contracts.usdc),
        ]
    }

    /// 生成活动计划: USDT -> ETH, ETH -> USDC, USDC -> USDT
    pub fn campaign_plan(&self) -> Result<CampaignPlan> {
        let [usdt, eth, usdc] = self.tokens();
        let s = &self.swap;

        let pairs = vec![
            Self::pair(usdt.clone(), eth.clone(), &s.usdt_amount, s.usdt_decimals, s.usdt_to_eth_count)?,
            Self::pair(eth, usdc.clone(), &s.eth_amount, s.eth_decimals, s.eth_to_usdc_count)?,
            Self::pair(usdc, usdt, &s.usdc_amount, s.usdc_decimals, s.usdc_to_usdt_count)?,
        ];

        let delay = DelayRange::new(s.min_delay_secs, s.max_delay_secs)
            .context("min_delay_secs must not exceed max_delay_secs")?;

        Ok(CampaignPlan { pairs, delay })
    }

    fn pair(
        token_in: TokenDescriptor,
        token_out: TokenDescriptor,
        amount: &str,
        decimals: u8,
        repetitions: u32,
    ) -> Result<PairPlan> {
        let amount = Amount::parse(amount, decimals)
            .with_context(|| format!("Invalid {} amount", token_in.symbol))?;
        if repetitions > 0 && amount.is_zero() {
            bail!("{} amount must be greater than zero", token_in.symbol);
        }

        Ok(PairPlan {
            token_in,
            token_out,
            amount,
            repetitions,
        })
    }
}
