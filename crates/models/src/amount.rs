use ethers::types::U256;
use ethers::utils::{format_units, parse_units, ParseUnits};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 金额解析错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("Invalid amount '{value}' for {decimals} decimals: {reason}")]
    Invalid {
        value: String,
        decimals: u8,
        reason: String,
    },

    #[error("Negative amount not allowed: {0}")]
    Negative(String),
}

/// 带精度的代币数量
///
/// `raw` 是链上最小单位的整数值，`decimals` 是对应代币的精度。
/// 在配置加载时一次性构造，之后不再重复解析字符串。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub raw: U256,
    pub decimals: u8,
}

impl Amount {
    pub fn new(raw: U256, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    /// 从十进制字符串解析，例如 ("0.01", 18) -> 10^16
    pub fn parse(value: &str, decimals: u8) -> Result<Self, AmountError> {
        let trimmed = value.trim();
        let parsed = parse_units(trimmed, decimals as u32).map_err(|e| AmountError::Invalid {
            value: trimmed.to_string(),
            decimals,
            reason: e.to_string(),
        })?;

        match parsed {
            ParseUnits::U256(raw) => Ok(Self { raw, decimals }),
            ParseUnits::I256(_) => Err(AmountError::Negative(trimmed.to_string())),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }

    /// 按精度格式化为可读字符串
    pub fn to_display(&self) -> String {
        format_units(self.raw, self.decimals as u32).unwrap_or_else(|_| self.raw.to_string())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display())
    }
}
