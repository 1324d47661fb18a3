use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 代币描述
///
/// 只保存地址和符号。精度不缓存，需要时从合约重新读取。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub symbol: String,
    pub address: Address,
}

impl TokenDescriptor {
    pub fn new(symbol: impl Into<String>, address: Address) -> Self {
        Self {
            symbol: symbol.into(),
            address,
        }
    }

    pub fn is_native(&self) -> bool {
        is_native_sentinel(&self.address)
    }
}

impl fmt::Display for TokenDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.symbol, self.address)
    }
}

/// 原生资产占位地址
pub mod native_sentinel {
    use ethers::types::Address;
    use std::str::FromStr;

    lazy_static::lazy_static! {
        /// 常用的 0xEeee...EEeE 占位地址
        pub static ref EEEE: Address = Address::from_str("0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE").unwrap();
    }
}

/// 判断地址是否表示链的原生资产 (零地址或 0xEeee... 占位)
pub fn is_native_sentinel(address: &Address) -> bool {
    address.is_zero() || *address == *native_sentinel::EEEE
}
