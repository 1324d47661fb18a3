use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

/// swap 截止时间窗口 (秒)
pub const SWAP_DEADLINE_SECS: u64 = 10 * 60;

/// SwapRouter.exactInputSingle 的参数元组
///
/// 字段顺序与合约 ABI 一致:
/// (tokenIn, tokenOut, fee, recipient, deadline, amountIn, amountOutMinimum, sqrtPriceLimitX96)
pub type ExactInputSingleTuple = (Address, Address, u32, Address, U256, U256, U256, U256);

/// 单跳精确输入 swap 意图
///
/// 每次尝试都重新构造：deadline 在构造时确定，
/// 过期的意图不能原样重发。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapIntent {
    pub token_in: Address,
    pub token_out: Address,
    /// 池子费率 (500 = 0.05%, 3000 = 0.3%)
    pub fee: u32,
    pub recipient: Address,
    /// unix 秒
    pub deadline: U256,
    pub amount_in: U256,
    /// 恒为 0：接受任意输出
    pub amount_out_minimum: U256,
    /// 恒为 0：不设价格限制
    pub sqrt_price_limit_x96: U256,
}

impl SwapIntent {
    /// 以当前时间构造，deadline = now + 10 分钟
    pub fn new(token_in: Address, token_out: Address, fee: u32, recipient: Address, amount_in: U256) -> Self {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        Self::at(now, token_in, token_out, fee, recipient, amount_in)
    }

    /// 以指定的 unix 时间构造
    pub fn at(
        now_secs: u64,
        token_in: Address,
        token_out: Address,
        fee: u32,
        recipient: Address,
        amount_in: U256,
    ) -> Self {
        Self {
            token_in,
            token_out,
            fee,
            recipient,
            deadline: U256::from(now_secs + SWAP_DEADLINE_SECS),
            amount_in,
            amount_out_minimum: U256::zero(),
            sqrt_price_limit_x96: U256::zero(),
        }
    }

    pub fn into_tuple(self) -> ExactInputSingleTuple {
        (
            self.token_in,
            self.token_out,
            self.fee,
            self.recipient,
            self.deadline,
            self.amount_in,
            self.amount_out_minimum,
            self.sqrt_price_limit_x96,
        )
    }
}
