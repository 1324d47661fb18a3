//! 交易执行模块
//!
//! 负责与链交互：授权、swap 与 nonce 排序
//!
//! ## 模块结构
//!
//! - `chain_client`: 链上读写接口及 ethers 实现
//! - `nonce_manager`: 钱包 nonce 的唯一来源
//! - `approval`: ERC20 授权检查与发送
//! - `swap_executor`: exactInputSingle 单跳 swap
//! - `contracts`: 路由与 ERC20 合约 ABI 绑定
//! - `types`: 类型定义

mod approval;
mod chain_client;
mod contracts;
mod nonce_manager;
mod swap_executor;
mod types;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use approval::ApprovalController;
pub use chain_client::{ChainClient, EthersChainClient, ReceiptPolling, SignerClient};
pub use contracts::{ApproveCall, ExactInputSingleCall, IERC20, SwapRouter};
pub use nonce_manager::NonceManager;
pub use swap_executor::SwapExecutor;
pub use types::{
    ApprovalStatus, ChainError, ExecutionError, GasSettings, NonceError, SwapStatus, TxReceipt,
};
