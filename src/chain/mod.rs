//! EVM chain access: pool contract ABI, event decoding, and the
//! [`ChainClient`] trait production code and tests both talk to.

pub mod abi;
pub mod client;
pub mod events;

pub use client::{ChainClient, EthersChainClient, TxReceipt};
pub use events::DepositEvent;
