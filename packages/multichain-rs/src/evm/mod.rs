//! EVM Chain Support Module
//!
//! Everything needed to watch bridge contracts and relay mints on
//! EVM-compatible chains (Ethereum, BSC, Polygon, etc.)
//!
//! ## Submodules
//!
//! - `client` - Per-chain client: block height, deposit queries, fee-aware tx submission
//! - `contracts` - Bridge event and mintable token bindings using alloy sol! macro
//! - `events` - Deposit log decoding
//! - `rpc` - Upstream JSON-RPC boundary and its alloy HTTP implementation
//! - `transaction` - Fee-model specific transaction building and signing

pub mod client;
pub mod contracts;
pub mod events;
pub mod rpc;
pub mod transaction;

// Re-export commonly used items
pub use client::{resolve_fee_parameters, ChainClient, ChainClientConfig, MAX_LOG_RANGE};
pub use contracts::{encode_mint_call, Bridge, MintableToken};
pub use events::{parse_deposit_log, DepositEvent, DepositLogError};
pub use rpc::{connect_http, ChainRpc, HttpProvider};
pub use transaction::{SignedTransaction, TxRequest, UnsignedTransaction};
