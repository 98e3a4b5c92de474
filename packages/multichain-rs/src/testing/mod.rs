//! Testing Utilities Module
//!
//! In-memory stand-ins for the upstream node so chain clients and everything
//! built on them can be exercised without a live RPC endpoint.
//!
//! ## Submodules
//!
//! - `mock_rpc` - Scriptable [`ChainRpc`](crate::evm::ChainRpc) implementation

pub mod mock_rpc;

pub use mock_rpc::MockRpc;
