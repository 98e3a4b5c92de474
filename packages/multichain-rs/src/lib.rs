//! Multichain-RS: Shared EVM Chain Library for the AEVM Bridge Relayer
//!
//! This crate provides the chain-facing half of the relayer:
//!
//! - **Types** - Fee configuration, resolved fee parameters, native coin metadata
//! - **Errors** - Connectivity / query / signing / submission taxonomy
//! - **EVM Module** - Chain client, RPC boundary, contract bindings, event parsing, tx signing
//! - **Redaction** - Secret wrapper for operator keys
//! - **Testing Module** - In-memory RPC for unit and integration tests
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! multichain-rs = { path = "../multichain-rs" }
//! ```
//!
//! ## Feature Flags
//!
//! - `evm` - Enable EVM chain support (default)
//! - `testing` - Enable testing utilities for downstream tests
//! - `full` - Enable all features

// Core modules (always available)
pub mod error;
pub mod redact;
pub mod types;

// Chain-specific modules (feature-gated)
#[cfg(feature = "evm")]
pub mod evm;

// Testing utilities (feature-gated)
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used items at the crate root
pub use error::{is_execution_reverted, ChainError};
pub use redact::Secret;
pub use types::{
    gwei_to_wei, ChainId, FeeConfig, FeeModel, FeeModelKind, FeeParameters, NativeCoin,
    DEFAULT_GAS_LIMIT, GWEI,
};
