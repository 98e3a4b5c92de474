//! Common types for chain clients
//!
//! Fee configuration as written by operators, the fee parameters a client
//! resolves from it, and per-chain native coin metadata.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Native EVM chain id (1 = Ethereum mainnet, 56 = BSC, ...)
pub type ChainId = u64;

/// Wei per gwei
pub const GWEI: u128 = 1_000_000_000;

/// Default gas limit for relay transactions when none is configured
pub const DEFAULT_GAS_LIMIT: u64 = 300_000;

// ============================================================================
// Fee Models
// ============================================================================

/// Transaction fee model selected per chain in configuration
///
/// Never inferred from the chain id: some chains with EIP-1559 support are
/// still cheaper or more reliable with legacy transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeeModelKind {
    /// Pre-EIP-1559 transaction with a single gas price
    #[default]
    #[serde(alias = "legacy-fee")]
    Legacy,
    /// EIP-1559 transaction with a fee cap and a priority tip
    #[serde(alias = "dynamic", alias = "eip1559")]
    DynamicFee,
}

impl fmt::Display for FeeModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeeModelKind::Legacy => f.write_str("legacy"),
            FeeModelKind::DynamicFee => f.write_str("dynamic-fee"),
        }
    }
}

/// Fee settings for one chain as written in configuration
///
/// Caps are in gwei; a value of zero means "ask the node at startup".
#[derive(Debug, Clone, PartialEq)]
pub struct FeeConfig {
    pub model: FeeModelKind,
    pub gas_limit: u64,
    /// Gas price (legacy) or max fee per gas (dynamic-fee), in gwei
    pub gas_fee_cap: f64,
    /// Max priority fee per gas, in gwei; ignored for legacy chains
    pub gas_tip_cap: f64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            model: FeeModelKind::Legacy,
            gas_limit: DEFAULT_GAS_LIMIT,
            gas_fee_cap: 0.0,
            gas_tip_cap: 0.0,
        }
    }
}

/// Resolved fee values in wei, fixed for the lifetime of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FeeModel {
    Legacy {
        gas_price: u128,
    },
    DynamicFee {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
}

impl FeeModel {
    pub fn kind(&self) -> FeeModelKind {
        match self {
            FeeModel::Legacy { .. } => FeeModelKind::Legacy,
            FeeModel::DynamicFee { .. } => FeeModelKind::DynamicFee,
        }
    }

    /// Gas price for legacy, max fee per gas for dynamic-fee
    pub fn fee_cap(&self) -> u128 {
        match self {
            FeeModel::Legacy { gas_price } => *gas_price,
            FeeModel::DynamicFee {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }

    /// Priority tip; legacy transactions have none
    pub fn tip_cap(&self) -> Option<u128> {
        match self {
            FeeModel::Legacy { .. } => None,
            FeeModel::DynamicFee {
                max_priority_fee_per_gas,
                ..
            } => Some(*max_priority_fee_per_gas),
        }
    }
}

/// Fee model plus the flat gas limit applied to every relay transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeParameters {
    pub model: FeeModel,
    pub gas_limit: u64,
}

/// Convert a gwei amount from configuration into wei.
///
/// Negative and non-finite inputs convert to zero, which callers treat as
/// "not configured".
pub fn gwei_to_wei(gwei: f64) -> u128 {
    if !gwei.is_finite() || gwei <= 0.0 {
        return 0;
    }
    (gwei * GWEI as f64).round() as u128
}

// ============================================================================
// Native Coin
// ============================================================================

/// Native coin of a chain (ETH, BNB, MATIC, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCoin {
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

fn default_decimals() -> u8 {
    18
}

impl fmt::Display for NativeCoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} decimals)", self.symbol, self.decimals)
    }
}
