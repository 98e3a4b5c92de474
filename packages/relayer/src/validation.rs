//! Structural validation
//!
//! A [`Validator`] is built once in `main` and handed to every component that
//! accepts external input (config loader, chain registry, checkpoint store).
//! Types opt in through the [`Validate`] trait.

use std::collections::HashSet;

use alloy::primitives::Address;
use multichain_rs::evm::{ChainClient, MAX_LOG_RANGE};
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::checkpoint::CheckpointKey;
use crate::config::{BridgeConfig, Config, NetworkConfig, RelayerSettings};

/// Largest decimals value accepted for a native coin
const MAX_DECIMALS: u8 = 36;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Implemented by every type that crosses a trust boundary
pub trait Validate {
    fn validate(&self, validator: &Validator) -> Result<(), ValidationError>;
}

/// Validation policy shared by all components
#[derive(Debug, Clone)]
pub struct Validator {
    /// Accept `http://` endpoints (with a warning) instead of rejecting them
    pub allow_plain_http: bool,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            allow_plain_http: true,
        }
    }
}

impl Validator {
    /// Rejects unencrypted RPC endpoints
    pub fn strict() -> Self {
        Self {
            allow_plain_http: false,
        }
    }

    pub fn check<T: Validate + ?Sized>(&self, item: &T) -> Result<(), ValidationError> {
        item.validate(self)
    }

    pub fn chain_id(&self, field: &str, chain_id: u64) -> Result<(), ValidationError> {
        if chain_id == 0 {
            return Err(ValidationError::new(field, "chain id must be positive"));
        }
        Ok(())
    }

    /// `0x` followed by 40 hex digits, any case; checksums are not enforced
    pub fn evm_address(&self, field: &str, value: &str) -> Result<Address, ValidationError> {
        let hex = value
            .strip_prefix("0x")
            .ok_or_else(|| ValidationError::new(field, "address must start with 0x"))?;
        if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValidationError::new(
                field,
                format!("'{}' is not a 20-byte hex address", value),
            ));
        }
        value
            .parse()
            .map_err(|e| ValidationError::new(field, format!("{}", e)))
    }

    /// RPC endpoint: http(s) or ws(s) with a host
    pub fn rpc_url(&self, field: &str, value: &str) -> Result<(), ValidationError> {
        let url = Url::parse(value)
            .map_err(|e| ValidationError::new(field, format!("'{}': {}", value, e)))?;
        match url.scheme() {
            "https" | "wss" => {}
            "http" | "ws" if self.allow_plain_http => {
                if !matches!(url.host_str(), Some("localhost") | Some("127.0.0.1")) {
                    warn!(endpoint = %value, "RPC endpoint is not using TLS");
                }
            }
            "http" | "ws" => {
                return Err(ValidationError::new(field, "plain http endpoints are not allowed"))
            }
            other => {
                return Err(ValidationError::new(
                    field,
                    format!("unsupported scheme '{}'", other),
                ))
            }
        }
        if url.host_str().is_none() {
            return Err(ValidationError::new(field, "endpoint has no host"));
        }
        Ok(())
    }

    fn gwei(&self, field: &str, value: f64) -> Result<(), ValidationError> {
        if !value.is_finite() || value < 0.0 {
            return Err(ValidationError::new(
                field,
                "must be a non-negative number of gwei",
            ));
        }
        Ok(())
    }
}

impl Validate for NetworkConfig {
    fn validate(&self, v: &Validator) -> Result<(), ValidationError> {
        let prefix = format!("networks[{}]", self.chain_id);
        v.chain_id(&format!("{}.chain_id", prefix), self.chain_id)?;
        v.rpc_url(&format!("{}.endpoint", prefix), &self.endpoint)?;
        if self.gas_limit == 0 {
            return Err(ValidationError::new(
                format!("{}.gas_limit", prefix),
                "must be positive",
            ));
        }
        v.gwei(&format!("{}.gas_fee_cap", prefix), self.gas_fee_cap)?;
        v.gwei(&format!("{}.gas_tip_cap", prefix), self.gas_tip_cap)?;
        if self.gas_fee_cap > 0.0 && self.gas_tip_cap > self.gas_fee_cap {
            return Err(ValidationError::new(
                format!("{}.gas_tip_cap", prefix),
                "must not exceed gas_fee_cap",
            ));
        }
        if let Some(coin) = &self.coin {
            if coin.symbol.trim().is_empty() {
                return Err(ValidationError::new(
                    format!("{}.coin.symbol", prefix),
                    "must not be empty",
                ));
            }
            if coin.decimals > MAX_DECIMALS {
                return Err(ValidationError::new(
                    format!("{}.coin.decimals", prefix),
                    format!("must be at most {}", MAX_DECIMALS),
                ));
            }
        }
        Ok(())
    }
}

impl Validate for BridgeConfig {
    fn validate(&self, v: &Validator) -> Result<(), ValidationError> {
        let prefix = format!("bridges[{}]", self.address);
        v.chain_id(&format!("{}.chain_id", prefix), self.chain_id)?;
        v.evm_address(&format!("{}.address", prefix), &self.address)?;
        v.evm_address(&format!("{}.token", prefix), &self.token)?;
        if let Some(destination) = self.destination_chain_id {
            v.chain_id(&format!("{}.destination_chain_id", prefix), destination)?;
        }
        Ok(())
    }
}

impl Validate for RelayerSettings {
    fn validate(&self, _v: &Validator) -> Result<(), ValidationError> {
        if self.events_window == 0 || self.events_window > MAX_LOG_RANGE {
            return Err(ValidationError::new(
                "relayer.events_window",
                format!("must be between 1 and {}", MAX_LOG_RANGE),
            ));
        }
        for (field, value) in [
            ("relayer.snapshot_interval_secs", self.snapshot_interval_secs),
            ("relayer.steady_interval_secs", self.steady_interval_secs),
            ("relayer.catch_up_interval_secs", self.catch_up_interval_secs),
            ("relayer.error_backoff_secs", self.error_backoff_secs),
        ] {
            if value == 0 {
                return Err(ValidationError::new(field, "must be positive"));
            }
        }
        if self.checkpoint_file.trim().is_empty() {
            return Err(ValidationError::new(
                "relayer.checkpoint_file",
                "must not be empty",
            ));
        }
        if self.relay_deposits && self.private_key.as_ref().map_or(true, |k| k.is_blank()) {
            return Err(ValidationError::new(
                "relayer.private_key",
                "required when relay_deposits is enabled",
            ));
        }
        Ok(())
    }
}

impl Validate for Config {
    fn validate(&self, v: &Validator) -> Result<(), ValidationError> {
        if self.networks.is_empty() {
            return Err(ValidationError::new("networks", "at least one network is required"));
        }

        let mut seen = HashSet::new();
        for network in &self.networks {
            network.validate(v)?;
            if !seen.insert(network.chain_id) {
                return Err(ValidationError::new(
                    "networks",
                    format!("chain id {} configured twice", network.chain_id),
                ));
            }
        }

        self.relayer.validate(v)?;

        let mut bridges = HashSet::new();
        for bridge in &self.bridges {
            bridge.validate(v)?;
            if !bridges.insert((bridge.chain_id, bridge.address.to_lowercase())) {
                return Err(ValidationError::new(
                    format!("bridges[{}]", bridge.address),
                    format!("listed twice for chain {}", bridge.chain_id),
                ));
            }
            if self.network(bridge.chain_id).is_none() {
                return Err(ValidationError::new(
                    format!("bridges[{}].chain_id", bridge.address),
                    format!("no network configured for chain {}", bridge.chain_id),
                ));
            }
            if self.relayer.relay_deposits {
                let destination = bridge.destination_chain();
                match self.network(destination) {
                    Some(network) if network.relay => {}
                    Some(_) => {
                        return Err(ValidationError::new(
                            format!("networks[{}].relay", destination),
                            "destination network must set relay: true",
                        ))
                    }
                    None => {
                        return Err(ValidationError::new(
                            format!("bridges[{}].destination_chain_id", bridge.address),
                            format!("no network configured for chain {}", destination),
                        ))
                    }
                }
            }
        }
        Ok(())
    }
}

impl Validate for ChainClient {
    fn validate(&self, v: &Validator) -> Result<(), ValidationError> {
        v.chain_id("client.chain_id", self.chain_id())?;
        if self.fee_parameters().gas_limit == 0 {
            return Err(ValidationError::new("client.gas_limit", "must be positive"));
        }
        if self.fee_parameters().model.fee_cap() == 0 {
            warn!(
                chain_id = self.chain_id(),
                "Resolved fee cap is zero, relay transactions will likely be rejected"
            );
        }
        Ok(())
    }
}

impl Validate for CheckpointKey {
    fn validate(&self, v: &Validator) -> Result<(), ValidationError> {
        v.chain_id("checkpoint.chain_id", self.chain_id)?;
        v.evm_address("checkpoint.address", &self.address)?;
        if self.address != self.address.to_lowercase() {
            return Err(ValidationError::new(
                "checkpoint.address",
                "must be lower-cased",
            ));
        }
        Ok(())
    }
}
