//! Relayer error taxonomy

use multichain_rs::ChainError;
use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum RelayerError {
    /// Lookup of a client or checkpoint that does not exist
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    /// The checkpoint file exists but cannot be trusted
    #[error("checkpoint file {path} is corrupt: {reason}")]
    CorruptState { path: PathBuf, reason: String },

    /// Building, signing or submitting a relay transaction failed
    #[error("relay on chain {chain_id} failed: {source}")]
    Relay {
        chain_id: u64,
        #[source]
        source: ChainError,
    },

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("checkpoint i/o on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RelayerError {
    pub fn client_not_found(chain_id: u64) -> Self {
        RelayerError::NotFound {
            kind: "chain client",
            key: chain_id.to_string(),
        }
    }

    pub fn checkpoint_not_found(chain_id: u64, address: &str) -> Self {
        RelayerError::NotFound {
            kind: "checkpoint",
            key: format!("{}/{}", chain_id, address),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RelayerError::NotFound { .. })
    }
}
