//! Chain error taxonomy
//!
//! Every fallible [`ChainClient`](crate::evm::ChainClient) operation reports one of
//! these variants so callers can tell a flaky endpoint apart from a node that
//! understood the request and refused it.

use alloy::transports::{RpcError, TransportErrorKind};
use thiserror::Error;

/// Errors raised while talking to a single EVM chain
#[derive(Debug, Error)]
pub enum ChainError {
    /// The endpoint could not be reached or the transport broke mid-request
    #[error("chain {chain_id}: {operation} failed, endpoint unreachable: {message}")]
    Connectivity {
        chain_id: u64,
        operation: &'static str,
        message: String,
    },

    /// The node answered but rejected the request
    #[error("chain {chain_id}: {operation} rejected by node: {message}")]
    Query {
        chain_id: u64,
        operation: &'static str,
        message: String,
    },

    /// The operator key could not produce a signature
    #[error("chain {chain_id}: signing failed: {message}")]
    Signing { chain_id: u64, message: String },

    /// The node refused to accept a signed transaction
    #[error("chain {chain_id}: transaction submission rejected: {message}")]
    Submission { chain_id: u64, message: String },

    /// A write was requested on a client built without an operator key
    #[error("chain {chain_id}: client has no operator key")]
    MissingSigner { chain_id: u64 },

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

impl ChainError {
    /// Map an alloy RPC failure onto the taxonomy.
    ///
    /// JSON-RPC error responses mean the node processed the call; everything
    /// else (timeouts, refused connections, bad payloads) is treated as a
    /// connectivity problem.
    pub fn from_rpc(
        chain_id: u64,
        operation: &'static str,
        err: RpcError<TransportErrorKind>,
    ) -> Self {
        match err {
            RpcError::ErrorResp(payload) => ChainError::Query {
                chain_id,
                operation,
                message: payload.to_string(),
            },
            other => ChainError::Connectivity {
                chain_id,
                operation,
                message: other.to_string(),
            },
        }
    }

    /// Same as [`ChainError::from_rpc`] but a node-side rejection becomes a
    /// [`ChainError::Submission`].
    pub fn from_broadcast(chain_id: u64, err: RpcError<TransportErrorKind>) -> Self {
        match err {
            RpcError::ErrorResp(payload) => ChainError::Submission {
                chain_id,
                message: payload.to_string(),
            },
            other => ChainError::Connectivity {
                chain_id,
                operation: "eth_sendRawTransaction",
                message: other.to_string(),
            },
        }
    }

    pub fn chain_id(&self) -> Option<u64> {
        match self {
            ChainError::Connectivity { chain_id, .. }
            | ChainError::Query { chain_id, .. }
            | ChainError::Signing { chain_id, .. }
            | ChainError::Submission { chain_id, .. }
            | ChainError::MissingSigner { chain_id } => Some(*chain_id),
            ChainError::InvalidAddress(_) => None,
        }
    }

    /// Whether repeating the same call later has a chance of succeeding
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChainError::Connectivity { .. } | ChainError::Query { .. }
        ) && !self.is_execution_reverted()
    }

    /// Whether the node reported an EVM revert
    pub fn is_execution_reverted(&self) -> bool {
        match self {
            ChainError::Query { message, .. } | ChainError::Submission { message, .. } => {
                is_execution_reverted(message)
            }
            _ => false,
        }
    }
}

/// Check an RPC error message for the geth/erigon revert marker
pub fn is_execution_reverted(message: &str) -> bool {
    message.to_lowercase().contains("execution reverted")
}
