//! Mint relay
//!
//! Turns a deposit into a `mint(recipient, amount)` transaction on the
//! destination chain. One attempt per call; the watcher decides what to do
//! with a failure (it re-scans the range, so the deposit is retried on the
//! next cycle).

use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use multichain_rs::evm::{encode_mint_call, TxRequest};
use tracing::{error, info};

use crate::error::RelayerError;
use crate::metrics::Metrics;
use crate::registry::ChainRegistry;

pub struct TransactionRelay {
    registry: Arc<ChainRegistry>,
    metrics: Option<Arc<Metrics>>,
}

impl TransactionRelay {
    pub fn new(registry: Arc<ChainRegistry>) -> Self {
        Self {
            registry,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Mint `amount` of `token` to `recipient` on `chain_id`; returns the tx hash
    pub async fn relay(
        &self,
        chain_id: u64,
        token: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<B256, RelayerError> {
        let client = self.registry.lookup(chain_id).await?;

        let result = async {
            let nonce = client.pending_nonce().await?;
            let tx = client.build_transaction(TxRequest::call(
                nonce,
                token,
                encode_mint_call(recipient, amount),
            ));
            client.sign_and_submit(tx).await
        }
        .await;

        match result {
            Ok(tx_hash) => {
                info!(
                    chain_id,
                    token = %token,
                    recipient = %recipient,
                    amount = %amount,
                    tx_hash = %tx_hash,
                    "Mint submitted"
                );
                self.record(chain_id, "submitted");
                Ok(tx_hash)
            }
            Err(source) => {
                error!(
                    chain_id,
                    token = %token,
                    recipient = %recipient,
                    amount = %amount,
                    reverted = source.is_execution_reverted(),
                    error = %source,
                    "Mint failed"
                );
                self.record(chain_id, "failed");
                Err(RelayerError::Relay { chain_id, source })
            }
        }
    }

    fn record(&self, chain_id: u64, status: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_relay(chain_id, status);
        }
    }
}
