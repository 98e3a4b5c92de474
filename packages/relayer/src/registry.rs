//! Chain client registry
//!
//! Clients are registered once at startup and looked up by chain id from
//! every watcher and the relay. Registration re-validates the client with the
//! injected [`Validator`]; a later registration for the same chain replaces
//! the earlier one.

use std::collections::HashMap;
use std::sync::Arc;

use multichain_rs::evm::ChainClient;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::RelayerError;
use crate::validation::{ValidationError, Validator};

pub struct ChainRegistry {
    validator: Arc<Validator>,
    clients: RwLock<HashMap<u64, Arc<ChainClient>>>,
}

impl ChainRegistry {
    pub fn new(validator: Arc<Validator>) -> Self {
        Self {
            validator,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Validate and store `client`, returning the client it replaced, if any
    pub async fn register(
        &self,
        client: ChainClient,
    ) -> Result<Option<Arc<ChainClient>>, ValidationError> {
        self.validator.check(&client)?;

        let chain_id = client.chain_id();
        let coin = client.native_coin().map(|c| c.symbol.clone());
        let signer = client.signer_address();
        let replaced = self
            .clients
            .write()
            .await
            .insert(chain_id, Arc::new(client));

        if replaced.is_some() {
            warn!(chain_id, "Replaced previously registered chain client");
        }
        info!(
            chain_id,
            coin = coin.as_deref().unwrap_or("unknown"),
            signer = ?signer,
            "Registered chain client"
        );
        Ok(replaced)
    }

    pub async fn lookup(&self, chain_id: u64) -> Result<Arc<ChainClient>, RelayerError> {
        self.clients
            .read()
            .await
            .get(&chain_id)
            .cloned()
            .ok_or_else(|| RelayerError::client_not_found(chain_id))
    }

    /// Registered chain ids, ascending
    pub async fn chain_ids(&self) -> Vec<u64> {
        let mut ids: Vec<_> = self.clients.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub async fn clients(&self) -> Vec<Arc<ChainClient>> {
        self.clients.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}
