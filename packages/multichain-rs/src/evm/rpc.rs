//! Upstream JSON-RPC boundary
//!
//! [`ChainRpc`] lists exactly the node calls the relayer makes. The live
//! implementation is alloy's HTTP provider; tests plug in
//! [`MockRpc`](crate::testing::MockRpc).

use alloy::eips::BlockNumberOrTag;
use alloy::primitives::{Address, B256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{BlockTransactionsKind, Filter, Log};
use alloy::transports::http::{Client, Http};
use alloy::transports::TransportResult;
use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::error::ChainError;

/// Node calls needed by a [`ChainClient`](super::ChainClient)
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// `eth_chainId`
    async fn chain_id(&self) -> TransportResult<u64>;

    /// `eth_blockNumber`
    async fn block_number(&self) -> TransportResult<u64>;

    /// `eth_getLogs` for one contract and one event topic over an inclusive range
    async fn deposit_logs(
        &self,
        contract: Address,
        topic: B256,
        from_block: u64,
        to_block: u64,
    ) -> TransportResult<Vec<Log>>;

    /// Timestamp of a block, `None` if the node does not know the block
    async fn block_timestamp(&self, number: u64) -> TransportResult<Option<u64>>;

    /// `eth_gasPrice`
    async fn gas_price(&self) -> TransportResult<u128>;

    /// `eth_maxPriorityFeePerGas`
    async fn max_priority_fee_per_gas(&self) -> TransportResult<u128>;

    /// `eth_getTransactionCount(address, "pending")`
    async fn pending_nonce(&self, address: Address) -> TransportResult<u64>;

    /// `eth_sendRawTransaction`, returning the hash reported by the node
    async fn broadcast(&self, raw: &[u8]) -> TransportResult<B256>;
}

/// HTTP provider type used for live chains
pub type HttpProvider = RootProvider<Http<Client>>;

/// Build an HTTP provider for `endpoint`
pub fn connect_http(endpoint: &str) -> Result<HttpProvider, ChainError> {
    let url = Url::parse(endpoint)
        .map_err(|e| ChainError::InvalidAddress(format!("rpc url {}: {}", endpoint, e)))?;
    debug!(endpoint = %url, "Created HTTP provider");
    Ok(ProviderBuilder::new().on_http(url))
}

#[async_trait]
impl ChainRpc for HttpProvider {
    async fn chain_id(&self) -> TransportResult<u64> {
        self.get_chain_id().await
    }

    async fn block_number(&self) -> TransportResult<u64> {
        self.get_block_number().await
    }

    async fn deposit_logs(
        &self,
        contract: Address,
        topic: B256,
        from_block: u64,
        to_block: u64,
    ) -> TransportResult<Vec<Log>> {
        let filter = Filter::new()
            .address(contract)
            .event_signature(topic)
            .from_block(from_block)
            .to_block(to_block);
        self.get_logs(&filter).await
    }

    async fn block_timestamp(&self, number: u64) -> TransportResult<Option<u64>> {
        let block = self
            .get_block_by_number(
                BlockNumberOrTag::Number(number),
                BlockTransactionsKind::Hashes,
            )
            .await?;
        Ok(block.map(|b| b.header.timestamp))
    }

    async fn gas_price(&self) -> TransportResult<u128> {
        self.get_gas_price().await
    }

    async fn max_priority_fee_per_gas(&self) -> TransportResult<u128> {
        self.get_max_priority_fee_per_gas().await
    }

    async fn pending_nonce(&self, address: Address) -> TransportResult<u64> {
        self.get_transaction_count(address)
            .block_id(BlockNumberOrTag::Pending.into())
            .await
    }

    async fn broadcast(&self, raw: &[u8]) -> TransportResult<B256> {
        let pending = Provider::send_raw_transaction(self, raw).await?;
        Ok(*pending.tx_hash())
    }
}
