//! EVM chain client
//!
//! A [`ChainClient`] bundles everything needed to read from and write to one
//! chain: the RPC handle, the fee parameters resolved at construction, and
//! (for relay-capable chains) the operator key.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolEvent;
use tracing::{debug, info, warn};

use super::contracts::Bridge;
use super::events::{parse_deposit_log, DepositEvent};
use super::rpc::{connect_http, ChainRpc};
use super::transaction::{TxRequest, UnsignedTransaction};
use crate::error::ChainError;
use crate::types::{gwei_to_wei, FeeConfig, FeeModel, FeeModelKind, FeeParameters, NativeCoin};

/// Widest `eth_getLogs` range (`to - from`) a client will send to a node
pub const MAX_LOG_RANGE: u64 = 29;

/// Static settings for one chain
#[derive(Debug, Clone)]
pub struct ChainClientConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    pub fees: FeeConfig,
    pub coin: Option<NativeCoin>,
}

/// Resolve configured fee caps into wei, asking the node for any left at zero.
///
/// Legacy chains never query the tip.
pub async fn resolve_fee_parameters(
    rpc: &dyn ChainRpc,
    chain_id: u64,
    config: &FeeConfig,
) -> Result<FeeParameters, ChainError> {
    let fee_cap = match gwei_to_wei(config.gas_fee_cap) {
        0 => {
            let price = rpc
                .gas_price()
                .await
                .map_err(|e| ChainError::from_rpc(chain_id, "eth_gasPrice", e))?;
            debug!(chain_id, gas_price = price, "Using suggested gas price as fee cap");
            price
        }
        configured => configured,
    };

    let model = match config.model {
        FeeModelKind::Legacy => FeeModel::Legacy { gas_price: fee_cap },
        FeeModelKind::DynamicFee => {
            let tip_cap = match gwei_to_wei(config.gas_tip_cap) {
                0 => {
                    let tip = rpc.max_priority_fee_per_gas().await.map_err(|e| {
                        ChainError::from_rpc(chain_id, "eth_maxPriorityFeePerGas", e)
                    })?;
                    debug!(chain_id, tip, "Using suggested priority fee as tip cap");
                    tip
                }
                configured => configured,
            };
            if tip_cap > fee_cap {
                warn!(
                    chain_id,
                    fee_cap, tip_cap, "Tip cap exceeds fee cap, transactions may be rejected"
                );
            }
            FeeModel::DynamicFee {
                max_fee_per_gas: fee_cap,
                max_priority_fee_per_gas: tip_cap,
            }
        }
    };

    Ok(FeeParameters {
        model,
        gas_limit: config.gas_limit,
    })
}

/// Connection to one EVM chain; immutable once built
pub struct ChainClient {
    chain_id: u64,
    rpc: Arc<dyn ChainRpc>,
    signer: Option<PrivateKeySigner>,
    fees: FeeParameters,
    coin: Option<NativeCoin>,
}

impl fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainClient")
            .field("chain_id", &self.chain_id)
            .field("signer", &self.signer_address())
            .field("fees", &self.fees)
            .field("coin", &self.coin)
            .finish()
    }
}

impl ChainClient {
    /// Connect over HTTP, verify the chain id and resolve fees
    pub async fn connect(
        config: &ChainClientConfig,
        signer: Option<PrivateKeySigner>,
    ) -> Result<Self, ChainError> {
        let provider = connect_http(&config.rpc_url)?;
        let client = Self::from_rpc(config, Arc::new(provider), signer).await?;

        info!(
            chain_id = client.chain_id,
            rpc_url = %config.rpc_url,
            fee_model = %client.fees.model.kind(),
            signer = ?client.signer_address(),
            "Created EVM chain client"
        );
        Ok(client)
    }

    /// Build a client on top of an existing RPC handle
    pub async fn from_rpc(
        config: &ChainClientConfig,
        rpc: Arc<dyn ChainRpc>,
        signer: Option<PrivateKeySigner>,
    ) -> Result<Self, ChainError> {
        let chain_id = config.chain_id;
        let reported = rpc
            .chain_id()
            .await
            .map_err(|e| ChainError::from_rpc(chain_id, "eth_chainId", e))?;
        if reported != chain_id {
            return Err(ChainError::Query {
                chain_id,
                operation: "eth_chainId",
                message: format!("endpoint reports chain id {}", reported),
            });
        }

        let fees = resolve_fee_parameters(rpc.as_ref(), chain_id, &config.fees).await?;

        Ok(Self {
            chain_id,
            rpc,
            signer,
            fees,
            coin: config.coin.clone(),
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn fee_parameters(&self) -> &FeeParameters {
        &self.fees
    }

    pub fn native_coin(&self) -> Option<&NativeCoin> {
        self.coin.as_ref()
    }

    /// Operator address, `None` for watch-only clients
    pub fn signer_address(&self) -> Option<Address> {
        self.signer.as_ref().map(|s| s.address())
    }

    pub fn can_sign(&self) -> bool {
        self.signer.is_some()
    }

    /// Latest block height known to the node
    pub async fn current_block_height(&self) -> Result<u64, ChainError> {
        self.rpc
            .block_number()
            .await
            .map_err(|e| ChainError::from_rpc(self.chain_id, "eth_blockNumber", e))
    }

    /// Deposit events emitted by `contract` in `[from_block, to_block]`.
    ///
    /// Events come back ordered by block, then log index, each stamped with
    /// its block's timestamp. Ranges wider than [`MAX_LOG_RANGE`] are refused
    /// without contacting the node.
    pub async fn query_deposit_events(
        &self,
        contract: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<DepositEvent>, ChainError> {
        if from_block > to_block {
            return Ok(Vec::new());
        }
        if to_block - from_block > MAX_LOG_RANGE {
            return Err(ChainError::Query {
                chain_id: self.chain_id,
                operation: "eth_getLogs",
                message: format!(
                    "range {}..={} exceeds the {} block query limit",
                    from_block, to_block, MAX_LOG_RANGE
                ),
            });
        }

        let logs = self
            .rpc
            .deposit_logs(contract, Bridge::Deposit::SIGNATURE_HASH, from_block, to_block)
            .await
            .map_err(|e| ChainError::from_rpc(self.chain_id, "eth_getLogs", e))?;

        let mut decoded = logs
            .iter()
            .map(parse_deposit_log)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                warn!(
                    chain_id = self.chain_id,
                    contract = %contract,
                    from_block,
                    to_block,
                    error = %e,
                    "Unusable deposit log, failing the range"
                );
                ChainError::Query {
                    chain_id: self.chain_id,
                    operation: "eth_getLogs",
                    message: e.to_string(),
                }
            })?;
        decoded.sort_by_key(|d| (d.block_number, d.log_index));

        let mut timestamps = BTreeMap::new();
        let mut events = Vec::with_capacity(decoded.len());
        for deposit in decoded {
            let timestamp = match timestamps.get(&deposit.block_number) {
                Some(ts) => *ts,
                None => {
                    let ts = self.block_timestamp(deposit.block_number).await?;
                    timestamps.insert(deposit.block_number, ts);
                    ts
                }
            };
            events.push(deposit.with_timestamp(timestamp));
        }

        debug!(
            chain_id = self.chain_id,
            contract = %contract,
            from_block,
            to_block,
            count = events.len(),
            "Queried deposit events"
        );
        Ok(events)
    }

    async fn block_timestamp(&self, number: u64) -> Result<u64, ChainError> {
        self.rpc
            .block_timestamp(number)
            .await
            .map_err(|e| ChainError::from_rpc(self.chain_id, "eth_getBlockByNumber", e))?
            .ok_or_else(|| ChainError::Query {
                chain_id: self.chain_id,
                operation: "eth_getBlockByNumber",
                message: format!("block {} not found", number),
            })
    }

    /// Next nonce for the operator account, counting pending transactions
    pub async fn pending_nonce(&self) -> Result<u64, ChainError> {
        let address = self
            .signer_address()
            .ok_or(ChainError::MissingSigner {
                chain_id: self.chain_id,
            })?;
        self.rpc
            .pending_nonce(address)
            .await
            .map_err(|e| ChainError::from_rpc(self.chain_id, "eth_getTransactionCount", e))
    }

    /// Apply this chain's fee model to a call request
    pub fn build_transaction(&self, request: TxRequest) -> UnsignedTransaction {
        UnsignedTransaction::build(self.chain_id, &self.fees, request)
    }

    /// Sign with the operator key and broadcast; returns the transaction hash
    pub async fn sign_and_submit(&self, tx: UnsignedTransaction) -> Result<B256, ChainError> {
        let signer = self.signer.as_ref().ok_or(ChainError::MissingSigner {
            chain_id: self.chain_id,
        })?;

        let nonce = tx.nonce();
        let signed = tx.sign(signer).map_err(|e| ChainError::Signing {
            chain_id: self.chain_id,
            message: e.to_string(),
        })?;

        let reported = self
            .rpc
            .broadcast(&signed.raw)
            .await
            .map_err(|e| ChainError::from_broadcast(self.chain_id, e))?;
        if reported != signed.hash {
            warn!(
                chain_id = self.chain_id,
                local = %signed.hash,
                reported = %reported,
                "Node reported a different transaction hash"
            );
        }

        info!(
            chain_id = self.chain_id,
            tx_hash = %signed.hash,
            nonce,
            "Transaction submitted"
        );
        Ok(signed.hash)
    }
}
