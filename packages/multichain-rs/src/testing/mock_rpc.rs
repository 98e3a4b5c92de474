//! Scriptable in-memory node
//!
//! [`MockRpc`] serves block heights, deposit logs, fee suggestions and nonces
//! from shared state, records every log query and broadcast, and can be told
//! to fail the next N calls of a kind with a transport error or a node
//! rejection.

use std::collections::HashMap;
use std::sync::Mutex;

use alloy::primitives::{keccak256, Address, Bytes, LogData, B256, U256};
use alloy::rpc::json_rpc::ErrorPayload;
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use alloy::transports::{RpcError, TransportErrorKind, TransportResult};
use async_trait::async_trait;

use crate::evm::contracts::Bridge;
use crate::evm::rpc::ChainRpc;

/// Base timestamp handed out for block 0
const GENESIS_TIMESTAMP: u64 = 1_700_000_000;
/// Seconds between mock blocks
const BLOCK_TIME: u64 = 3;

#[derive(Debug, Clone)]
enum Failure {
    Transport,
    Rejected(String),
}

#[derive(Debug, Default)]
struct MockState {
    chain_id: u64,
    height: u64,
    gas_price: u128,
    priority_fee: u128,
    nonce: u64,
    logs: Vec<Log>,
    log_counts: HashMap<u64, u64>,
    block_number_failures: Vec<Failure>,
    log_failures: Vec<Failure>,
    broadcast_rejection: Option<String>,
    log_queries: Vec<(u64, u64)>,
    broadcasts: Vec<Bytes>,
    block_number_calls: usize,
    gas_price_calls: usize,
    priority_fee_calls: usize,
    timestamp_calls: usize,
}

/// In-memory [`ChainRpc`] for tests
#[derive(Debug)]
pub struct MockRpc {
    state: Mutex<MockState>,
}

impl MockRpc {
    pub fn new(chain_id: u64) -> Self {
        Self {
            state: Mutex::new(MockState {
                chain_id,
                gas_price: 1_000_000_000,
                priority_fee: 100_000_000,
                ..Default::default()
            }),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self.state.lock().expect("mock rpc state poisoned");
        f(&mut state)
    }

    /// Timestamp the mock reports for `block`
    pub fn timestamp_for(block: u64) -> u64 {
        GENESIS_TIMESTAMP + block * BLOCK_TIME
    }

    pub fn set_height(&self, height: u64) {
        self.with_state(|s| s.height = height);
    }

    pub fn set_gas_price(&self, wei: u128) {
        self.with_state(|s| s.gas_price = wei);
    }

    pub fn set_priority_fee(&self, wei: u128) {
        self.with_state(|s| s.priority_fee = wei);
    }

    pub fn set_nonce(&self, nonce: u64) {
        self.with_state(|s| s.nonce = nonce);
    }

    /// Add a `Deposit` log emitted by `contract` at `block`; returns its tx hash
    pub fn push_deposit(
        &self,
        contract: Address,
        block: u64,
        receiver: Address,
        amount: U256,
    ) -> B256 {
        self.with_state(|s| {
            let index = s.log_counts.entry(block).or_default();
            let log_index = *index;
            *index += 1;

            let tx_hash = keccak256(format!("{}:{}:{}", s.chain_id, block, log_index));
            let data = Bridge::Deposit { receiver, amount }.encode_log_data();
            s.logs.push(Log {
                inner: alloy::primitives::Log {
                    address: contract,
                    data,
                },
                block_number: Some(block),
                transaction_hash: Some(tx_hash),
                log_index: Some(log_index),
                ..Default::default()
            });
            tx_hash
        })
    }

    /// Add a log carrying the `Deposit` topic but no data payload
    pub fn push_undecodable_deposit(&self, contract: Address, block: u64) -> B256 {
        self.with_state(|s| {
            let index = s.log_counts.entry(block).or_default();
            let log_index = *index;
            *index += 1;

            let tx_hash = keccak256(format!("{}:{}:{}", s.chain_id, block, log_index));
            s.logs.push(Log {
                inner: alloy::primitives::Log {
                    address: contract,
                    data: LogData::new_unchecked(
                        vec![Bridge::Deposit::SIGNATURE_HASH],
                        Bytes::new(),
                    ),
                },
                block_number: Some(block),
                transaction_hash: Some(tx_hash),
                log_index: Some(log_index),
                ..Default::default()
            });
            tx_hash
        })
    }

    /// Fail the next `count` `eth_blockNumber` calls with a transport error
    pub fn fail_block_number(&self, count: usize) {
        self.with_state(|s| {
            s.block_number_failures
                .extend(std::iter::repeat(Failure::Transport).take(count))
        });
    }

    /// Fail the next `count` `eth_getLogs` calls with a transport error
    pub fn fail_logs(&self, count: usize) {
        self.with_state(|s| {
            s.log_failures
                .extend(std::iter::repeat(Failure::Transport).take(count))
        });
    }

    /// Reject the next `count` `eth_getLogs` calls with a node error response
    pub fn reject_logs(&self, count: usize, message: &str) {
        self.with_state(|s| {
            s.log_failures
                .extend(std::iter::repeat(Failure::Rejected(message.to_string())).take(count))
        });
    }

    /// Reject every broadcast from now on with `message`
    pub fn reject_broadcasts(&self, message: &str) {
        self.with_state(|s| s.broadcast_rejection = Some(message.to_string()));
    }

    pub fn accept_broadcasts(&self) {
        self.with_state(|s| s.broadcast_rejection = None);
    }

    /// Every `(from, to)` range passed to `eth_getLogs`, in call order
    pub fn log_queries(&self) -> Vec<(u64, u64)> {
        self.with_state(|s| s.log_queries.clone())
    }

    /// Raw transactions accepted by `eth_sendRawTransaction`
    pub fn broadcasts(&self) -> Vec<Bytes> {
        self.with_state(|s| s.broadcasts.clone())
    }

    pub fn block_number_calls(&self) -> usize {
        self.with_state(|s| s.block_number_calls)
    }

    pub fn gas_price_calls(&self) -> usize {
        self.with_state(|s| s.gas_price_calls)
    }

    pub fn priority_fee_calls(&self) -> usize {
        self.with_state(|s| s.priority_fee_calls)
    }

    pub fn timestamp_calls(&self) -> usize {
        self.with_state(|s| s.timestamp_calls)
    }
}

fn take_failure(queue: &mut Vec<Failure>) -> Option<Failure> {
    if queue.is_empty() {
        None
    } else {
        Some(queue.remove(0))
    }
}

fn into_error(failure: Failure) -> RpcError<TransportErrorKind> {
    match failure {
        Failure::Transport => TransportErrorKind::custom_str("connection refused"),
        Failure::Rejected(message) => rejection(message),
    }
}

fn rejection(message: String) -> RpcError<TransportErrorKind> {
    RpcError::ErrorResp(ErrorPayload {
        code: -32000,
        message: message.into(),
        data: None,
    })
}

#[async_trait]
impl ChainRpc for MockRpc {
    async fn chain_id(&self) -> TransportResult<u64> {
        Ok(self.with_state(|s| s.chain_id))
    }

    async fn block_number(&self) -> TransportResult<u64> {
        self.with_state(|s| {
            s.block_number_calls += 1;
            match take_failure(&mut s.block_number_failures) {
                Some(failure) => Err(into_error(failure)),
                None => Ok(s.height),
            }
        })
    }

    async fn deposit_logs(
        &self,
        contract: Address,
        topic: B256,
        from_block: u64,
        to_block: u64,
    ) -> TransportResult<Vec<Log>> {
        self.with_state(|s| {
            s.log_queries.push((from_block, to_block));
            if let Some(failure) = take_failure(&mut s.log_failures) {
                return Err(into_error(failure));
            }
            Ok(s.logs
                .iter()
                .filter(|log| {
                    log.inner.address == contract
                        && log.inner.data.topics().first() == Some(&topic)
                        && log
                            .block_number
                            .is_some_and(|n| n >= from_block && n <= to_block)
                })
                .cloned()
                .collect())
        })
    }

    async fn block_timestamp(&self, number: u64) -> TransportResult<Option<u64>> {
        self.with_state(|s| {
            s.timestamp_calls += 1;
            Ok(Some(Self::timestamp_for(number)))
        })
    }

    async fn gas_price(&self) -> TransportResult<u128> {
        self.with_state(|s| {
            s.gas_price_calls += 1;
            Ok(s.gas_price)
        })
    }

    async fn max_priority_fee_per_gas(&self) -> TransportResult<u128> {
        self.with_state(|s| {
            s.priority_fee_calls += 1;
            Ok(s.priority_fee)
        })
    }

    async fn pending_nonce(&self, _address: Address) -> TransportResult<u64> {
        Ok(self.with_state(|s| s.nonce))
    }

    async fn broadcast(&self, raw: &[u8]) -> TransportResult<B256> {
        self.with_state(|s| {
            if let Some(message) = s.broadcast_rejection.clone() {
                return Err(rejection(message));
            }
            s.broadcasts.push(Bytes::copy_from_slice(raw));
            s.nonce += 1;
            Ok(keccak256(raw))
        })
    }
}
