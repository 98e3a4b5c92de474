//! EVM Event Parsing
//!
//! Decodes raw bridge logs into [`DepositEvent`]s.

use super::contracts::Bridge;
use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::Log;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A deposit observed on a bridge contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositEvent {
    /// Unix timestamp of the block that included the deposit
    pub timestamp: u64,
    /// Block number where event was emitted
    pub block_number: u64,
    /// Transaction hash
    pub tx_hash: B256,
    /// Log index within the block
    pub log_index: u64,
    /// Account credited on the destination chain
    pub receiver: Address,
    /// Amount deposited, in token base units
    pub amount: U256,
}

impl DepositEvent {
    /// Whether this deposit should trigger a mint: non-zero amount to a real account
    pub fn is_relayable(&self) -> bool {
        !self.amount.is_zero() && self.receiver != Address::ZERO
    }
}

/// Deposit fields decoded from a log, before the block timestamp is known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedDeposit {
    pub block_number: u64,
    pub tx_hash: B256,
    pub log_index: u64,
    pub receiver: Address,
    pub amount: U256,
}

impl DecodedDeposit {
    pub fn with_timestamp(self, timestamp: u64) -> DepositEvent {
        DepositEvent {
            timestamp,
            block_number: self.block_number,
            tx_hash: self.tx_hash,
            log_index: self.log_index,
            receiver: self.receiver,
            amount: self.amount,
        }
    }
}

/// Why a log returned for the `Deposit` filter could not be used
#[derive(Debug, Error)]
pub enum DepositLogError {
    #[error("undecodable Deposit log in tx {tx_hash:?}: {reason}")]
    Decode {
        tx_hash: Option<B256>,
        reason: String,
    },
    #[error("Deposit log in tx {tx_hash:?} has no block number or transaction hash")]
    MissingPosition { tx_hash: Option<B256> },
}

/// Decode a `Deposit` log.
///
/// The node already filtered by address and topic, so a log that does not
/// decode, or is still pending, makes the whole range unusable.
pub fn parse_deposit_log(log: &Log) -> Result<DecodedDeposit, DepositLogError> {
    let decoded = log
        .log_decode::<Bridge::Deposit>()
        .map_err(|e| DepositLogError::Decode {
            tx_hash: log.transaction_hash,
            reason: e.to_string(),
        })?;

    let (Some(block_number), Some(tx_hash)) = (log.block_number, log.transaction_hash) else {
        return Err(DepositLogError::MissingPosition {
            tx_hash: log.transaction_hash,
        });
    };

    let event = decoded.inner.data;
    Ok(DecodedDeposit {
        block_number,
        tx_hash,
        log_index: log.log_index.unwrap_or_default(),
        receiver: event.receiver,
        amount: event.amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, LogData};
    use alloy::sol_types::SolEvent;

    fn deposit_log(receiver: Address, amount: U256) -> Log {
        let data = Bridge::Deposit { receiver, amount }.encode_log_data();
        Log {
            inner: alloy::primitives::Log {
                address: address!("1111111111111111111111111111111111111111"),
                data,
            },
            block_number: Some(42),
            transaction_hash: Some(B256::repeat_byte(0x07)),
            log_index: Some(3),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_deposit_log() {
        let receiver = address!("00000000000000000000000000000000000000bb");
        let parsed = parse_deposit_log(&deposit_log(receiver, U256::from(5u64))).unwrap();

        assert_eq!(parsed.block_number, 42);
        assert_eq!(parsed.tx_hash, B256::repeat_byte(0x07));
        assert_eq!(parsed.log_index, 3);
        assert_eq!(parsed.receiver, receiver);
        assert_eq!(parsed.amount, U256::from(5u64));

        let event = parsed.with_timestamp(1_700_000_000);
        assert_eq!(event.timestamp, 1_700_000_000);
        assert!(event.is_relayable());
    }

    #[test]
    fn test_parse_rejects_foreign_log() {
        let log = Log {
            inner: alloy::primitives::Log {
                address: Address::ZERO,
                data: LogData::new_unchecked(vec![B256::repeat_byte(0x01)], Default::default()),
            },
            block_number: Some(1),
            transaction_hash: Some(B256::ZERO),
            ..Default::default()
        };
        assert!(matches!(
            parse_deposit_log(&log),
            Err(DepositLogError::Decode { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_truncated_payload() {
        let mut log = deposit_log(Address::repeat_byte(1), U256::from(1u64));
        let topics = log.inner.data.topics().to_vec();
        log.inner.data = LogData::new_unchecked(topics, Default::default());
        assert!(matches!(
            parse_deposit_log(&log),
            Err(DepositLogError::Decode { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_pending_log() {
        let mut log = deposit_log(Address::repeat_byte(1), U256::from(1u64));
        log.block_number = None;
        assert!(matches!(
            parse_deposit_log(&log),
            Err(DepositLogError::MissingPosition { .. })
        ));
    }

    #[test]
    fn test_zero_deposits_not_relayable() {
        let zero_amount = DecodedDeposit {
            block_number: 1,
            tx_hash: B256::ZERO,
            log_index: 0,
            receiver: Address::repeat_byte(1),
            amount: U256::ZERO,
        }
        .with_timestamp(0);
        assert!(!zero_amount.is_relayable());

        let zero_receiver = DecodedDeposit {
            block_number: 1,
            tx_hash: B256::ZERO,
            log_index: 0,
            receiver: Address::ZERO,
            amount: U256::from(10u64),
        }
        .with_timestamp(0);
        assert!(!zero_receiver.is_relayable());
    }
}
