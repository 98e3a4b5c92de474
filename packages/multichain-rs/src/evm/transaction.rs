//! Fee-aware transaction construction and signing
//!
//! The fee model picks the envelope: legacy chains get an EIP-155 legacy
//! transaction priced with a single gas price, dynamic-fee chains get an
//! EIP-1559 transaction with the chain id bound into the payload.

use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxKind, B256, U256};
use alloy::signers::local::PrivateKeySigner;

use crate::types::{FeeModel, FeeParameters};

/// Call-specific fields of a transaction, independent of the fee model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub nonce: u64,
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
}

impl TxRequest {
    /// Zero-value contract call
    pub fn call(nonce: u64, to: Address, input: Bytes) -> Self {
        Self {
            nonce,
            to,
            value: U256::ZERO,
            input,
        }
    }
}

/// Unsigned transaction, one variant per fee model
#[derive(Debug, Clone, PartialEq)]
pub enum UnsignedTransaction {
    Legacy(TxLegacy),
    DynamicFee(TxEip1559),
}

impl UnsignedTransaction {
    pub fn build(chain_id: u64, fees: &FeeParameters, request: TxRequest) -> Self {
        let TxRequest {
            nonce,
            to,
            value,
            input,
        } = request;

        match fees.model {
            FeeModel::Legacy { gas_price } => UnsignedTransaction::Legacy(TxLegacy {
                chain_id: Some(chain_id),
                nonce,
                gas_price,
                gas_limit: fees.gas_limit,
                to: TxKind::Call(to),
                value,
                input,
            }),
            FeeModel::DynamicFee {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => UnsignedTransaction::DynamicFee(TxEip1559 {
                chain_id,
                nonce,
                gas_limit: fees.gas_limit,
                max_fee_per_gas,
                max_priority_fee_per_gas,
                to: TxKind::Call(to),
                value,
                access_list: Default::default(),
                input,
            }),
        }
    }

    pub fn chain_id(&self) -> Option<u64> {
        match self {
            UnsignedTransaction::Legacy(tx) => tx.chain_id,
            UnsignedTransaction::DynamicFee(tx) => Some(tx.chain_id),
        }
    }

    pub fn nonce(&self) -> u64 {
        match self {
            UnsignedTransaction::Legacy(tx) => tx.nonce,
            UnsignedTransaction::DynamicFee(tx) => tx.nonce,
        }
    }

    pub fn gas_limit(&self) -> u64 {
        match self {
            UnsignedTransaction::Legacy(tx) => tx.gas_limit,
            UnsignedTransaction::DynamicFee(tx) => tx.gas_limit,
        }
    }

    /// Gas price (legacy) or max fee per gas (dynamic-fee)
    pub fn fee_cap(&self) -> u128 {
        match self {
            UnsignedTransaction::Legacy(tx) => tx.gas_price,
            UnsignedTransaction::DynamicFee(tx) => tx.max_fee_per_gas,
        }
    }

    /// Legacy transactions never carry a tip
    pub fn tip_cap(&self) -> Option<u128> {
        match self {
            UnsignedTransaction::Legacy(_) => None,
            UnsignedTransaction::DynamicFee(tx) => Some(tx.max_priority_fee_per_gas),
        }
    }

    pub fn to(&self) -> Option<Address> {
        let kind = match self {
            UnsignedTransaction::Legacy(tx) => tx.to,
            UnsignedTransaction::DynamicFee(tx) => tx.to,
        };
        kind.to().copied()
    }

    pub fn input(&self) -> &Bytes {
        match self {
            UnsignedTransaction::Legacy(tx) => &tx.input,
            UnsignedTransaction::DynamicFee(tx) => &tx.input,
        }
    }

    /// Sign with `signer`, producing the EIP-2718 wire encoding and its hash
    pub fn sign(
        self,
        signer: &PrivateKeySigner,
    ) -> Result<SignedTransaction, alloy::signers::Error> {
        let envelope = match self {
            UnsignedTransaction::Legacy(mut tx) => {
                let signature = signer.sign_transaction_sync(&mut tx)?;
                TxEnvelope::from(tx.into_signed(signature))
            }
            UnsignedTransaction::DynamicFee(mut tx) => {
                let signature = signer.sign_transaction_sync(&mut tx)?;
                TxEnvelope::from(tx.into_signed(signature))
            }
        };
        Ok(SignedTransaction::from_envelope(&envelope))
    }
}

/// Signed transaction ready for `eth_sendRawTransaction`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub hash: B256,
    pub raw: Bytes,
}

impl SignedTransaction {
    fn from_envelope(envelope: &TxEnvelope) -> Self {
        Self {
            hash: *envelope.tx_hash(),
            raw: envelope.encoded_2718().into(),
        }
    }
}
