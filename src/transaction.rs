//! Settlement transaction envelope.
//!
//! A settlement transaction pays the verifier the hoster and verifier fees
//! for one download contract. Its `data` field carries a typed payload with
//! the contract summary; the requester signs the transaction hash with their
//! keystore key before handing it to the chain layer.

use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};

use crate::crypto;
use crate::hexutil;

pub const MAIN_CHAIN_ID: &str = "0x01";

pub type Result<T> = std::result::Result<T, TransactionError>;

#[derive(Debug)]
pub enum TransactionError {
    Validation(String),
}

impl std::fmt::Display for TransactionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for TransactionError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataPayloadType {
    DataContract,
}

/// Typed payload embedded in a transaction's `data` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPayload {
    pub payload_type: DataPayloadType,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub hash: Vec<u8>,
    pub signature: Vec<u8>,
    pub public_key: Vec<u8>,
    pub nounce: Vec<u8>,
    pub data: Vec<u8>,
    pub from: String,
    pub to: String,
    pub value: String,
    pub transaction_fees: String,
    pub chain: Vec<u8>,
}

/// Hex projection of a signed transaction, the shape emitted to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonTransaction {
    pub hash: String,
    pub signature: String,
    pub public_key: String,
    pub nounce: String,
    pub data: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub transaction_fees: String,
    pub chain: String,
}

fn write_framed(buf: &mut Vec<u8>, field: &[u8]) {
    buf.extend_from_slice(&(field.len() as u32).to_be_bytes());
    buf.extend_from_slice(field);
}

impl Transaction {
    fn signing_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_framed(&mut buf, &self.public_key);
        write_framed(&mut buf, &self.nounce);
        write_framed(&mut buf, &self.data);
        write_framed(&mut buf, self.from.as_bytes());
        write_framed(&mut buf, self.to.as_bytes());
        write_framed(&mut buf, self.value.as_bytes());
        write_framed(&mut buf, self.transaction_fees.as_bytes());
        write_framed(&mut buf, &self.chain);
        buf
    }

    pub fn sign(&mut self, key: &SigningKey) {
        self.hash = crypto::sha256(&self.signing_bytes()).to_vec();
        self.signature = key.sign(&self.hash).to_bytes().to_vec();
    }

    pub fn validate(&self) -> Result<()> {
        if self.from.is_empty() || self.to.is_empty() {
            return Err(TransactionError::Validation(
                "transaction from and to addresses must be set".to_string(),
            ));
        }
        if self.nounce.len() != 8 {
            return Err(TransactionError::Validation(
                "transaction nounce must be 8 bytes".to_string(),
            ));
        }
        hexutil::decode_u128(&self.value).map_err(|e| {
            TransactionError::Validation(format!("transaction value is not valid hex: {e}"))
        })?;
        hexutil::decode_u128(&self.transaction_fees).map_err(|e| {
            TransactionError::Validation(format!("transaction fees are not valid hex: {e}"))
        })?;
        if self.hash != crypto::sha256(&self.signing_bytes()).to_vec() {
            return Err(TransactionError::Validation(
                "transaction hash does not match its fields".to_string(),
            ));
        }
        let verified = crypto::verify_signature(&self.public_key, &self.hash, &self.signature)
            .map_err(|e| TransactionError::Validation(e.to_string()))?;
        if !verified {
            return Err(TransactionError::Validation(
                "transaction signature does not verify".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_json(&self) -> JsonTransaction {
        JsonTransaction {
            hash: hexutil::encode(&self.hash),
            signature: hexutil::encode(&self.signature),
            public_key: hexutil::encode(&self.public_key),
            nounce: hexutil::encode_u64_bytes_to_hex(&self.nounce),
            data: hexutil::encode(&self.data),
            from: self.from.clone(),
            to: self.to.clone(),
            value: self.value.clone(),
            transaction_fees: self.transaction_fees.clone(),
            chain: hexutil::encode(&self.chain),
        }
    }
}
