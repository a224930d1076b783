//! Protocol data model: query requests and responses, download contracts,
//! the gossip envelope and the verification-protocol payloads.
//!
//! Everything that is hashed or signed goes through an explicit canonical
//! serialization (length-framed field concatenation) so the digests are
//! stable regardless of the transport encoding.

use serde::{Deserialize, Serialize};

use crate::crypto;

pub type Result<T> = std::result::Result<T, MessageError>;

#[derive(Debug)]
pub enum MessageError {
    Validation(String),
    Crypto(crypto::CryptoError),
}

impl std::fmt::Display for MessageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "{msg}"),
            Self::Crypto(source) => write!(f, "{source}"),
        }
    }
}

impl std::error::Error for MessageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(_) => None,
            Self::Crypto(source) => Some(source),
        }
    }
}

impl From<crypto::CryptoError> for MessageError {
    fn from(value: crypto::CryptoError) -> Self {
        Self::Crypto(value)
    }
}

fn write_framed(buf: &mut Vec<u8>, field: &[u8]) {
    buf.extend_from_slice(&(field.len() as u32).to_be_bytes());
    buf.extend_from_slice(field);
}

/// A data query gossiped to the network, asking who hosts the listed files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQueryRequest {
    pub file_hashes: Vec<Vec<u8>>,
    pub from_peer: String,
    pub timestamp: u64,
    pub hash: Vec<u8>,
}

impl DataQueryRequest {
    pub fn derive_hash(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for file_hash in &self.file_hashes {
            write_framed(&mut buf, file_hash);
        }
        write_framed(&mut buf, self.from_peer.as_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        crypto::sha256(&buf).to_vec()
    }

    pub fn validate(&self) -> Result<()> {
        if self.file_hashes.is_empty() {
            return Err(MessageError::Validation(
                "data query request has no file hashes".to_string(),
            ));
        }
        if self.from_peer.is_empty() {
            return Err(MessageError::Validation(
                "data query request has no originating peer".to_string(),
            ));
        }
        if self.timestamp == 0 {
            return Err(MessageError::Validation(
                "data query request timestamp is zero".to_string(),
            ));
        }
        if self.hash != self.derive_hash() {
            return Err(MessageError::Validation(
                "data query request hash does not match its fields".to_string(),
            ));
        }
        Ok(())
    }
}

/// A hoster's answer to a data query: which of the requested files it has,
/// their sizes, its fee, and a signature over the whole statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQueryResponse {
    pub from_peer: String,
    pub fees_per_byte: String,
    pub request_hash: Vec<u8>,
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
    pub file_hashes: Vec<Vec<u8>>,
    pub file_hashes_sizes: Vec<u64>,
    pub unavailable_file_hashes: Vec<Vec<u8>>,
    pub timestamp: u64,
}

impl DataQueryResponse {
    /// Canonical bytes covered by `signature`.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_framed(&mut buf, self.from_peer.as_bytes());
        write_framed(&mut buf, self.fees_per_byte.as_bytes());
        write_framed(&mut buf, &self.request_hash);
        write_framed(&mut buf, &self.public_key);
        for file_hash in &self.file_hashes {
            write_framed(&mut buf, file_hash);
        }
        for size in &self.file_hashes_sizes {
            buf.extend_from_slice(&size.to_be_bytes());
        }
        for file_hash in &self.unavailable_file_hashes {
            write_framed(&mut buf, file_hash);
        }
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf
    }

    pub fn verify_signature(&self) -> Result<bool> {
        Ok(crypto::verify_signature(
            &self.public_key,
            &self.signing_bytes(),
            &self.signature,
        )?)
    }
}

/// Binding between hoster, requester and verifier over a subset of files.
/// `verifier_signature` covers `contract_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadContract {
    pub file_hoster_response: DataQueryResponse,
    pub file_requester_public_key: Vec<u8>,
    pub file_hashes_needed: Vec<Vec<u8>>,
    pub file_hashes_needed_sizes: Vec<u64>,
    pub verifier_public_key: Vec<u8>,
    pub verifier_fees: String,
    pub contract_hash: Vec<u8>,
    pub verifier_signature: Vec<u8>,
}

impl DownloadContract {
    pub fn derive_hash(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_framed(&mut buf, &self.file_hoster_response.signing_bytes());
        write_framed(&mut buf, &self.file_hoster_response.signature);
        write_framed(&mut buf, &self.file_requester_public_key);
        for file_hash in &self.file_hashes_needed {
            write_framed(&mut buf, file_hash);
        }
        for size in &self.file_hashes_needed_sizes {
            buf.extend_from_slice(&size.to_be_bytes());
        }
        write_framed(&mut buf, &self.verifier_public_key);
        write_framed(&mut buf, self.verifier_fees.as_bytes());
        crypto::sha256(&buf).to_vec()
    }

    pub fn verify_verifier_signature(&self) -> Result<bool> {
        Ok(crypto::verify_signature(
            &self.verifier_public_key,
            &self.contract_hash,
            &self.verifier_signature,
        )?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.file_hashes_needed.len() != self.file_hashes_needed_sizes.len() {
            return Err(MessageError::Validation(
                "needed file hashes and sizes differ in length".to_string(),
            ));
        }
        self.file_hashes_needed_sizes
            .iter()
            .try_fold(0u64, |total, &size| {
                if size == 0 {
                    return Err(MessageError::Validation(
                        "contract contains a zero file size".to_string(),
                    ));
                }
                total.checked_add(size).ok_or_else(|| {
                    MessageError::Validation("contract file sizes overflow u64".to_string())
                })
            })?;
        if self.contract_hash != self.derive_hash() {
            return Err(MessageError::Validation(
                "contract hash does not match its fields".to_string(),
            ));
        }
        Ok(())
    }

    /// Bytewise concatenation of the needed hashes, the comparison key used
    /// when matching countersigned contracts back to unsigned ones.
    pub fn needed_hashes_concat(&self) -> Vec<u8> {
        self.file_hashes_needed.concat()
    }
}

/// Envelope published to the gossip substrate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GossipPayload {
    Query(DataQueryRequest),
}

/// Parameters of one byte-range transfer from a hoster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTransferInfo {
    pub contract_hash: Vec<u8>,
    pub file_hash: Vec<u8>,
    pub file_size: u64,
    pub from: u64,
    pub to: u64,
}

/// Pull request sent to a verifier asking it to forward stored query
/// responses for the given request hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQueryResponseTransfer {
    pub hash: Vec<u8>,
}

/// Per-segment leaf hashes of a downloaded file, shipped to the verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleTreeNodesOfFileContract {
    pub contract_hash: Vec<u8>,
    pub file_hash: Vec<u8>,
    pub merkle_tree_nodes: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyIvRequest {
    pub contract_hash: Vec<u8>,
    pub file_hash: Vec<u8>,
    pub file_merkle_root_hash: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyIvRequests {
    pub key_ivs: Vec<KeyIvRequest>,
}

/// Key material released by the verifier for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyIvRandomizedFileSegments {
    pub contract_hash: Vec<u8>,
    pub file_hash: Vec<u8>,
    pub key: Vec<u8>,
    pub iv: Vec<u8>,
    pub encryption_type: u32,
    pub randomized_segments: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionData {
    pub key_iv_randomized_file_segments: Vec<KeyIvRandomizedFileSegments>,
}

/// Contract summary embedded into a settlement transaction payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadContractInTransactionData {
    pub contract_hash: Vec<u8>,
    pub file_requester_public_key: Vec<u8>,
    pub file_hoster_public_key: Vec<u8>,
    pub verifier_public_key: Vec<u8>,
    pub verifier_fees: String,
    pub file_hoster_fees_per_byte: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadContractsHashes {
    pub contracts: Vec<DownloadContractInTransactionData>,
}
