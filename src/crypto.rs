//! Digests, peer identity derivation and signature checks.
//!
//! Peers are addressed by the sha256 of their ed25519 public key, rendered
//! as bare lowercase hex. Signatures across the protocol are ed25519.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};
use std::path::Path;

pub type Result<T> = std::result::Result<T, CryptoError>;

pub const PEER_ID_HEX_LEN: usize = 64;

#[derive(Debug)]
pub enum CryptoError {
    InvalidPublicKey,
    InvalidSignature,
    InvalidPeerId(String),
    SegmentCount,
    ReadFile {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for CryptoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPublicKey => write!(f, "public key is not a valid ed25519 key"),
            Self::InvalidSignature => write!(f, "signature bytes are malformed"),
            Self::InvalidPeerId(value) => write!(f, "invalid peer id '{value}'"),
            Self::SegmentCount => write!(f, "segment count must be greater than zero"),
            Self::ReadFile { path, source } => {
                write!(f, "failed to read file '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for CryptoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Network address of a peer, derived from its public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerId(String);

impl PeerId {
    pub fn from_public_key(public_key: &[u8]) -> Self {
        Self(hex::encode(sha256(public_key)))
    }

    pub fn parse(value: &str) -> Result<Self> {
        if value.len() != PEER_ID_HEX_LEN || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CryptoError::InvalidPeerId(value.to_string()));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Checks an ed25519 signature. Malformed key or signature bytes are an
/// error; a well-formed signature that does not match returns `false`.
pub fn verify_signature(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<bool> {
    let key_bytes: [u8; 32] = public_key
        .try_into()
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    let key = VerifyingKey::from_bytes(&key_bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
    let signature = Signature::from_slice(signature).map_err(|_| CryptoError::InvalidSignature)?;
    Ok(key.verify(message, &signature).is_ok())
}

/// On-chain address of a public key: the trailing 20 bytes of its sha256,
/// `0x`-prefixed.
pub fn raw_public_to_address(public_key: &[u8]) -> String {
    let digest = sha256(public_key);
    format!("0x{}", hex::encode(&digest[12..]))
}

/// Splits a file into `total_segments` contiguous blocks and hashes the
/// blocks selected by `indexes`, in the given order. The last block absorbs
/// the remainder, mirroring the byte-range planner.
pub async fn hash_file_block_segments(
    path: &Path,
    total_segments: usize,
    indexes: &[usize],
) -> Result<Vec<Vec<u8>>> {
    if total_segments == 0 {
        return Err(CryptoError::SegmentCount);
    }
    let contents = tokio::fs::read(path)
        .await
        .map_err(|source| CryptoError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

    let segment_len = contents.len() / total_segments;
    let mut nodes = Vec::with_capacity(indexes.len());
    for &idx in indexes {
        let start = (idx * segment_len).min(contents.len());
        let end = if idx + 1 == total_segments {
            contents.len()
        } else {
            ((idx + 1) * segment_len).min(contents.len())
        };
        nodes.push(sha256(&contents[start..end]).to_vec());
    }
    Ok(nodes)
}
