//! Collaborator interfaces consumed by the orchestrator.
//!
//! The gossip substrate, peer discovery, the data query and data
//! verification stream protocols, the keystore and the block verifier
//! registry all live outside this crate; the core only ever talks to them
//! through these traits.

use async_trait::async_trait;
use futures_util::Stream;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use crate::crypto::PeerId;
use crate::messages::{
    DataQueryRequest, DataQueryResponse, DataQueryResponseTransfer, DownloadContract,
    EncryptionData, FileTransferInfo, KeyIvRequests, MerkleTreeNodesOfFileContract,
};

pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

/// Opaque collaborator failure. The orchestrator wraps these as transport
/// errors or swallows them per the fan-out policy.
#[derive(Debug)]
pub struct ProtocolError(pub String);

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ProtocolError {}

impl ProtocolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A located peer, as reported by the peer finder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddrInfo {
    pub id: PeerId,
    pub addrs: Vec<String>,
}

/// A block verifier known to the chain layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockVerifier {
    pub public_key_hex: String,
}

/// A key unlocked by the keystore for an authorized access token.
#[derive(Clone)]
pub struct UnlockedKey {
    pub signing_key: ed25519_dalek::SigningKey,
    pub public_key: Vec<u8>,
    pub address: String,
}

#[async_trait]
pub trait NetworkPublisher: Send + Sync {
    async fn publish_message_to_network(&self, data: &[u8]) -> ProtocolResult<()>;
}

#[async_trait]
pub trait PeerFinder: Send + Sync {
    /// Resolves live addresses for the given peers. Unreachable peers are
    /// simply absent from the result.
    async fn find_peers(&self, peer_ids: &[PeerId]) -> Vec<PeerAddrInfo>;
}

#[async_trait]
pub trait DataQueryProtocol: Send + Sync {
    async fn put_query_history(
        &self,
        hash_hex: String,
        request: DataQueryRequest,
    ) -> ProtocolResult<()>;
    async fn get_query_history(&self, hash_hex: &str) -> Option<DataQueryRequest>;
    async fn get_query_response(&self, hash_hex: &str) -> Option<Vec<DataQueryResponse>>;
    async fn request_data_query_response_transfer(
        &self,
        peer: PeerId,
        request: DataQueryResponseTransfer,
    ) -> ProtocolResult<()>;
}

/// Chunked byte stream of one range transfer. The engine owns the file
/// writes and the progress accounting.
pub type ByteStream = Pin<Box<dyn Stream<Item = ProtocolResult<Vec<u8>>> + Send>>;

#[async_trait]
pub trait DataVerificationProtocol: Send + Sync {
    async fn send_contract_to_verifier_for_acceptance(
        &self,
        verifier: PeerId,
        contract: DownloadContract,
    ) -> ProtocolResult<DownloadContract>;

    async fn transfer_contract(
        &self,
        peer: PeerId,
        contract: DownloadContract,
    ) -> ProtocolResult<()>;

    async fn request_file_transfer(
        &self,
        hoster: PeerId,
        info: FileTransferInfo,
    ) -> ProtocolResult<ByteStream>;

    async fn send_file_merkle_tree_nodes(
        &self,
        verifier: PeerId,
        request: MerkleTreeNodesOfFileContract,
    ) -> ProtocolResult<()>;

    async fn request_encryption_data(
        &self,
        verifier: PeerId,
        request: KeyIvRequests,
    ) -> ProtocolResult<EncryptionData>;

    #[allow(clippy::too_many_arguments)]
    async fn decrypt_file(
        &self,
        input: &Path,
        output: &Path,
        key: &[u8],
        iv: &[u8],
        encryption_type: u32,
        randomized_segments: &[u64],
        already_decrypted: bool,
    ) -> ProtocolResult<PathBuf>;

    fn download_directory(&self) -> PathBuf;

    /// Number of file segments covered by the encryption scheme, i.e. how
    /// many Merkle leaves the verifier expects.
    fn merkle_tree_segment_count(&self) -> usize;
}

pub trait KeyAuthorizer: Send + Sync {
    /// Resolves an access token to an unlocked signing key. `None` means the
    /// token is unknown or locked.
    fn authorized(&self, access_token: &str) -> ProtocolResult<Option<UnlockedKey>>;
}

pub trait VerifierRegistry: Send + Sync {
    fn block_verifiers(&self) -> Vec<BlockVerifier>;
}
