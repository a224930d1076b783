//! Mock collaborators for exercising the orchestrator without a network.

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use futures_util::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::contract::ContractStore;
use crate::crypto::PeerId;
use crate::hexutil;
use crate::messages::{
    DataQueryRequest, DataQueryResponse, DataQueryResponseTransfer, DownloadContract,
    EncryptionData, FileTransferInfo, KeyIvRandomizedFileSegments, KeyIvRequests,
    MerkleTreeNodesOfFileContract,
};
use crate::protocols::{
    BlockVerifier, ByteStream, DataQueryProtocol, DataVerificationProtocol, KeyAuthorizer,
    NetworkPublisher, PeerAddrInfo, PeerFinder, ProtocolError, ProtocolResult, UnlockedKey,
    VerifierRegistry,
};
use crate::transfer::{DataTransferService, NodeIdentity};

pub(crate) const ACCESS_TOKEN: &str = "unit-test-token";

pub(crate) fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}_{}_{nanos}", std::process::id()))
}

pub(crate) fn signed_response(
    hoster_key: &SigningKey,
    request_hash: &[u8],
    fees_per_byte: &str,
    available: &[(&[u8], u64)],
    unavailable: &[&[u8]],
) -> DataQueryResponse {
    let public_key = hoster_key.verifying_key().to_bytes().to_vec();
    let mut response = DataQueryResponse {
        from_peer: PeerId::from_public_key(&public_key).to_string(),
        fees_per_byte: fees_per_byte.to_string(),
        request_hash: request_hash.to_vec(),
        public_key,
        signature: Vec::new(),
        file_hashes: available.iter().map(|(h, _)| h.to_vec()).collect(),
        file_hashes_sizes: available.iter().map(|(_, s)| *s).collect(),
        unavailable_file_hashes: unavailable.iter().map(|h| h.to_vec()).collect(),
        timestamp: 1700000000,
    };
    response.signature = hoster_key
        .sign(&response.signing_bytes())
        .to_bytes()
        .to_vec();
    response
}

#[derive(Default)]
pub(crate) struct MockPublisher {
    pub(crate) published: Mutex<Vec<Vec<u8>>>,
}

#[async_trait]
impl NetworkPublisher for MockPublisher {
    async fn publish_message_to_network(&self, data: &[u8]) -> ProtocolResult<()> {
        self.published
            .lock()
            .expect("published")
            .push(data.to_vec());
        Ok(())
    }
}

/// Answers `find_peers` with the configured peers that were asked for.
#[derive(Default)]
pub(crate) struct MockPeerFinder {
    pub(crate) known: Vec<PeerId>,
}

#[async_trait]
impl PeerFinder for MockPeerFinder {
    async fn find_peers(&self, peer_ids: &[PeerId]) -> Vec<PeerAddrInfo> {
        self.known
            .iter()
            .filter(|id| peer_ids.contains(id))
            .map(|id| PeerAddrInfo {
                id: id.clone(),
                addrs: vec!["/memory/0".to_string()],
            })
            .collect()
    }
}

#[derive(Default)]
pub(crate) struct MockDataQuery {
    history: Mutex<HashMap<String, DataQueryRequest>>,
    responses: Mutex<HashMap<String, Vec<DataQueryResponse>>>,
    pub(crate) transfer_requests: Mutex<Vec<(PeerId, DataQueryResponseTransfer)>>,
}

impl MockDataQuery {
    pub(crate) fn seed_responses(&self, hash_hex: &str, responses: Vec<DataQueryResponse>) {
        self.responses
            .lock()
            .expect("responses")
            .insert(hash_hex.to_string(), responses);
    }
}

#[async_trait]
impl DataQueryProtocol for MockDataQuery {
    async fn put_query_history(
        &self,
        hash_hex: String,
        request: DataQueryRequest,
    ) -> ProtocolResult<()> {
        self.history
            .lock()
            .expect("history")
            .insert(hash_hex, request);
        Ok(())
    }

    async fn get_query_history(&self, hash_hex: &str) -> Option<DataQueryRequest> {
        self.history.lock().expect("history").get(hash_hex).cloned()
    }

    async fn get_query_response(&self, hash_hex: &str) -> Option<Vec<DataQueryResponse>> {
        self.responses
            .lock()
            .expect("responses")
            .get(hash_hex)
            .cloned()
    }

    async fn request_data_query_response_transfer(
        &self,
        peer: PeerId,
        request: DataQueryResponseTransfer,
    ) -> ProtocolResult<()> {
        self.transfer_requests
            .lock()
            .expect("transfer requests")
            .push((peer, request));
        Ok(())
    }
}

/// In-memory hoster + verifier: countersigns contracts with per-peer keys,
/// serves file ranges from seeded contents and "decrypts" by copying.
pub(crate) struct MockVerification {
    pub(crate) download_dir: PathBuf,
    pub(crate) segment_count: usize,
    pub(crate) verifier_keys: HashMap<PeerId, SigningKey>,
    pub(crate) verifier_fees: String,
    pub(crate) hosted_files: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
    /// When set, range streams deliver one chunk and then stall until
    /// cancelled. Used by the pause tests.
    pub(crate) stall_after_first_chunk: AtomicBool,
    pub(crate) transferred_contracts: Mutex<Vec<(PeerId, DownloadContract)>>,
    pub(crate) merkle_uploads: Mutex<Vec<(PeerId, MerkleTreeNodesOfFileContract)>>,
    pub(crate) encryption_data: Mutex<Option<EncryptionData>>,
}

impl MockVerification {
    pub(crate) fn new(download_dir: PathBuf, verifier_keys: Vec<SigningKey>) -> Self {
        let verifier_keys = verifier_keys
            .into_iter()
            .map(|key| {
                let id = PeerId::from_public_key(&key.verifying_key().to_bytes());
                (id, key)
            })
            .collect();
        Self {
            download_dir,
            segment_count: 2,
            verifier_keys,
            verifier_fees: "0x10".to_string(),
            hosted_files: Mutex::new(HashMap::new()),
            stall_after_first_chunk: AtomicBool::new(false),
            transferred_contracts: Mutex::new(Vec::new()),
            merkle_uploads: Mutex::new(Vec::new()),
            encryption_data: Mutex::new(None),
        }
    }

    pub(crate) fn host_file(&self, file_hash: &[u8], contents: Vec<u8>) {
        self.hosted_files
            .lock()
            .expect("hosted files")
            .insert(file_hash.to_vec(), contents);
    }

    pub(crate) fn seed_encryption_data(&self, segments: Vec<KeyIvRandomizedFileSegments>) {
        *self.encryption_data.lock().expect("encryption data") = Some(EncryptionData {
            key_iv_randomized_file_segments: segments,
        });
    }
}

#[async_trait]
impl DataVerificationProtocol for MockVerification {
    async fn send_contract_to_verifier_for_acceptance(
        &self,
        verifier: PeerId,
        contract: DownloadContract,
    ) -> ProtocolResult<DownloadContract> {
        let key = self
            .verifier_keys
            .get(&verifier)
            .ok_or_else(|| ProtocolError::new("unknown verifier"))?;
        let mut signed = contract;
        signed.verifier_public_key = key.verifying_key().to_bytes().to_vec();
        signed.verifier_fees = self.verifier_fees.clone();
        signed.contract_hash = signed.derive_hash();
        signed.verifier_signature = key.sign(&signed.contract_hash).to_bytes().to_vec();
        Ok(signed)
    }

    async fn transfer_contract(
        &self,
        peer: PeerId,
        contract: DownloadContract,
    ) -> ProtocolResult<()> {
        self.transferred_contracts
            .lock()
            .expect("transferred contracts")
            .push((peer, contract));
        Ok(())
    }

    async fn request_file_transfer(
        &self,
        _hoster: PeerId,
        info: FileTransferInfo,
    ) -> ProtocolResult<ByteStream> {
        let contents = self
            .hosted_files
            .lock()
            .expect("hosted files")
            .get(&info.file_hash)
            .cloned()
            .ok_or_else(|| ProtocolError::new("file is not hosted"))?;
        if info.to >= contents.len() as u64 || info.from > info.to {
            return Err(ProtocolError::new("requested range is out of bounds"));
        }
        let window = contents[info.from as usize..=info.to as usize].to_vec();
        let chunks: Vec<ProtocolResult<Vec<u8>>> =
            window.chunks(3).map(|c| Ok(c.to_vec())).collect();
        if self.stall_after_first_chunk.load(Ordering::SeqCst) {
            let first = chunks.into_iter().take(1);
            let stream = futures_util::stream::iter(first).chain(futures_util::stream::pending());
            return Ok(stream.boxed());
        }
        Ok(futures_util::stream::iter(chunks).boxed())
    }

    async fn send_file_merkle_tree_nodes(
        &self,
        verifier: PeerId,
        request: MerkleTreeNodesOfFileContract,
    ) -> ProtocolResult<()> {
        self.merkle_uploads
            .lock()
            .expect("merkle uploads")
            .push((verifier, request));
        Ok(())
    }

    async fn request_encryption_data(
        &self,
        _verifier: PeerId,
        _request: KeyIvRequests,
    ) -> ProtocolResult<EncryptionData> {
        self.encryption_data
            .lock()
            .expect("encryption data")
            .clone()
            .ok_or_else(|| ProtocolError::new("no encryption data seeded"))
    }

    async fn decrypt_file(
        &self,
        input: &Path,
        output: &Path,
        _key: &[u8],
        _iv: &[u8],
        _encryption_type: u32,
        _randomized_segments: &[u64],
        _already_decrypted: bool,
    ) -> ProtocolResult<PathBuf> {
        tokio::fs::copy(input, output)
            .await
            .map_err(|e| ProtocolError::new(e.to_string()))?;
        Ok(output.to_path_buf())
    }

    fn download_directory(&self) -> PathBuf {
        self.download_dir.clone()
    }

    fn merkle_tree_segment_count(&self) -> usize {
        self.segment_count
    }
}

pub(crate) struct MockKeystore {
    pub(crate) key: SigningKey,
}

impl KeyAuthorizer for MockKeystore {
    fn authorized(&self, access_token: &str) -> ProtocolResult<Option<UnlockedKey>> {
        if access_token != ACCESS_TOKEN {
            return Ok(None);
        }
        let public_key = self.key.verifying_key().to_bytes().to_vec();
        let address = crate::crypto::raw_public_to_address(&public_key);
        Ok(Some(UnlockedKey {
            signing_key: self.key.clone(),
            public_key,
            address,
        }))
    }
}

pub(crate) struct MockRegistry {
    pub(crate) verifiers: Vec<BlockVerifier>,
}

impl VerifierRegistry for MockRegistry {
    fn block_verifiers(&self) -> Vec<BlockVerifier> {
        self.verifiers.clone()
    }
}

/// Fully wired service over mocks, with handles to every collaborator.
pub(crate) struct TestEnv {
    pub(crate) service: DataTransferService,
    pub(crate) publisher: Arc<MockPublisher>,
    pub(crate) data_query: Arc<MockDataQuery>,
    pub(crate) verification: Arc<MockVerification>,
    pub(crate) store: Arc<ContractStore>,
    pub(crate) download_dir: PathBuf,
    pub(crate) verifier_keys: Vec<SigningKey>,
    pub(crate) hoster_key: SigningKey,
}

pub(crate) fn test_env(prefix: &str, verifier_count: usize) -> TestEnv {
    let download_dir = unique_temp_dir(prefix);
    let verifier_keys: Vec<SigningKey> = (0..verifier_count)
        .map(|i| SigningKey::from_bytes(&[0x40 + i as u8; 32]))
        .collect();
    let hoster_key = SigningKey::from_bytes(&[0x11; 32]);
    let requester_key = SigningKey::from_bytes(&[0x22; 32]);

    let verifier_peer_ids: Vec<PeerId> = verifier_keys
        .iter()
        .map(|k| PeerId::from_public_key(&k.verifying_key().to_bytes()))
        .collect();
    let registry = MockRegistry {
        verifiers: verifier_keys
            .iter()
            .map(|k| BlockVerifier {
                public_key_hex: hexutil::encode(&k.verifying_key().to_bytes()),
            })
            .collect(),
    };

    let publisher = Arc::new(MockPublisher::default());
    let data_query = Arc::new(MockDataQuery::default());
    let verification = Arc::new(MockVerification::new(
        download_dir.clone(),
        verifier_keys.clone(),
    ));
    let store = Arc::new(ContractStore::new());
    let keystore = Arc::new(MockKeystore {
        key: requester_key.clone(),
    });

    let service = DataTransferService::new(
        NodeIdentity::from_public_key(requester_key.verifying_key().to_bytes().to_vec()),
        publisher.clone(),
        Arc::new(MockPeerFinder {
            known: verifier_peer_ids,
        }),
        data_query.clone(),
        verification.clone(),
        keystore,
        Arc::new(registry),
        store.clone(),
    );

    TestEnv {
        service,
        publisher,
        data_query,
        verification,
        store,
        download_dir,
        verifier_keys,
        hoster_key,
    }
}

/// Builds a verifier-countersigned contract over the given hoster response,
/// signed by the environment's first verifier key.
pub(crate) fn signed_contract(
    env: &TestEnv,
    response: DataQueryResponse,
    needed: &[(&[u8], u64)],
) -> DownloadContract {
    let key = &env.verifier_keys[0];
    let mut contract = DownloadContract {
        file_hoster_response: response,
        file_requester_public_key: env.service.identity.public_key.clone(),
        file_hashes_needed: needed.iter().map(|(h, _)| h.to_vec()).collect(),
        file_hashes_needed_sizes: needed.iter().map(|(_, s)| *s).collect(),
        verifier_public_key: key.verifying_key().to_bytes().to_vec(),
        verifier_fees: "0x10".to_string(),
        contract_hash: Vec::new(),
        verifier_signature: Vec::new(),
    };
    contract.contract_hash = contract.derive_hash();
    contract.verifier_signature = key.sign(&contract.contract_hash).to_bytes().to_vec();
    contract
}

/// Seeds a query request + its responses and returns the request hash hex.
pub(crate) async fn seed_query(
    env: &TestEnv,
    file_hashes: &[&[u8]],
    responses: Vec<DataQueryResponse>,
) -> String {
    let mut request = DataQueryRequest {
        file_hashes: file_hashes.iter().map(|h| h.to_vec()).collect(),
        from_peer: env.service.identity.peer_id.to_string(),
        timestamp: 1700000000,
        hash: Vec::new(),
    };
    request.hash = request.derive_hash();
    let hash_hex = hexutil::encode(&request.hash);
    env.data_query
        .put_query_history(hash_hex.clone(), request)
        .await
        .expect("seed history");
    env.data_query.seed_responses(&hash_hex, responses);
    hash_hex
}
