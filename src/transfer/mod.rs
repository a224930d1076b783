//! The data-transfer orchestrator: query coordination, coverage solving,
//! contract lifecycle, the download engine and the decryption driver.

pub mod contracts;
pub mod coverage;
pub mod decrypt;
pub mod download;
pub mod errors;
pub mod query;
pub mod ranges;

#[cfg(test)]
pub(crate) mod testutil;

pub use errors::{Result, TransferError};

use std::sync::Arc;

use crate::contract::ContractStore;
use crate::crypto::PeerId;
use crate::hexutil;
use crate::protocols::{
    DataQueryProtocol, DataVerificationProtocol, KeyAuthorizer, NetworkPublisher, PeerFinder,
    VerifierRegistry,
};

/// This node's identity on the network: its public key and the peer id
/// derived from it.
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    pub peer_id: PeerId,
    pub public_key: Vec<u8>,
}

impl NodeIdentity {
    pub fn from_public_key(public_key: Vec<u8>) -> Self {
        Self {
            peer_id: PeerId::from_public_key(&public_key),
            public_key,
        }
    }
}

/// Orchestrator facade served over the HTTP API. Cheap to clone; every
/// download session and fan-out branch runs on a clone of this handle.
#[derive(Clone)]
pub struct DataTransferService {
    pub(crate) identity: NodeIdentity,
    pub(crate) publisher: Arc<dyn NetworkPublisher>,
    pub(crate) peer_finder: Arc<dyn PeerFinder>,
    pub(crate) data_query: Arc<dyn DataQueryProtocol>,
    pub(crate) data_verification: Arc<dyn DataVerificationProtocol>,
    pub(crate) keystore: Arc<dyn KeyAuthorizer>,
    pub(crate) verifier_registry: Arc<dyn VerifierRegistry>,
    pub(crate) contract_store: Arc<ContractStore>,
}

impl DataTransferService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity: NodeIdentity,
        publisher: Arc<dyn NetworkPublisher>,
        peer_finder: Arc<dyn PeerFinder>,
        data_query: Arc<dyn DataQueryProtocol>,
        data_verification: Arc<dyn DataVerificationProtocol>,
        keystore: Arc<dyn KeyAuthorizer>,
        verifier_registry: Arc<dyn VerifierRegistry>,
        contract_store: Arc<ContractStore>,
    ) -> Self {
        Self {
            identity,
            publisher,
            peer_finder,
            data_query,
            data_verification,
            keystore,
            verifier_registry,
            contract_store,
        }
    }

    pub fn contract_store(&self) -> &Arc<ContractStore> {
        &self.contract_store
    }

    /// Peer ids of the known block verifiers. Registry entries whose public
    /// key does not decode are skipped.
    pub(crate) fn verifier_peer_ids(&self) -> Vec<PeerId> {
        self.verifier_registry
            .block_verifiers()
            .iter()
            .filter_map(|v| hexutil::decode(&v.public_key_hex).ok())
            .map(|public_key| PeerId::from_public_key(&public_key))
            .collect()
    }
}

pub(crate) fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
