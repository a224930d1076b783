//! Process-wide registry of active contracts and per-file download state.
//!
//! All mutable in-memory transfer state lives here: the signed contracts,
//! per-file progress, per-range cancellation tokens and decryption state.
//! A single poison-recovering mutex serializes every operation; nothing
//! awaits while the lock is held.
//!
//! Contracts are keyed by the `0x`-hex of their hash. Download contexts are
//! keyed by the compound `contract_hash_hex || file_hash_hex` string so that
//! pausing one file never disturbs another file of the same contract.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::hexutil;
use crate::messages::DownloadContract;

pub type Result<T> = std::result::Result<T, ContractStoreError>;

#[derive(Debug)]
pub enum ContractStoreError {
    ContractNotFound(String),
    FileNotFound(String),
}

impl std::fmt::Display for ContractStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContractNotFound(hash) => write!(f, "contract {hash} not found"),
            Self::FileNotFound(hash) => write!(f, "file {hash} not found in contract"),
        }
    }
}

impl std::error::Error for ContractStoreError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDecryptionStatus {
    NotStarted,
    Decrypting,
    Decrypted,
    Error,
}

/// One on-disk part file of a byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePartInfo {
    pub from: u64,
    pub to: u64,
    pub destination_path: PathBuf,
    pub downloaded_size: u64,
    pub error: Option<String>,
}

/// Cancellation handle for one in-flight range worker.
#[derive(Debug, Clone)]
pub struct RangeDownloadContext {
    pub from: u64,
    pub to: u64,
    pub token: CancellationToken,
}

#[derive(Debug, Clone)]
struct FileProgress {
    file_size: u64,
    bytes_transferred: u64,
    error: Option<String>,
    decryption_status: FileDecryptionStatus,
    part_infos: Vec<FilePartInfo>,
}

/// Snapshot of a file's progress, as returned to readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractFileInfo {
    pub file_size: u64,
    pub bytes_transferred: u64,
    pub error: Option<String>,
    pub decryption_status: FileDecryptionStatus,
}

#[derive(Default)]
struct StoreInner {
    contracts: HashMap<String, DownloadContract>,
    progress: HashMap<String, HashMap<Vec<u8>, FileProgress>>,
    download_contexts: HashMap<String, Vec<RangeDownloadContext>>,
}

#[derive(Default)]
pub struct ContractStore {
    inner: Mutex<StoreInner>,
}

impl ContractStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compound key under which a file's range cancellation tokens live.
    pub fn download_context_key(contract_hash_hex: &str, file_hash: &[u8]) -> String {
        format!("{contract_hash_hex}{}", hexutil::encode_no_prefix(file_hash))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("contract store lock poisoned; continuing with recovered state");
                poisoned.into_inner()
            }
        }
    }

    /// Inserts a contract. Re-inserting the same contract hash is a no-op.
    pub fn create_contract(&self, contract: DownloadContract) {
        let key = hexutil::encode(&contract.contract_hash);
        let mut inner = self.lock();
        inner.contracts.entry(key).or_insert(contract);
    }

    pub fn get_contract(&self, contract_hash_hex: &str) -> Result<DownloadContract> {
        let inner = self.lock();
        inner
            .contracts
            .get(contract_hash_hex)
            .cloned()
            .ok_or_else(|| ContractStoreError::ContractNotFound(contract_hash_hex.to_string()))
    }

    /// Materializes the progress entry for a file. The recorded file size
    /// never decreases across calls.
    pub fn set_file_size(&self, contract_hash_hex: &str, file_hash: &[u8], size: u64) {
        let mut inner = self.lock();
        let files = inner
            .progress
            .entry(contract_hash_hex.to_string())
            .or_default();
        match files.get_mut(file_hash) {
            Some(progress) => progress.file_size = progress.file_size.max(size),
            None => {
                files.insert(
                    file_hash.to_vec(),
                    FileProgress {
                        file_size: size,
                        bytes_transferred: 0,
                        error: None,
                        decryption_status: FileDecryptionStatus::NotStarted,
                        part_infos: Vec::new(),
                    },
                );
            }
        }
    }

    /// Registers a range cancellation token under the compound key.
    pub fn set_download_context(&self, key: &str, ctx: RangeDownloadContext) {
        let mut inner = self.lock();
        inner
            .download_contexts
            .entry(key.to_string())
            .or_default()
            .push(ctx);
    }

    /// Cancels and removes every token registered under the key. Idempotent.
    /// Once this returns, `increment_transferred` refuses deltas from the
    /// cancelled tokens.
    pub fn cancel_download_contexts(&self, key: &str) {
        let mut inner = self.lock();
        if let Some(contexts) = inner.download_contexts.remove(key) {
            for ctx in contexts {
                ctx.token.cancel();
            }
        }
    }

    pub fn transferred_bytes(&self, contract_hash_hex: &str, file_hash: &[u8]) -> u64 {
        let inner = self.lock();
        inner
            .progress
            .get(contract_hash_hex)
            .and_then(|files| files.get(file_hash))
            .map(|p| p.bytes_transferred)
            .unwrap_or(0)
    }

    /// Adds `delta` to the transferred counter, unless the supplying worker
    /// has been cancelled. The cancellation check and the increment happen
    /// under the same lock that `cancel_download_contexts` takes, so no
    /// increment is observable after a cancel has returned.
    pub fn increment_transferred(
        &self,
        contract_hash_hex: &str,
        file_hash: &[u8],
        token: &CancellationToken,
        delta: u64,
    ) -> bool {
        let mut inner = self.lock();
        if token.is_cancelled() {
            return false;
        }
        if let Some(progress) = inner
            .progress
            .get_mut(contract_hash_hex)
            .and_then(|files| files.get_mut(file_hash))
        {
            progress.bytes_transferred = progress.bytes_transferred.saturating_add(delta);
            return true;
        }
        false
    }

    /// Lifts the transferred counter to `floor` when parts already on disk
    /// account for more than the in-memory state knows about.
    pub fn raise_transferred_to(&self, contract_hash_hex: &str, file_hash: &[u8], floor: u64) {
        let mut inner = self.lock();
        if let Some(progress) = inner
            .progress
            .get_mut(contract_hash_hex)
            .and_then(|files| files.get_mut(file_hash))
        {
            progress.bytes_transferred = progress.bytes_transferred.max(floor);
        }
    }

    pub fn reset_transferred_bytes(&self, contract_hash_hex: &str, file_hash: &[u8]) -> Result<()> {
        let mut inner = self.lock();
        let progress = inner
            .progress
            .get_mut(contract_hash_hex)
            .and_then(|files| files.get_mut(file_hash))
            .ok_or_else(|| {
                ContractStoreError::FileNotFound(hexutil::encode_no_prefix(file_hash))
            })?;
        progress.bytes_transferred = 0;
        progress.error = None;
        progress.part_infos.clear();
        Ok(())
    }

    /// Upserts a part file record, matched by destination path.
    pub fn record_file_part(&self, contract_hash_hex: &str, file_hash: &[u8], part: FilePartInfo) {
        let mut inner = self.lock();
        let files = inner
            .progress
            .entry(contract_hash_hex.to_string())
            .or_default();
        let progress = files.entry(file_hash.to_vec()).or_insert(FileProgress {
            file_size: 0,
            bytes_transferred: 0,
            error: None,
            decryption_status: FileDecryptionStatus::NotStarted,
            part_infos: Vec::new(),
        });
        match progress
            .part_infos
            .iter_mut()
            .find(|p| p.destination_path == part.destination_path)
        {
            Some(existing) => {
                existing.downloaded_size = part.downloaded_size;
                existing.from = part.from;
                existing.to = part.to;
            }
            None => progress.part_infos.push(part),
        }
    }

    /// Part records for a file, ordered by range end ascending, which is the
    /// concatenation order at reassembly time.
    pub fn downloaded_file_part_infos(
        &self,
        contract_hash_hex: &str,
        file_hash: &[u8],
    ) -> Vec<FilePartInfo> {
        let inner = self.lock();
        let mut parts = inner
            .progress
            .get(contract_hash_hex)
            .and_then(|files| files.get(file_hash))
            .map(|p| p.part_infos.clone())
            .unwrap_or_default();
        parts.sort_by_key(|p| p.to);
        parts
    }

    pub fn set_error(&self, contract_hash_hex: &str, file_hash: &[u8], message: String) {
        let mut inner = self.lock();
        if let Some(progress) = inner
            .progress
            .get_mut(contract_hash_hex)
            .and_then(|files| files.get_mut(file_hash))
        {
            progress.error = Some(message);
        }
    }

    pub fn set_file_part_error(
        &self,
        contract_hash_hex: &str,
        file_hash: &[u8],
        part_name: &str,
        message: String,
    ) {
        let mut inner = self.lock();
        if let Some(progress) = inner
            .progress
            .get_mut(contract_hash_hex)
            .and_then(|files| files.get_mut(file_hash))
        {
            if let Some(part) = progress.part_infos.iter_mut().find(|p| {
                p.destination_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n == part_name)
            }) {
                part.error = Some(message);
            } else {
                progress.error = Some(message);
            }
        }
    }

    pub fn set_decryption_status(
        &self,
        contract_hash_hex: &str,
        file_hash: &[u8],
        status: FileDecryptionStatus,
    ) {
        let mut inner = self.lock();
        if let Some(progress) = inner
            .progress
            .get_mut(contract_hash_hex)
            .and_then(|files| files.get_mut(file_hash))
        {
            progress.decryption_status = status;
        }
    }

    pub fn file_info(&self, contract_hash_hex: &str, file_hash: &[u8]) -> Result<ContractFileInfo> {
        let inner = self.lock();
        inner
            .progress
            .get(contract_hash_hex)
            .and_then(|files| files.get(file_hash))
            .map(|p| ContractFileInfo {
                file_size: p.file_size,
                bytes_transferred: p.bytes_transferred,
                error: p.error.clone(),
                decryption_status: p.decryption_status,
            })
            .ok_or_else(|| ContractStoreError::FileNotFound(hexutil::encode_no_prefix(file_hash)))
    }
}
