//! Post-download verification handshake: ship the file's segment hashes to
//! the verifier, pull the key/IV material back and drive decryption.

use std::path::Path;

use crate::contract::FileDecryptionStatus;
use crate::crypto::{self, PeerId};
use crate::hexutil;
use crate::messages::{KeyIvRequest, KeyIvRequests, MerkleTreeNodesOfFileContract};
use crate::transfer::errors::{Result, TransferError};
use crate::transfer::DataTransferService;

impl DataTransferService {
    /// Hashes the reassembled file's segments and ships the leaves to the
    /// contract's verifier. Requires a fully transferred, error-free file.
    pub async fn send_file_merkle_tree_nodes_to_verifier(
        &self,
        contract_hash_hex: &str,
        file_hash_hex: &str,
    ) -> Result<()> {
        let file_hash = hexutil::decode_no_prefix(file_hash_hex)
            .map_err(|e| TransferError::Decode(format!("failed to decode file hash: {e}")))?;
        let contract = self.contract_store.get_contract(contract_hash_hex)?;
        self.ensure_fully_transferred(contract_hash_hex, &file_hash)?;

        let total_segments = self.data_verification.merkle_tree_segment_count();
        let file_path = self
            .data_verification
            .download_directory()
            .join(contract_hash_hex)
            .join(file_hash_hex);

        let ordered: Vec<usize> = (0..total_segments).collect();
        let merkle_tree_nodes =
            crypto::hash_file_block_segments(&file_path, total_segments, &ordered)
                .await
                .map_err(|e| {
                    TransferError::Validation(format!(
                        "failed to hash downloaded file block segments: {e}"
                    ))
                })?;

        let contract_hash = hexutil::decode(contract_hash_hex)
            .map_err(|e| TransferError::Decode(format!("failed to decode contract hash: {e}")))?;
        let request = MerkleTreeNodesOfFileContract {
            contract_hash,
            file_hash,
            merkle_tree_nodes,
        };

        let verifier_id = PeerId::from_public_key(&contract.verifier_public_key);
        self.data_verification
            .send_file_merkle_tree_nodes(verifier_id, request)
            .await
            .map_err(|e| {
                TransferError::Transport(format!(
                    "failed to send merkle tree nodes to verifier: {e}"
                ))
            })?;
        Ok(())
    }

    /// Requests key/IV material for a batch of downloaded files and decrypts
    /// each into its caller-provided restored path. Returns the decrypted
    /// paths in reply order of successful decryptions.
    pub async fn request_encryption_data_from_verifier_and_decrypt(
        &self,
        contract_hash_hex: &str,
        file_hashes: &[String],
        file_merkle_root_hashes: &[String],
        restored_file_paths: &[String],
    ) -> Result<Vec<String>> {
        if file_hashes.len() != file_merkle_root_hashes.len() {
            return Err(TransferError::Validation(
                "size of merkle root hashes and the file hashes are not equal".to_string(),
            ));
        }
        if file_hashes.len() != restored_file_paths.len() {
            return Err(TransferError::Validation(
                "size of restored file paths and the file hashes are not equal".to_string(),
            ));
        }
        let contract = self.contract_store.get_contract(contract_hash_hex)?;
        let contract_hash = hexutil::decode(contract_hash_hex)
            .map_err(|e| TransferError::Decode(format!("failed to decode contract hash: {e}")))?;

        let mut key_ivs = Vec::with_capacity(file_hashes.len());
        for (idx, file_hash_hex) in file_hashes.iter().enumerate() {
            let file_hash = hexutil::decode_no_prefix(file_hash_hex)
                .map_err(|e| TransferError::Decode(format!("failed to decode file hash: {e}")))?;
            self.ensure_fully_transferred(contract_hash_hex, &file_hash)?;
            let file_merkle_root_hash = hexutil::decode(&file_merkle_root_hashes[idx])
                .map_err(|e| {
                    TransferError::Decode(format!("failed to decode merkle root hash: {e}"))
                })?;
            key_ivs.push(KeyIvRequest {
                contract_hash: contract_hash.clone(),
                file_hash,
                file_merkle_root_hash,
            });
        }

        let verifier_id = PeerId::from_public_key(&contract.verifier_public_key);
        let encryption_data = self
            .data_verification
            .request_encryption_data(verifier_id, KeyIvRequests { key_ivs: key_ivs.clone() })
            .await
            .map_err(|e| {
                TransferError::Transport(format!(
                    "failed to request decryption data from verifier: {e}"
                ))
            })?;

        let download_dir = self.data_verification.download_directory();
        let mut decrypted_paths = Vec::new();
        for segment in &encryption_data.key_iv_randomized_file_segments {
            let Some(found_idx) = key_ivs.iter().position(|r| r.file_hash == segment.file_hash)
            else {
                return Err(TransferError::Validation(format!(
                    "decryption data doesn't contain the requested file hash: {}",
                    hexutil::encode_no_prefix(&segment.file_hash)
                )));
            };

            let info = self
                .contract_store
                .file_info(contract_hash_hex, &segment.file_hash)?;
            if info.decryption_status == FileDecryptionStatus::Decrypting {
                continue;
            }
            self.contract_store.set_decryption_status(
                contract_hash_hex,
                &segment.file_hash,
                FileDecryptionStatus::Decrypting,
            );

            let input_path = download_dir
                .join(contract_hash_hex)
                .join(hexutil::encode_no_prefix(&segment.file_hash));
            let output_path = &restored_file_paths[found_idx];
            match self
                .data_verification
                .decrypt_file(
                    &input_path,
                    Path::new(output_path),
                    &segment.key,
                    &segment.iv,
                    segment.encryption_type,
                    &segment.randomized_segments,
                    info.decryption_status == FileDecryptionStatus::Decrypted,
                )
                .await
            {
                Ok(path) => {
                    self.contract_store.set_decryption_status(
                        contract_hash_hex,
                        &segment.file_hash,
                        FileDecryptionStatus::Decrypted,
                    );
                    decrypted_paths.push(path.display().to_string());
                }
                Err(error) => {
                    self.contract_store.set_decryption_status(
                        contract_hash_hex,
                        &segment.file_hash,
                        FileDecryptionStatus::Error,
                    );
                    return Err(TransferError::DecryptionFailed(format!(
                        "failed to decrypt file {}: {error}",
                        hexutil::encode_no_prefix(&segment.file_hash)
                    )));
                }
            }
        }

        Ok(decrypted_paths)
    }

    fn ensure_fully_transferred(&self, contract_hash_hex: &str, file_hash: &[u8]) -> Result<()> {
        let info = self.contract_store.file_info(contract_hash_hex, file_hash)?;
        if let Some(error) = info.error {
            return Err(TransferError::Validation(format!(
                "contract file info failure: {error}"
            )));
        }
        if info.file_size != info.bytes_transferred {
            return Err(TransferError::SizeMismatch {
                expected: info.file_size,
                actual: info.bytes_transferred,
            });
        }
        Ok(())
    }
}
