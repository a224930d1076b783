//! Contract lifecycle: building unsigned contracts from solved coverage,
//! collecting verifier countersignatures, distributing signed contracts and
//! assembling settlement transactions.

use rand::seq::SliceRandom;
use std::sync::{Arc, Mutex};

use crate::crypto::{self, PeerId};
use crate::hexutil;
use crate::messages::{
    DownloadContract, DownloadContractInTransactionData, DownloadContractsHashes,
};
use crate::transaction::{DataPayload, DataPayloadType, Transaction, MAIN_CHAIN_ID};
use crate::transfer::errors::{Result, TransferError};
use crate::transfer::{coverage, DataTransferService};

impl DataTransferService {
    /// Solves file coverage over the collected responses, has every live
    /// verifier countersign one contract per selected hoster, and stores the
    /// accepted contracts. Returns their `0x`-hex hashes.
    pub async fn create_contracts_from_data_query_responses(
        &self,
        request_hash_hex: &str,
    ) -> Result<Vec<String>> {
        let request = self
            .data_query
            .get_query_history(request_hash_hex)
            .await
            .ok_or_else(|| {
                TransferError::NotFound(format!("data query request {request_hash_hex}"))
            })?;
        let responses = self
            .data_query
            .get_query_response(request_hash_hex)
            .await
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                TransferError::NotFound(format!("data query responses {request_hash_hex}"))
            })?;

        let selection = coverage::solve(&request, &responses)?;

        let mut unsigned_contracts = Vec::with_capacity(selection.len());
        for entry in selection {
            unsigned_contracts.push(DownloadContract {
                file_hoster_response: entry.response,
                file_requester_public_key: self.identity.public_key.clone(),
                file_hashes_needed: entry.file_hashes_needed,
                file_hashes_needed_sizes: entry.file_hashes_needed_sizes,
                verifier_public_key: Vec::new(),
                verifier_fees: String::new(),
                contract_hash: Vec::new(),
                verifier_signature: Vec::new(),
            });
        }

        let verifier_peers = self.verifier_peer_ids();
        let addr_infos = self.peer_finder.find_peers(&verifier_peers).await;
        if addr_infos.is_empty() {
            return Err(TransferError::IncompleteContracts);
        }

        // One branch per live verifier; each submits every unsigned contract
        // in turn. A failing verifier abandons its remaining submissions
        // without affecting the other branches.
        let signed_contracts = Arc::new(Mutex::new(Vec::<DownloadContract>::new()));
        let mut branches = Vec::with_capacity(addr_infos.len());
        for info in addr_infos {
            let data_verification = self.data_verification.clone();
            let unsigned = unsigned_contracts.clone();
            let collected = signed_contracts.clone();
            branches.push(tokio::spawn(async move {
                for contract in unsigned {
                    let signed = match data_verification
                        .send_contract_to_verifier_for_acceptance(info.id.clone(), contract)
                        .await
                    {
                        Ok(signed) => signed,
                        Err(error) => {
                            tracing::debug!(peer = %info.id, %error, "verifier rejected contract submission");
                            return;
                        }
                    };
                    match signed.verify_verifier_signature() {
                        Ok(true) => {}
                        _ => return,
                    }
                    if signed.validate().is_err() {
                        return;
                    }
                    let mut guard = collected.lock().expect("signed contract collection");
                    guard.push(signed);
                }
            }));
        }
        for branch in branches {
            let _ = branch.await;
        }

        let mut signed = match Arc::try_unwrap(signed_contracts) {
            Ok(mutex) => mutex.into_inner().expect("signed contract collection"),
            Err(shared) => shared.lock().expect("signed contract collection").clone(),
        };

        // Spread trust across verifiers before picking counterparts.
        signed.shuffle(&mut rand::thread_rng());

        let mut selected = Vec::with_capacity(unsigned_contracts.len());
        for unsigned in &unsigned_contracts {
            let wanted = unsigned.needed_hashes_concat();
            let Some(counterpart) = signed
                .iter()
                .find(|candidate| candidate.needed_hashes_concat() == wanted)
            else {
                return Err(TransferError::IncompleteContracts);
            };
            selected.push(counterpart.clone());
        }

        let mut contract_hashes = Vec::with_capacity(selected.len());
        for contract in selected {
            contract_hashes.push(hexutil::encode(&contract.contract_hash));
            self.contract_store.create_contract(contract);
        }
        Ok(contract_hashes)
    }

    pub fn get_download_contract(&self, contract_hash_hex: &str) -> Result<DownloadContract> {
        if contract_hash_hex.is_empty() {
            return Err(TransferError::Validation(
                "contract hash is empty".to_string(),
            ));
        }
        Ok(self.contract_store.get_contract(contract_hash_hex)?)
    }

    /// Forwards a countersigned contract to its verifier and its hoster.
    /// Failure on either leg fails the call.
    pub async fn send_contract_to_file_hoster_and_verifier(
        &self,
        contract_hash_hex: &str,
    ) -> Result<()> {
        let contract = self.contract_store.get_contract(contract_hash_hex)?;

        let verifier_id = PeerId::from_public_key(&contract.verifier_public_key);
        let hoster_id = PeerId::from_public_key(&contract.file_hoster_response.public_key);

        self.data_verification
            .transfer_contract(verifier_id, contract.clone())
            .await
            .map_err(|e| {
                TransferError::Transport(format!("failed to send contract to verifier: {e}"))
            })?;
        self.data_verification
            .transfer_contract(hoster_id, contract)
            .await
            .map_err(|e| {
                TransferError::Transport(format!("failed to send contract to file hoster: {e}"))
            })?;
        Ok(())
    }

    /// Builds one signed settlement transaction per contract, paying the
    /// verifier `fees_per_byte × total size + verifier fees`. Returns the
    /// JSON transactions in caller order and the grand total value.
    pub fn create_transactions_with_data_payload_from_contract_hashes(
        &self,
        access_token: &str,
        contract_hashes: &[String],
        current_nounce: &str,
        transaction_fees: &str,
    ) -> Result<(Vec<String>, String)> {
        let key = self
            .keystore
            .authorized(access_token)
            .ok()
            .flatten()
            .ok_or(TransferError::Unauthorized)?;

        let mut nounce = hexutil::decode_u64(current_nounce)
            .map_err(|e| TransferError::Decode(format!("failed to decode current nounce: {e}")))?;
        let fees = hexutil::decode_u128(transaction_fees).map_err(|e| {
            TransferError::Decode(format!("failed to decode transaction fees: {e}"))
        })?;
        let chain = hexutil::decode(MAIN_CHAIN_ID)
            .map_err(|e| TransferError::Decode(format!("failed to decode chain id: {e}")))?;

        let mut transactions = Vec::with_capacity(contract_hashes.len());
        let mut grand_total: u128 = 0;
        for contract_hash_hex in contract_hashes {
            nounce += 1;
            let contract = self.contract_store.get_contract(contract_hash_hex)?;

            let envelope = DownloadContractsHashes {
                contracts: vec![DownloadContractInTransactionData {
                    contract_hash: contract.contract_hash.clone(),
                    file_requester_public_key: contract.file_requester_public_key.clone(),
                    file_hoster_public_key: contract.file_hoster_response.public_key.clone(),
                    verifier_public_key: contract.verifier_public_key.clone(),
                    verifier_fees: contract.verifier_fees.clone(),
                    file_hoster_fees_per_byte: contract.file_hoster_response.fees_per_byte.clone(),
                }],
            };
            let envelope_bytes = serde_json::to_vec(&envelope).map_err(|e| {
                TransferError::Validation(format!("failed to marshal contract envelope: {e}"))
            })?;
            let payload = DataPayload {
                payload_type: DataPayloadType::DataContract,
                payload: envelope_bytes,
            };
            let payload_bytes = serde_json::to_vec(&payload).map_err(|e| {
                TransferError::Validation(format!("failed to marshal data payload: {e}"))
            })?;

            let mut total_file_size: u64 = 0;
            for &size in &contract.file_hashes_needed_sizes {
                total_file_size = total_file_size.checked_add(size).ok_or_else(|| {
                    TransferError::Validation("contract file sizes overflow u64".to_string())
                })?;
            }
            let hoster_fees = hexutil::decode_u128(&contract.file_hoster_response.fees_per_byte)
                .map_err(|e| {
                    TransferError::Decode(format!("failed to decode file hoster's fees: {e}"))
                })?;
            let verifier_fees = hexutil::decode_u128(&contract.verifier_fees).map_err(|e| {
                TransferError::Decode(format!("failed to decode verifier's fees: {e}"))
            })?;
            let value = hoster_fees
                .checked_mul(u128::from(total_file_size))
                .and_then(|v| v.checked_add(verifier_fees))
                .ok_or_else(|| {
                    TransferError::Validation("settlement value overflows".to_string())
                })?;
            grand_total = grand_total.checked_add(value).ok_or_else(|| {
                TransferError::Validation("total settlement value overflows".to_string())
            })?;

            let mut tx = Transaction {
                hash: Vec::new(),
                signature: Vec::new(),
                public_key: key.public_key.clone(),
                nounce: hexutil::encode_u64_to_bytes(nounce).to_vec(),
                data: payload_bytes,
                from: key.address.clone(),
                to: crypto::raw_public_to_address(&contract.verifier_public_key),
                value: hexutil::encode_u128(value),
                transaction_fees: hexutil::encode_u128(fees),
                chain: chain.clone(),
            };
            tx.sign(&key.signing_key);
            tx.validate()
                .map_err(|e| TransferError::Validation(format!("failed to validate transaction: {e}")))?;

            let json = serde_json::to_string(&tx.to_json()).map_err(|e| {
                TransferError::Validation(format!("failed to marshal JSON transaction: {e}"))
            })?;
            transactions.push(json);
        }

        Ok((transactions, hexutil::encode_u128(grand_total)))
    }
}
