//! Query coordination: broadcasting data queries over gossip and collecting
//! hoster responses, optionally pulling them from the verifiers.

use crate::hexutil;
use crate::messages::{DataQueryRequest, DataQueryResponse, DataQueryResponseTransfer, GossipPayload};
use crate::transfer::errors::{Result, TransferError};
use crate::transfer::{now_secs, DataTransferService};

impl DataTransferService {
    /// Builds a data query from a comma-separated list of unprefixed hex
    /// file hashes, records it in the query history and gossips it to the
    /// network. Returns the `0x`-hex request hash.
    pub async fn send_data_query_request(&self, file_hashes_csv: &str) -> Result<String> {
        if file_hashes_csv.is_empty() {
            return Err(TransferError::Validation(
                "no files in the request".to_string(),
            ));
        }

        let mut file_hashes = Vec::new();
        for token in file_hashes_csv.split(',') {
            let trimmed = token.trim();
            if trimmed.is_empty() {
                continue;
            }
            let file_hash = hexutil::decode_no_prefix(trimmed)
                .map_err(|e| TransferError::Decode(format!("failed to decode file hash: {e}")))?;
            file_hashes.push(file_hash);
        }

        let mut request = DataQueryRequest {
            file_hashes,
            from_peer: self.identity.peer_id.to_string(),
            timestamp: now_secs(),
            hash: Vec::new(),
        };
        request.hash = request.derive_hash();
        request.validate()?;

        let request_hash_hex = hexutil::encode(&request.hash);
        self.data_query
            .put_query_history(request_hash_hex.clone(), request.clone())
            .await
            .map_err(|e| {
                TransferError::Transport(format!("failed to insert data query request: {e}"))
            })?;

        let payload = GossipPayload::Query(request);
        let payload_bytes = serde_json::to_vec(&payload).map_err(|e| {
            TransferError::Validation(format!("failed to marshal data query gossip payload: {e}"))
        })?;
        self.publisher
            .publish_message_to_network(&payload_bytes)
            .await
            .map_err(|e| {
                TransferError::Transport(format!("failed to publish data query to network: {e}"))
            })?;
        tracing::info!(
            request_hash = %crate::logging::redact_hex(&request_hash_hex),
            "data query published to the network"
        );

        Ok(request_hash_hex)
    }

    /// Reads the responses collected so far. An empty list is not an error.
    pub async fn check_data_query_response(
        &self,
        request_hash_hex: &str,
    ) -> Result<Vec<DataQueryResponse>> {
        if request_hash_hex.is_empty() {
            return Err(TransferError::Validation(
                "data query hash is empty".to_string(),
            ));
        }
        Ok(self
            .data_query
            .get_query_response(request_hash_hex)
            .await
            .unwrap_or_default())
    }

    /// Asks every reachable block verifier to forward the responses it holds
    /// for the request, then re-reads the local response store. Unreachable
    /// or failing verifiers are skipped silently.
    pub async fn request_data_query_response_from_verifiers(
        &self,
        request_hash_hex: &str,
    ) -> Result<Vec<DataQueryResponse>> {
        if request_hash_hex.is_empty() {
            return Err(TransferError::Validation(
                "data query hash is empty".to_string(),
            ));
        }
        let request_hash = hexutil::decode(request_hash_hex).map_err(|e| {
            TransferError::Decode(format!("failed to decode data query request hash: {e}"))
        })?;

        let verifier_peers = self.verifier_peer_ids();
        let addr_infos = self.peer_finder.find_peers(&verifier_peers).await;
        let transfer_request = DataQueryResponseTransfer { hash: request_hash };

        let mut branches = Vec::with_capacity(addr_infos.len());
        for info in addr_infos {
            let data_query = self.data_query.clone();
            let request = transfer_request.clone();
            branches.push(tokio::spawn(async move {
                if let Err(error) = data_query
                    .request_data_query_response_transfer(info.id.clone(), request)
                    .await
                {
                    tracing::debug!(peer = %info.id, %error, "data query response transfer failed");
                }
            }));
        }
        for branch in branches {
            let _ = branch.await;
        }

        Ok(self
            .data_query
            .get_query_response(request_hash_hex)
            .await
            .unwrap_or_default())
    }
}
