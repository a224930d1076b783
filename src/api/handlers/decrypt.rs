use axum::{body::Bytes, extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::{map_transfer_error, parse_json_with_limit, ApiErrorResponse};
use crate::api::handlers::contracts::SuccessResponse;
use crate::api::ApiState;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SendMerkleTreeNodesBody {
    pub(crate) contract_hash: String,
    pub(crate) file_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RequestEncryptionDataBody {
    pub(crate) contract_hash: String,
    pub(crate) file_hashes: Vec<String>,
    pub(crate) file_merkle_root_hashes: Vec<String>,
    pub(crate) restored_file_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RequestEncryptionDataResponse {
    pub(crate) decrypted_file_paths: Vec<String>,
}

pub(crate) async fn send_file_merkle_tree_nodes_to_verifier(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<SuccessResponse>, ApiErrorResponse> {
    let req: SendMerkleTreeNodesBody = parse_json_with_limit(body, 8 * 1024)?;
    state
        .service
        .send_file_merkle_tree_nodes_to_verifier(&req.contract_hash, &req.file_hash)
        .await
        .map_err(map_transfer_error)?;
    Ok(Json(SuccessResponse { success: true }))
}

pub(crate) async fn request_encryption_data_from_verifier_and_decrypt(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<RequestEncryptionDataResponse>, ApiErrorResponse> {
    let req: RequestEncryptionDataBody = parse_json_with_limit(body, 256 * 1024)?;
    let decrypted_file_paths = state
        .service
        .request_encryption_data_from_verifier_and_decrypt(
            &req.contract_hash,
            &req.file_hashes,
            &req.file_merkle_root_hashes,
            &req.restored_file_paths,
        )
        .await
        .map_err(map_transfer_error)?;
    Ok(Json(RequestEncryptionDataResponse {
        decrypted_file_paths,
    }))
}
