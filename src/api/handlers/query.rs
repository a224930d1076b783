use axum::{body::Bytes, extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::{map_transfer_error, parse_json_with_limit, ApiErrorResponse};
use crate::api::ApiState;
use crate::hexutil;
use crate::messages::DataQueryResponse;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SendDataQueryRequestBody {
    /// Comma-separated list of unprefixed hex file hashes.
    pub(crate) file_hashes: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SendDataQueryRequestResponse {
    pub(crate) hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DataQueryRequestHashBody {
    pub(crate) data_query_request_hash: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct DataQueryResponsesResponse {
    pub(crate) responses: Vec<DataQueryResponseJson>,
}

/// Hex projection of a hoster response: file hashes are bare hex, all other
/// byte fields carry the `0x` prefix.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct DataQueryResponseJson {
    pub(crate) from_peer_addr: String,
    pub(crate) fees_per_byte: String,
    pub(crate) hash_data_query_request: String,
    pub(crate) public_key: String,
    pub(crate) signature: String,
    pub(crate) file_hashes: Vec<String>,
    pub(crate) file_hashes_sizes: Vec<u64>,
    pub(crate) unavailable_file_hashes: Vec<String>,
    pub(crate) timestamp: u64,
}

impl DataQueryResponseJson {
    pub(crate) fn from_response(response: &DataQueryResponse) -> Self {
        Self {
            from_peer_addr: response.from_peer.clone(),
            fees_per_byte: response.fees_per_byte.clone(),
            hash_data_query_request: hexutil::encode(&response.request_hash),
            public_key: hexutil::encode(&response.public_key),
            signature: hexutil::encode(&response.signature),
            file_hashes: response
                .file_hashes
                .iter()
                .map(|h| hexutil::encode_no_prefix(h))
                .collect(),
            file_hashes_sizes: response.file_hashes_sizes.clone(),
            unavailable_file_hashes: response
                .unavailable_file_hashes
                .iter()
                .map(|h| hexutil::encode_no_prefix(h))
                .collect(),
            timestamp: response.timestamp,
        }
    }
}

pub(crate) async fn send_data_query_request(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<SendDataQueryRequestResponse>, ApiErrorResponse> {
    let req: SendDataQueryRequestBody = parse_json_with_limit(body, 64 * 1024)?;
    let hash = state
        .service
        .send_data_query_request(&req.file_hashes)
        .await
        .map_err(map_transfer_error)?;
    Ok(Json(SendDataQueryRequestResponse { hash }))
}

pub(crate) async fn check_data_query_response(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<DataQueryResponsesResponse>, ApiErrorResponse> {
    let req: DataQueryRequestHashBody = parse_json_with_limit(body, 8 * 1024)?;
    let responses = state
        .service
        .check_data_query_response(&req.data_query_request_hash)
        .await
        .map_err(map_transfer_error)?;
    Ok(Json(DataQueryResponsesResponse {
        responses: responses
            .iter()
            .map(DataQueryResponseJson::from_response)
            .collect(),
    }))
}

pub(crate) async fn request_data_query_response_from_verifiers(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<DataQueryResponsesResponse>, ApiErrorResponse> {
    let req: DataQueryRequestHashBody = parse_json_with_limit(body, 8 * 1024)?;
    let responses = state
        .service
        .request_data_query_response_from_verifiers(&req.data_query_request_hash)
        .await
        .map_err(map_transfer_error)?;
    Ok(Json(DataQueryResponsesResponse {
        responses: responses
            .iter()
            .map(DataQueryResponseJson::from_response)
            .collect(),
    }))
}
