use axum::{body::Bytes, extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::{map_transfer_error, parse_json_with_limit, ApiErrorResponse};
use crate::api::ApiState;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DownloadFileBody {
    pub(crate) contract_hash: String,
    pub(crate) file_hash: String,
    #[serde(default)]
    pub(crate) re_download: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct DownloadFileResponse {
    pub(crate) status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ContractFileBody {
    pub(crate) contract_hash: String,
    pub(crate) file_hash: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PauseFileDownloadResponse {}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct DownloadFileProgressResponse {
    pub(crate) bytes_transferred: u64,
    pub(crate) error: String,
}

pub(crate) async fn download_file(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<DownloadFileResponse>, ApiErrorResponse> {
    let req: DownloadFileBody = parse_json_with_limit(body, 8 * 1024)?;
    let status = state
        .service
        .download_file(&req.contract_hash, &req.file_hash, req.re_download)
        .await
        .map_err(map_transfer_error)?;
    Ok(Json(DownloadFileResponse {
        status: status.to_string(),
    }))
}

pub(crate) async fn pause_file_download(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<PauseFileDownloadResponse>, ApiErrorResponse> {
    let req: ContractFileBody = parse_json_with_limit(body, 8 * 1024)?;
    state
        .service
        .pause_file_download(&req.contract_hash, &req.file_hash)
        .map_err(map_transfer_error)?;
    Ok(Json(PauseFileDownloadResponse {}))
}

pub(crate) async fn download_file_progress(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<DownloadFileProgressResponse>, ApiErrorResponse> {
    let req: ContractFileBody = parse_json_with_limit(body, 8 * 1024)?;
    let (bytes_transferred, error) = state
        .service
        .download_file_progress(&req.contract_hash, &req.file_hash)
        .map_err(map_transfer_error)?;
    Ok(Json(DownloadFileProgressResponse {
        bytes_transferred,
        error: error.unwrap_or_default(),
    }))
}
