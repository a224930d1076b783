use axum::{body::Bytes, http::StatusCode, Json};
use serde::Serialize;

use crate::transfer::TransferError;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct ApiErrorEnvelope {
    pub(crate) code: u16,
    pub(crate) message: String,
}

pub(crate) type ApiErrorResponse = (StatusCode, Json<ApiErrorEnvelope>);

pub(crate) fn error_with_message(status: StatusCode, message: String) -> ApiErrorResponse {
    (
        status,
        Json(ApiErrorEnvelope {
            code: status.as_u16(),
            message,
        }),
    )
}

pub(crate) fn parse_json_with_limit<T: serde::de::DeserializeOwned>(
    bytes: Bytes,
    max_bytes: usize,
) -> Result<T, ApiErrorResponse> {
    if bytes.len() > max_bytes {
        return Err(error_with_message(
            StatusCode::PAYLOAD_TOO_LARGE,
            "request body too large".to_string(),
        ));
    }
    serde_json::from_slice::<T>(&bytes).map_err(|e| {
        error_with_message(
            StatusCode::BAD_REQUEST,
            format!("invalid request body: {e}"),
        )
    })
}

/// Maps orchestrator errors onto HTTP statuses, keeping the concrete error
/// message in the envelope.
pub(crate) fn map_transfer_error(error: TransferError) -> ApiErrorResponse {
    let status = match &error {
        TransferError::Decode(_) | TransferError::Validation(_) => StatusCode::BAD_REQUEST,
        TransferError::Unauthorized => StatusCode::UNAUTHORIZED,
        TransferError::NotFound(_) => StatusCode::NOT_FOUND,
        TransferError::IncompleteResponses(_)
        | TransferError::IncompleteCoverage
        | TransferError::IncompleteContracts
        | TransferError::UnknownFileSize
        | TransferError::SizeMismatch { .. }
        | TransferError::DecryptionFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        TransferError::Transport(_) => StatusCode::BAD_GATEWAY,
        TransferError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_with_message(status, error.to_string())
}
