use axum::{body::Bytes, extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::{map_transfer_error, parse_json_with_limit, ApiErrorResponse};
use crate::api::handlers::query::DataQueryResponseJson;
use crate::api::ApiState;
use crate::hexutil;
use crate::messages::DownloadContract;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CreateContractsBody {
    pub(crate) data_query_request_hash: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreateContractsResponse {
    pub(crate) contract_hashes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ContractHashBody {
    pub(crate) contract_hash: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct DownloadContractJson {
    pub(crate) file_hoster_response: DataQueryResponseJson,
    pub(crate) file_requester_node_public_key: String,
    pub(crate) file_hashes_needed: Vec<String>,
    pub(crate) file_hashes_needed_sizes: Vec<u64>,
    pub(crate) verifier_public_key: String,
    pub(crate) verifier_fees: String,
    pub(crate) contract_hash: String,
    pub(crate) verifier_signature: String,
}

impl DownloadContractJson {
    fn from_contract(contract: &DownloadContract) -> Self {
        Self {
            file_hoster_response: DataQueryResponseJson::from_response(
                &contract.file_hoster_response,
            ),
            file_requester_node_public_key: hexutil::encode(&contract.file_requester_public_key),
            file_hashes_needed: contract
                .file_hashes_needed
                .iter()
                .map(|h| hexutil::encode_no_prefix(h))
                .collect(),
            file_hashes_needed_sizes: contract.file_hashes_needed_sizes.clone(),
            verifier_public_key: hexutil::encode(&contract.verifier_public_key),
            verifier_fees: contract.verifier_fees.clone(),
            contract_hash: hexutil::encode(&contract.contract_hash),
            verifier_signature: hexutil::encode(&contract.verifier_signature),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct GetDownloadContractResponse {
    pub(crate) contract: DownloadContractJson,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SuccessResponse {
    pub(crate) success: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CreateTransactionsBody {
    pub(crate) access_token: String,
    pub(crate) contract_hashes: Vec<String>,
    pub(crate) current_nounce: String,
    pub(crate) transaction_fees_to_be_used: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreateTransactionsResponse {
    pub(crate) transaction_data_bytes_hex: Vec<String>,
    pub(crate) total_fees_for_transaction: String,
}

pub(crate) async fn create_contracts_from_data_query_responses(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<CreateContractsResponse>, ApiErrorResponse> {
    let req: CreateContractsBody = parse_json_with_limit(body, 8 * 1024)?;
    let contract_hashes = state
        .service
        .create_contracts_from_data_query_responses(&req.data_query_request_hash)
        .await
        .map_err(map_transfer_error)?;
    Ok(Json(CreateContractsResponse { contract_hashes }))
}

pub(crate) async fn get_download_contract(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<GetDownloadContractResponse>, ApiErrorResponse> {
    let req: ContractHashBody = parse_json_with_limit(body, 8 * 1024)?;
    let contract = state
        .service
        .get_download_contract(&req.contract_hash)
        .map_err(map_transfer_error)?;
    Ok(Json(GetDownloadContractResponse {
        contract: DownloadContractJson::from_contract(&contract),
    }))
}

pub(crate) async fn send_contract_to_file_hoster_and_verifier(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<SuccessResponse>, ApiErrorResponse> {
    let req: ContractHashBody = parse_json_with_limit(body, 8 * 1024)?;
    state
        .service
        .send_contract_to_file_hoster_and_verifier(&req.contract_hash)
        .await
        .map_err(map_transfer_error)?;
    Ok(Json(SuccessResponse { success: true }))
}

pub(crate) async fn create_transactions_with_data_payload_from_contract_hashes(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<CreateTransactionsResponse>, ApiErrorResponse> {
    let req: CreateTransactionsBody = parse_json_with_limit(body, 64 * 1024)?;
    let (transaction_data_bytes_hex, total_fees_for_transaction) = state
        .service
        .create_transactions_with_data_payload_from_contract_hashes(
            &req.access_token,
            &req.contract_hashes,
            &req.current_nounce,
            &req.transaction_fees_to_be_used,
        )
        .map_err(map_transfer_error)?;
    Ok(Json(CreateTransactionsResponse {
        transaction_data_bytes_hex,
        total_fees_for_transaction,
    }))
}
