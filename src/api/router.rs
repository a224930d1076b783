use axum::{
    routing::{get, post},
    Router,
};

use crate::api::{
    handlers::{
        check_data_query_response, create_contracts_from_data_query_responses,
        create_transactions_with_data_payload_from_contract_hashes, download_file,
        download_file_progress, get_download_contract, health, pause_file_download,
        request_data_query_response_from_verifiers,
        request_encryption_data_from_verifier_and_decrypt,
        send_contract_to_file_hoster_and_verifier, send_data_query_request,
        send_file_merkle_tree_nodes_to_verifier,
    },
    ApiState,
};

pub(crate) fn build_app(state: ApiState) -> Router<()> {
    let v1 = Router::new()
        .route("/health", get(health))
        .route(
            "/transfer/send_data_query_request",
            post(send_data_query_request),
        )
        .route(
            "/transfer/check_data_query_response",
            post(check_data_query_response),
        )
        .route(
            "/transfer/request_data_query_response_from_verifiers",
            post(request_data_query_response_from_verifiers),
        )
        .route(
            "/transfer/create_contracts_from_data_query_responses",
            post(create_contracts_from_data_query_responses),
        )
        .route(
            "/transfer/get_download_contract",
            post(get_download_contract),
        )
        .route(
            "/transfer/send_contract_to_file_hoster_and_verifier",
            post(send_contract_to_file_hoster_and_verifier),
        )
        .route("/transfer/download_file", post(download_file))
        .route("/transfer/pause_file_download", post(pause_file_download))
        .route(
            "/transfer/download_file_progress",
            post(download_file_progress),
        )
        .route(
            "/transfer/send_file_merkle_tree_nodes_to_verifier",
            post(send_file_merkle_tree_nodes_to_verifier),
        )
        .route(
            "/transfer/request_encryption_data_from_verifier_and_decrypt",
            post(request_encryption_data_from_verifier_and_decrypt),
        )
        .route(
            "/transfer/create_transactions_with_data_payload_from_contract_hashes",
            post(create_transactions_with_data_payload_from_contract_hashes),
        );

    Router::new().nest("/api/v1", v1).with_state(state)
}
