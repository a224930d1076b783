mod contracts;
mod core;
mod decrypt;
mod downloads;
mod query;

pub(crate) use contracts::{
    create_contracts_from_data_query_responses,
    create_transactions_with_data_payload_from_contract_hashes, get_download_contract,
    send_contract_to_file_hoster_and_verifier,
};
pub(crate) use self::core::health;
pub(crate) use decrypt::{
    request_encryption_data_from_verifier_and_decrypt, send_file_merkle_tree_nodes_to_verifier,
};
pub(crate) use downloads::{download_file, download_file_progress, pause_file_download};
pub(crate) use query::{
    check_data_query_response, request_data_query_response_from_verifiers, send_data_query_request,
};
