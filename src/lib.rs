//! Core data-transfer orchestrator of a decentralized, content-addressed
//! file-exchange network.
//!
//! The crate coordinates the four-party download protocol between a file
//! requester, file hosters, a verifier and the gossip substrate: query
//! broadcast and response collection, file-coverage solving, verifier-signed
//! download contracts, parallel resumable byte-range downloads, and the
//! post-download Merkle/key-exchange decryption handshake. Transport, peer
//! discovery, the keystore and the encryption primitives are consumed
//! through the traits in [`protocols`]; the embedding node wires them up and
//! serves the [`api`].

pub mod api;
pub mod config;
pub mod contract;
pub mod crypto;
pub mod hexutil;
pub mod logging;
pub mod messages;
pub mod protocols;
pub mod transaction;
pub mod transfer;
