//! A single-writer, append-only ledger of hash-linked, proof-of-work sealed
//! blocks, with sled-backed storage and an actix-web API.

pub mod api;
pub mod blockchain;
pub mod config;
