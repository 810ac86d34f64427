// Blockchain module
//
// This module contains the ledger engine including:
// - Hashing and Merkle commitments
// - Block structure and proof of work sealing
// - Chain validation
// - Account replay
// - Block storage

pub mod account;
pub mod block;
pub mod chain;
pub mod hash;
pub mod merkle;
pub mod policy;
pub mod pow;
pub mod storage;
pub mod transaction;
pub mod validation;

// Re-export main components for easier access
pub use account::Account;
pub use block::Block;
pub use chain::{Blockchain, BlockchainError, ChainConfig, SubmitOutcome};
pub use policy::TransactionPolicy;
pub use transaction::{Address, Transaction, TransactionError};
pub use validation::{IntegrityViolation, Violation};
