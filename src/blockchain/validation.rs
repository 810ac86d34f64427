//! Chain integrity checks.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use std::fmt;

use super::block::Block;
use super::hash::{meets_difficulty, ZERO_HASH};
use super::merkle::merkle_root;
use super::pow::GENESIS_DIFFICULTY;

/// Why a block failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Violation {
    /// The chain has no blocks at all
    MissingGenesis,
    /// The block's index does not match its position
    IndexMismatch,
    /// The stored hash differs from the hash of the block's fields
    HashMismatch,
    /// The stored hash lacks the required leading zeros
    InsufficientWork,
    /// The previous hash does not point at the predecessor
    BrokenLink,
    /// The stored Merkle root differs from the transactions' root
    MerkleMismatch,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Violation::MissingGenesis => "missing genesis block",
            Violation::IndexMismatch => "index does not match position",
            Violation::HashMismatch => "hash does not match block contents",
            Violation::InsufficientWork => "insufficient proof of work",
            Violation::BrokenLink => "previous hash does not match predecessor",
            Violation::MerkleMismatch => "merkle root does not match transactions",
        };
        write!(f, "{}", reason)
    }
}

/// First integrity failure found in a chain
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Integrity violation at block {index}: {reason}")]
pub struct IntegrityViolation {
    pub index: u64,
    pub reason: Violation,
}

impl IntegrityViolation {
    fn at(index: u64, reason: Violation) -> Self {
        IntegrityViolation { index, reason }
    }
}

/// Validates a whole chain, stopping at the first violation
///
/// # Arguments
///
/// * `chain` - Blocks in chain order, genesis first
/// * `difficulty` - Leading zeros required of every non-genesis block
pub fn validate_chain(chain: &[Block], difficulty: usize) -> Result<(), IntegrityViolation> {
    let genesis = chain
        .first()
        .ok_or(IntegrityViolation::at(0, Violation::MissingGenesis))?;

    validate_genesis(genesis)?;

    for (position, pair) in chain.windows(2).enumerate() {
        validate_successor(&pair[0], &pair[1], position as u64 + 1, difficulty)?;
    }

    Ok(())
}

fn validate_genesis(block: &Block) -> Result<(), IntegrityViolation> {
    if !block.is_genesis() {
        return Err(IntegrityViolation::at(0, Violation::IndexMismatch));
    }

    if block.previous_hash != ZERO_HASH {
        return Err(IntegrityViolation::at(0, Violation::BrokenLink));
    }

    validate_contents(block, GENESIS_DIFFICULTY)
}

fn validate_successor(
    previous: &Block,
    block: &Block,
    position: u64,
    difficulty: usize,
) -> Result<(), IntegrityViolation> {
    if block.index != position {
        return Err(IntegrityViolation::at(position, Violation::IndexMismatch));
    }

    if block.hash != block.calculate_hash() {
        return Err(IntegrityViolation::at(position, Violation::HashMismatch));
    }

    if !meets_difficulty(&block.hash, difficulty) {
        return Err(IntegrityViolation::at(position, Violation::InsufficientWork));
    }

    if block.previous_hash != previous.hash {
        return Err(IntegrityViolation::at(position, Violation::BrokenLink));
    }

    if block.merkle_root != merkle_root(&block.transactions) {
        return Err(IntegrityViolation::at(position, Violation::MerkleMismatch));
    }

    Ok(())
}

fn validate_contents(block: &Block, difficulty: usize) -> Result<(), IntegrityViolation> {
    if block.hash != block.calculate_hash() {
        return Err(IntegrityViolation::at(block.index, Violation::HashMismatch));
    }

    if !meets_difficulty(&block.hash, difficulty) {
        return Err(IntegrityViolation::at(block.index, Violation::InsufficientWork));
    }

    if block.merkle_root != merkle_root(&block.transactions) {
        return Err(IntegrityViolation::at(block.index, Violation::MerkleMismatch));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::pow::seal;
    use crate::blockchain::transaction::Transaction;

    const DIFFICULTY: usize = 2;

    fn build_chain(blocks: usize) -> Vec<Block> {
        let mut chain = vec![seal(
            Block::new(0, Vec::new(), ZERO_HASH.to_string(), None),
            GENESIS_DIFFICULTY,
        )];

        for i in 1..=blocks as u64 {
            let transactions = vec![
                Transaction::new("alice", "bob", i as f64),
                Transaction::new("bob", "carol", 1.0),
                Transaction::new("carol", "alice", 0.5),
            ];
            let previous = chain[chain.len() - 1].hash.clone();
            chain.push(seal(Block::new(i, transactions, previous, None), DIFFICULTY));
        }

        chain
    }

    fn violation(chain: &[Block]) -> IntegrityViolation {
        validate_chain(chain, DIFFICULTY).unwrap_err()
    }

    #[test]
    fn test_valid_chain() {
        assert!(validate_chain(&build_chain(3), DIFFICULTY).is_ok());
        assert!(validate_chain(&build_chain(0), DIFFICULTY).is_ok());
    }

    #[test]
    fn test_empty_chain() {
        assert_eq!(violation(&[]), IntegrityViolation::at(0, Violation::MissingGenesis));
    }

    #[test]
    fn test_tampered_hash() {
        let mut chain = build_chain(3);
        chain[2].hash = format!("00{}", "f".repeat(62));

        assert_eq!(violation(&chain), IntegrityViolation::at(2, Violation::HashMismatch));
    }

    #[test]
    fn test_tampered_previous_hash() {
        let mut chain = build_chain(3);
        chain[2].previous_hash = chain[0].hash.clone();

        // previous hash is part of the block hash
        assert_eq!(violation(&chain), IntegrityViolation::at(2, Violation::HashMismatch));
    }

    #[test]
    fn test_tampered_merkle_root() {
        let mut chain = build_chain(3);
        chain[1].merkle_root = None;

        assert_eq!(violation(&chain), IntegrityViolation::at(1, Violation::HashMismatch));
    }

    #[test]
    fn test_aux_data_set_to_empty() {
        let mut chain = build_chain(3);
        chain[2].aux_data = Some(String::new());

        assert_eq!(violation(&chain), IntegrityViolation::at(2, Violation::HashMismatch));
    }

    #[test]
    fn test_nonce_digits_shifted_into_aux_data() {
        let mut chain = build_chain(3);
        let nonce = chain[1].nonce.to_string();
        // move the last nonce digit into aux data: "1234" + None becomes "123" + "4"
        let (head, tail) = nonce.split_at(nonce.len() - 1);
        chain[1].nonce = if head.is_empty() { 0 } else { head.parse().unwrap() };
        chain[1].aux_data = Some(tail.to_string());

        assert_eq!(violation(&chain), IntegrityViolation::at(1, Violation::HashMismatch));
    }

    #[test]
    fn test_tampered_transaction_fields() {
        let mut chain = build_chain(3);
        chain[3].transactions[1].amount = 1000.0;
        assert_eq!(violation(&chain), IntegrityViolation::at(3, Violation::MerkleMismatch));

        let mut chain = build_chain(3);
        chain[2].transactions[0].sender = "mallory".into();
        assert_eq!(violation(&chain), IntegrityViolation::at(2, Violation::MerkleMismatch));

        let mut chain = build_chain(3);
        chain[1].transactions[2].recipient = "mallory".into();
        assert_eq!(violation(&chain), IntegrityViolation::at(1, Violation::MerkleMismatch));
    }

    #[test]
    fn test_resealed_block_breaks_link() {
        let mut chain = build_chain(3);
        let mut forged = chain[2].clone();
        forged.previous_hash = chain[0].hash.clone();
        chain[2] = seal(forged, DIFFICULTY);

        assert_eq!(violation(&chain), IntegrityViolation::at(2, Violation::BrokenLink));
    }

    #[test]
    fn test_resealed_successor_breaks_next_link() {
        let mut chain = build_chain(3);
        let mut forged = chain[1].clone();
        forged.transactions[0].amount = 99.0;
        forged.merkle_root = merkle_root(&forged.transactions);
        chain[1] = seal(forged, DIFFICULTY);

        assert_eq!(violation(&chain), IntegrityViolation::at(2, Violation::BrokenLink));
    }

    #[test]
    fn test_insufficient_work() {
        let chain = build_chain(2);
        // sealed at difficulty 2, checked against a much higher one
        let err = validate_chain(&chain, 12).unwrap_err();
        assert_eq!(err, IntegrityViolation::at(1, Violation::InsufficientWork));
    }

    #[test]
    fn test_index_gap() {
        let mut chain = build_chain(3);
        chain.remove(2);

        assert_eq!(violation(&chain), IntegrityViolation::at(2, Violation::IndexMismatch));
    }

    #[test]
    fn test_bad_genesis() {
        let mut chain = build_chain(1);
        chain[0].previous_hash = "1".repeat(64);

        assert_eq!(violation(&chain), IntegrityViolation::at(0, Violation::BrokenLink));
    }

    #[test]
    fn test_genesis_with_wrong_index() {
        let mut chain = build_chain(1);
        chain[0].index = 1;

        assert_eq!(violation(&chain), IntegrityViolation::at(0, Violation::IndexMismatch));
    }

    #[test]
    fn test_violation_message() {
        let err = IntegrityViolation::at(4, Violation::BrokenLink);
        assert_eq!(
            err.to_string(),
            "Integrity violation at block 4: previous hash does not match predecessor"
        );
    }
}
