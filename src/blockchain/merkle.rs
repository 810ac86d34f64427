//! Merkle commitment over a block's transaction set.

use super::hash::hash_hex;
use super::transaction::Transaction;

/// Leaf hash of a single transaction
pub fn leaf_hash(transaction: &Transaction) -> String {
    hash_hex(transaction.canonical_string().as_bytes())
}

/// Computes the Merkle root of an ordered list of transactions
///
/// Returns `None` for an empty list. Each level hashes the concatenated hex
/// strings of adjacent pairs; an odd level repeats its last entry.
pub fn merkle_root(transactions: &[Transaction]) -> Option<String> {
    let mut level: Vec<String> = transactions.iter().map(leaf_hash).collect();

    if level.is_empty() {
        return None;
    }

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            if let Some(last) = level.last().cloned() {
                level.push(last);
            }
        }

        level = level
            .chunks(2)
            .map(|pair| hash_hex(format!("{}{}", pair[0], pair[1]).as_bytes()))
            .collect();
    }

    level.pop()
}
