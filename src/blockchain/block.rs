use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::hash::hash_hex;
use super::merkle::merkle_root;
use super::transaction::Transaction;

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Index of the block in the chain
    pub index: u64,

    /// Timestamp when the block was created
    #[schema(value_type = String, example = "2023-01-01T12:00:00.000000000Z")]
    pub timestamp: DateTime<Utc>,

    /// List of transactions included in this block
    pub transactions: Vec<Transaction>,

    /// Hash of the previous block
    pub previous_hash: String,

    /// Merkle root of the transactions, absent when there are none
    pub merkle_root: Option<String>,

    /// Proof of work (nonce)
    pub nonce: u64,

    /// Optional opaque payload covered by the block hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux_data: Option<String>,

    /// Hash of the current block (calculated)
    pub hash: String,
}

impl Block {
    /// Creates an unsealed block candidate
    ///
    /// The timestamp and Merkle root are fixed here; nonce and hash are
    /// filled in by the proof-of-work sealer.
    pub fn new(
        index: u64,
        transactions: Vec<Transaction>,
        previous_hash: String,
        aux_data: Option<String>,
    ) -> Self {
        let merkle_root = merkle_root(&transactions);

        Block {
            index,
            timestamp: Utc::now(),
            transactions,
            previous_hash,
            merkle_root,
            nonce: 0,
            aux_data,
            hash: String::new(),
        }
    }

    /// Timestamp as it enters the block hash (RFC 3339, nanoseconds, `Z`)
    pub fn timestamp_string(&self) -> String {
        format_timestamp(&self.timestamp)
    }

    /// Calculates the hash of the block from its own fields
    ///
    /// Covers index, timestamp, previous hash, Merkle root, nonce and aux
    /// data. Transactions are covered through the Merkle root.
    pub fn calculate_hash(&self) -> String {
        hash_hex(self.hash_preimage().as_bytes())
    }

    /// Header fields joined by `|`
    ///
    /// String fields carry a `len:` prefix and absent ones render as `-`,
    /// so no two distinct headers share a preimage.
    fn hash_preimage(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.index,
            self.timestamp_string(),
            length_prefixed(Some(self.previous_hash.as_str())),
            length_prefixed(self.merkle_root.as_deref()),
            self.nonce,
            length_prefixed(self.aux_data.as_deref()),
        )
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }
}

fn length_prefixed(field: Option<&str>) -> String {
    match field {
        Some(value) => format!("{}:{}", value.len(), value),
        None => "-".to_string(),
    }
}

pub(crate) fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}
