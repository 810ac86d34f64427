use std::path::Path;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use thiserror::Error;

use super::block::{format_timestamp, Block};
use super::transaction::{Address, Transaction};

/// Version of the on-disk block record
pub const BLOCK_SCHEMA_VERSION: u32 = 1;

const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error for record {key}: {reason}")]
    DeserializationError { key: String, reason: String },

    #[error("Unsupported schema version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Record {key} holds block {index}")]
    KeyMismatch { key: String, index: u64 },
}

/// On-disk form of a transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredTransaction {
    sender: String,
    recipient: String,
    amount: f64,
}

/// On-disk form of a block
///
/// Kept separate from `Block` so the record layout only changes together
/// with `BLOCK_SCHEMA_VERSION`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredBlock {
    schema_version: u32,
    index: u64,
    timestamp: String,
    transactions: Vec<StoredTransaction>,
    previous_hash: String,
    merkle_root: Option<String>,
    nonce: u64,
    aux_data: Option<String>,
    hash: String,
}

impl From<&Block> for StoredBlock {
    fn from(block: &Block) -> Self {
        StoredBlock {
            schema_version: BLOCK_SCHEMA_VERSION,
            index: block.index,
            timestamp: format_timestamp(&block.timestamp),
            transactions: block
                .transactions
                .iter()
                .map(|transaction| StoredTransaction {
                    sender: transaction.sender.0.clone(),
                    recipient: transaction.recipient.0.clone(),
                    amount: transaction.amount,
                })
                .collect(),
            previous_hash: block.previous_hash.clone(),
            merkle_root: block.merkle_root.clone(),
            nonce: block.nonce,
            aux_data: block.aux_data.clone(),
            hash: block.hash.clone(),
        }
    }
}

impl StoredBlock {
    fn into_block(self, key: &str) -> Result<Block, StorageError> {
        if self.schema_version != BLOCK_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion {
                found: self.schema_version,
                expected: BLOCK_SCHEMA_VERSION,
            });
        }

        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| StorageError::DeserializationError {
                key: key.to_string(),
                reason: format!("invalid timestamp {}: {}", self.timestamp, e),
            })?
            .with_timezone(&Utc);

        Ok(Block {
            index: self.index,
            timestamp,
            transactions: self
                .transactions
                .into_iter()
                .map(|transaction| Transaction {
                    sender: Address(transaction.sender),
                    recipient: Address(transaction.recipient),
                    amount: transaction.amount,
                })
                .collect(),
            previous_hash: self.previous_hash,
            merkle_root: self.merkle_root,
            nonce: self.nonce,
            aux_data: self.aux_data,
            hash: self.hash,
        })
    }
}

/// Durable block storage, one record per block keyed by its index
pub struct BlockStore {
    /// The database instance
    db: Db,

    /// Tree for blocks
    blocks: Tree,

    /// Tree for metadata
    metadata: Tree,
}

impl std::fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStore")
            .field("blocks", &self.blocks.len())
            .finish()
    }
}

impl BlockStore {
    /// Opens (or creates) a block store
    ///
    /// # Arguments
    ///
    /// * `path` - The path to the database directory
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path.as_ref())?;
        info!("Opened block store at {}", path.as_ref().display());
        Self::from_db(db)
    }

    /// Opens a store that is deleted when dropped
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, StorageError> {
        let blocks = db.open_tree("blocks")?;
        let metadata = db.open_tree("metadata")?;

        match metadata.get(SCHEMA_VERSION_KEY)? {
            Some(value) => {
                let found: u32 = bincode::deserialize(&value).map_err(|e| {
                    StorageError::DeserializationError {
                        key: SCHEMA_VERSION_KEY.to_string(),
                        reason: e.to_string(),
                    }
                })?;

                if found != BLOCK_SCHEMA_VERSION {
                    return Err(StorageError::UnsupportedVersion {
                        found,
                        expected: BLOCK_SCHEMA_VERSION,
                    });
                }
            }
            None => {
                let value = bincode::serialize(&BLOCK_SCHEMA_VERSION)
                    .map_err(|e| StorageError::SerializationError(e.to_string()))?;
                metadata.insert(SCHEMA_VERSION_KEY, value)?;
            }
        }

        Ok(Self {
            db,
            blocks,
            metadata,
        })
    }

    /// Record key for a block index
    ///
    /// Zero padded to the width of `u64::MAX` so byte order is chain order.
    pub fn block_key(index: u64) -> String {
        format!("{:020}", index)
    }

    /// Writes a block and flushes it to disk
    ///
    /// Writing an index that already exists replaces only that record.
    pub fn persist(&self, block: &Block) -> Result<(), StorageError> {
        let key = Self::block_key(block.index);
        let value = bincode::serialize(&StoredBlock::from(block))
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        self.blocks.insert(key.as_bytes(), value)?;
        self.db.flush()?;

        debug!("Persisted block {} under key {}", block.index, key);
        Ok(())
    }

    /// Reads every stored block in key order
    ///
    /// Returns an empty vector for an empty store. Any unreadable record
    /// fails the whole load.
    pub fn load_all(&self) -> Result<Vec<Block>, StorageError> {
        let mut blocks = Vec::with_capacity(self.blocks.len());

        for entry in self.blocks.iter() {
            let (key, value) = entry?;
            let key = String::from_utf8_lossy(&key).to_string();

            let stored: StoredBlock = bincode::deserialize(&value).map_err(|e| {
                StorageError::DeserializationError {
                    key: key.clone(),
                    reason: e.to_string(),
                }
            })?;

            let block = stored.into_block(&key)?;
            if Self::block_key(block.index) != key {
                return Err(StorageError::KeyMismatch {
                    key,
                    index: block.index,
                });
            }

            blocks.push(block);
        }

        Ok(blocks)
    }

    /// Number of stored blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Schema version recorded in the store metadata
    pub fn schema_version(&self) -> Result<Option<u32>, StorageError> {
        self.metadata
            .get(SCHEMA_VERSION_KEY)?
            .map(|value| {
                bincode::deserialize(&value).map_err(|e| StorageError::DeserializationError {
                    key: SCHEMA_VERSION_KEY.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    #[cfg(test)]
    fn insert_raw(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        self.blocks.insert(key.as_bytes(), value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::hash::ZERO_HASH;
    use crate::blockchain::pow::seal;

    fn sealed_chain(length: u64) -> Vec<Block> {
        let mut chain: Vec<Block> = Vec::new();

        for index in 0..length {
            let previous = chain
                .last()
                .map(|block| block.hash.clone())
                .unwrap_or_else(|| ZERO_HASH.to_string());
            let transactions = (0..index)
                .map(|i| Transaction::new(format!("s{}", i), format!("r{}", i), i as f64 + 0.25))
                .collect();
            let aux_data = if index % 2 == 0 { None } else { Some(format!("memo {}", index)) };

            chain.push(seal(Block::new(index, transactions, previous, aux_data), 1));
        }

        chain
    }

    #[test]
    fn test_block_key_is_fixed_width() {
        assert_eq!(BlockStore::block_key(0), "00000000000000000000");
        assert_eq!(BlockStore::block_key(42), "00000000000000000042");
        assert_eq!(BlockStore::block_key(u64::MAX).len(), 20);
        assert!(BlockStore::block_key(9) < BlockStore::block_key(10));
    }

    #[test]
    fn test_empty_store() {
        let store = BlockStore::temporary().unwrap();

        assert!(store.is_empty());
        assert!(store.load_all().unwrap().is_empty());
        assert_eq!(store.schema_version().unwrap(), Some(BLOCK_SCHEMA_VERSION));
    }

    #[test]
    fn test_round_trip_in_key_order() {
        let store = BlockStore::temporary().unwrap();
        let chain = sealed_chain(12);

        // write out of order; keys still sort into chain order
        for block in chain.iter().rev() {
            store.persist(block).unwrap();
        }

        assert_eq!(store.len(), 12);
        assert_eq!(store.load_all().unwrap(), chain);
    }

    #[test]
    fn test_round_trip_preserves_hashes() {
        let store = BlockStore::temporary().unwrap();
        let chain = sealed_chain(4);
        for block in &chain {
            store.persist(block).unwrap();
        }

        for (loaded, original) in store.load_all().unwrap().iter().zip(&chain) {
            assert_eq!(loaded.calculate_hash(), original.hash);
            assert_eq!(loaded.nonce, original.nonce);
            assert_eq!(loaded.timestamp, original.timestamp);
        }
    }

    #[test]
    fn test_persist_overwrites_single_record() {
        let store = BlockStore::temporary().unwrap();
        let chain = sealed_chain(3);
        for block in &chain {
            store.persist(block).unwrap();
        }

        let mut replacement = chain[1].clone();
        replacement.aux_data = Some("rewritten".to_string());
        store.persist(&replacement).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0], chain[0]);
        assert_eq!(loaded[1], replacement);
        assert_eq!(loaded[2], chain[2]);
    }

    #[test]
    fn test_reopen_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let chain = sealed_chain(5);

        {
            let store = BlockStore::open(dir.path()).unwrap();
            for block in &chain {
                store.persist(block).unwrap();
            }
        }

        let store = BlockStore::open(dir.path()).unwrap();
        assert_eq!(store.load_all().unwrap(), chain);
    }

    #[test]
    fn test_undecodable_record_fails_load() {
        let store = BlockStore::temporary().unwrap();
        store.persist(&sealed_chain(1)[0]).unwrap();
        store.insert_raw(&BlockStore::block_key(1), vec![1, 2, 3]).unwrap();

        assert!(matches!(
            store.load_all(),
            Err(StorageError::DeserializationError { .. })
        ));
    }

    #[test]
    fn test_key_mismatch_fails_load() {
        let store = BlockStore::temporary().unwrap();
        let block = &sealed_chain(1)[0];
        let value = bincode::serialize(&StoredBlock::from(block)).unwrap();
        store.insert_raw(&BlockStore::block_key(7), value).unwrap();

        assert!(matches!(
            store.load_all(),
            Err(StorageError::KeyMismatch { index: 0, .. })
        ));
    }

    #[test]
    fn test_unknown_record_version_fails_load() {
        let store = BlockStore::temporary().unwrap();
        let mut record = StoredBlock::from(&sealed_chain(1)[0]);
        record.schema_version = 99;
        store
            .insert_raw(&BlockStore::block_key(0), bincode::serialize(&record).unwrap())
            .unwrap();

        assert!(matches!(
            store.load_all(),
            Err(StorageError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn test_unknown_store_version_fails_open() {
        let dir = tempfile::tempdir().unwrap();

        {
            let db = sled::open(dir.path()).unwrap();
            let metadata = db.open_tree("metadata").unwrap();
            metadata
                .insert(SCHEMA_VERSION_KEY, bincode::serialize(&2u32).unwrap())
                .unwrap();
            db.flush().unwrap();
        }

        assert!(matches!(
            BlockStore::open(dir.path()),
            Err(StorageError::UnsupportedVersion { found: 2, expected: 1 })
        ));
    }
}
