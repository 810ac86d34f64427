use log::{debug, info, warn};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::path::Path;

use super::account::{self, Account};
use super::block::Block;
use super::hash::ZERO_HASH;
use super::policy::TransactionPolicy;
use super::pow::{self, GENESIS_DIFFICULTY};
use super::storage::{BlockStore, StorageError};
use super::transaction::{Address, Transaction, TransactionError};
use super::validation::{validate_chain, IntegrityViolation};

/// Errors that can occur during blockchain operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error(transparent)]
    IntegrityViolation(#[from] IntegrityViolation),

    #[error("Block {index} not found (chain length {length})")]
    BlockNotFound { index: u64, length: usize },
}

/// Tunables of the ledger engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Mining difficulty (number of leading zeros required in hash)
    pub difficulty: usize,

    /// Pending transactions that trigger an automatic seal
    pub seal_threshold: usize,

    /// Admission rules for new transactions
    pub policy: TransactionPolicy,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            difficulty: 4,
            seal_threshold: 2,
            policy: TransactionPolicy::default(),
        }
    }
}

/// Result of submitting a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The transaction waits in the pending buffer
    Pending { pending: usize },

    /// The submission filled the buffer and a block was sealed
    Sealed { block_index: u64, chain_length: usize },
}

/// Chain and pending buffer, always locked together
#[derive(Debug)]
struct LedgerState {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
}

impl LedgerState {
    fn tail(&self) -> &Block {
        // the chain always holds at least the genesis block
        &self.chain[self.chain.len() - 1]
    }

    /// Sender's balance after the chain and the given unsealed transactions
    fn spendable(&self, sender: &Address, unsealed: &[Transaction]) -> f64 {
        account::balance_of(
            account::chain_transactions(&self.chain).chain(unsealed.iter()),
            sender,
        )
    }
}

/// Represents the blockchain
///
/// A single lock covers the chain and the pending buffer, so reading the
/// tail, sealing, persisting, appending and clearing the buffer happen as
/// one step.
#[derive(Debug)]
pub struct Blockchain {
    /// The chain of blocks and the transactions waiting for the next one
    state: Mutex<LedgerState>,

    /// Difficulty, seal threshold and admission policy
    config: ChainConfig,

    /// Storage for blockchain data
    storage: Option<BlockStore>,
}

impl Blockchain {
    /// Creates an in-memory blockchain with a genesis block
    pub fn new(config: ChainConfig) -> Self {
        Blockchain {
            state: Mutex::new(LedgerState {
                chain: vec![Self::create_genesis_block()],
                pending: Vec::new(),
            }),
            config,
            storage: None,
        }
    }

    /// Creates a blockchain backed by a store at the given path
    ///
    /// # Arguments
    ///
    /// * `storage_path` - The path to the storage directory
    /// * `config` - Engine tunables
    pub fn with_storage<P: AsRef<Path>>(
        storage_path: P,
        config: ChainConfig,
    ) -> Result<Self, BlockchainError> {
        let storage = BlockStore::open(storage_path)?;
        Self::open(storage, config)
    }

    /// Creates a blockchain from an opened store
    ///
    /// An empty store gets a freshly sealed genesis block. A non-empty one
    /// is loaded and validated; any integrity violation aborts construction.
    pub fn open(storage: BlockStore, config: ChainConfig) -> Result<Self, BlockchainError> {
        let mut chain = storage.load_all()?;

        if chain.is_empty() {
            info!("No existing blockchain found in storage, creating genesis block");
            let genesis = Self::create_genesis_block();
            storage.persist(&genesis)?;
            chain.push(genesis);
        } else {
            validate_chain(&chain, config.difficulty).map_err(|violation| {
                warn!("Refusing to load stored chain: {}", violation);
                violation
            })?;
            info!("Loaded {} blocks from storage", chain.len());
        }

        Ok(Blockchain {
            state: Mutex::new(LedgerState {
                chain,
                pending: Vec::new(),
            }),
            config,
            storage: Some(storage),
        })
    }

    /// Creates the genesis block (first block in the chain)
    fn create_genesis_block() -> Block {
        pow::seal(
            Block::new(0, Vec::new(), ZERO_HASH.to_string(), None),
            GENESIS_DIFFICULTY,
        )
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock()
    }

    pub fn difficulty(&self) -> usize {
        self.config.difficulty
    }

    pub fn seal_threshold(&self) -> usize {
        self.config.seal_threshold
    }

    /// Submits a transaction built from its parts
    pub fn submit_transaction(
        &self,
        sender: impl Into<Address>,
        recipient: impl Into<Address>,
        amount: f64,
    ) -> Result<SubmitOutcome, BlockchainError> {
        self.submit(Transaction::new(sender, recipient, amount))
    }

    /// Adds a transaction to the pending buffer
    ///
    /// Rejected transactions leave the buffer untouched. When the buffer
    /// reaches the seal threshold the whole buffer is sealed into one block
    /// before this call returns.
    ///
    /// # Returns
    ///
    /// Whether the transaction is still pending or was sealed
    pub fn submit(&self, transaction: Transaction) -> Result<SubmitOutcome, BlockchainError> {
        let mut state = self.lock();

        self.config
            .policy
            .check(&transaction, || state.spendable(&transaction.sender, &state.pending))?;

        state.pending.push(transaction);
        let pending = state.pending.len();
        debug!("Buffered transaction, {} pending", pending);

        if pending < self.config.seal_threshold {
            return Ok(SubmitOutcome::Pending { pending });
        }

        let transactions = state.pending.clone();
        let block = match self.seal_and_append(&mut state, transactions, None) {
            Ok(block) => block,
            Err(err) => {
                // leave the buffer as it was before this call
                state.pending.pop();
                return Err(err);
            }
        };
        state.pending.clear();

        Ok(SubmitOutcome::Sealed {
            block_index: block.index,
            chain_length: state.chain.len(),
        })
    }

    /// Seals whatever is in the pending buffer, even below the threshold
    ///
    /// # Returns
    ///
    /// The sealed block, or `None` when nothing was pending
    pub fn seal_pending(&self) -> Result<Option<Block>, BlockchainError> {
        let mut state = self.lock();

        if state.pending.is_empty() {
            return Ok(None);
        }

        let transactions = state.pending.clone();
        let block = self.seal_and_append(&mut state, transactions, None)?;
        state.pending.clear();

        Ok(Some(block))
    }

    /// Seals an explicit batch into one block, bypassing the pending buffer
    ///
    /// # Returns
    ///
    /// The new chain length
    pub fn mine(&self, transactions: Vec<Transaction>) -> Result<usize, BlockchainError> {
        let block = self.seal_batch(transactions, None)?;
        Ok(block.index as usize + 1)
    }

    /// Seals an explicit batch with optional aux data into one block
    ///
    /// An empty batch is allowed and yields a block without a Merkle root.
    pub fn seal_batch(
        &self,
        transactions: Vec<Transaction>,
        aux_data: Option<String>,
    ) -> Result<Block, BlockchainError> {
        let mut state = self.lock();

        for (position, transaction) in transactions.iter().enumerate() {
            let admitted = &transactions[..position];
            self.config
                .policy
                .check(transaction, || state.spendable(&transaction.sender, admitted))?;
        }

        self.seal_and_append(&mut state, transactions, aux_data)
    }

    /// Builds a block on the current tail, seals, persists and appends it
    ///
    /// The block is persisted before it is appended, so a storage failure
    /// leaves the in-memory chain unchanged.
    fn seal_and_append(
        &self,
        state: &mut LedgerState,
        transactions: Vec<Transaction>,
        aux_data: Option<String>,
    ) -> Result<Block, BlockchainError> {
        let tail = state.tail();
        let candidate = Block::new(tail.index + 1, transactions, tail.hash.clone(), aux_data);
        let block = pow::seal(candidate, self.config.difficulty);

        if let Some(storage) = &self.storage {
            storage.persist(&block)?;
        }

        info!(
            "Sealed block {} with {} transactions (nonce {})",
            block.index,
            block.transactions.len(),
            block.nonce
        );

        state.chain.push(block.clone());
        Ok(block)
    }

    /// Gets the entire blockchain
    pub fn get_chain(&self) -> Vec<Block> {
        self.lock().chain.clone()
    }

    /// Number of blocks, genesis included
    pub fn len(&self) -> usize {
        self.lock().chain.len()
    }

    /// Gets the last block in the chain
    pub fn get_last_block(&self) -> Block {
        self.lock().tail().clone()
    }

    /// Gets the block at an index
    pub fn get_block(&self, index: u64) -> Result<Block, BlockchainError> {
        let state = self.lock();
        let block = usize::try_from(index)
            .ok()
            .and_then(|position| state.chain.get(position))
            .cloned();

        block.ok_or(BlockchainError::BlockNotFound {
            index,
            length: state.chain.len(),
        })
    }

    /// Gets all pending transactions
    pub fn get_pending_transactions(&self) -> Vec<Transaction> {
        self.lock().pending.clone()
    }

    /// Net balance of an address over every sealed transaction
    pub fn get_balance(&self, address: &Address) -> f64 {
        let state = self.lock();
        account::balance_of(account::chain_transactions(&state.chain), address)
    }

    /// Sealed transactions sent or received by an address, in chain order
    pub fn get_transactions_by_address(&self, address: &Address) -> Vec<Transaction> {
        account::history_of(&self.lock().chain, address)
    }

    /// Replayed totals for every address that appears in the chain
    pub fn get_accounts(&self) -> Vec<Account> {
        account::replay_accounts(&self.lock().chain)
    }

    /// Validates the blockchain
    pub fn validate(&self) -> Result<(), IntegrityViolation> {
        validate_chain(&self.lock().chain, self.config.difficulty)
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
