use actix_web::{web, HttpResponse};
use log::info;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::{
    Account, Address, Block, Blockchain, SubmitOutcome, Transaction, Violation,
};

use super::schema::{ApiError, ErrorResponse};

/// Data structure for the blockchain state
///
/// Queries below take the ledger lock directly; they only clone or fold
/// the chain. Anything that seals or walks the whole chain goes through
/// `web::block`.
pub type BlockchainData = web::Data<Blockchain>;

/// Response for the chain endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The length of the chain
    pub length: usize,

    /// The blocks in the chain
    pub chain: Vec<Block>,

    /// Whether the chain is valid
    pub is_valid: bool,
}

/// A transfer as submitted by clients
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    /// The sender's address
    pub sender: String,

    /// The recipient's address
    pub recipient: String,

    /// The amount to transfer
    pub amount: f64,
}

impl From<TransactionRequest> for Transaction {
    fn from(request: TransactionRequest) -> Self {
        Transaction::new(request.sender, request.recipient, request.amount)
    }
}

/// Response for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    /// The message
    pub message: String,

    /// Whether this submission sealed a block
    pub sealed: bool,

    /// Transactions still waiting in the buffer
    pub pending: usize,

    /// Index of the sealed block, if one was sealed
    pub block_index: Option<u64>,

    /// The length of the chain after the submission
    pub chain_length: usize,
}

/// Request for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineRequest {
    /// Transactions to seal into the new block
    #[serde(default)]
    pub transactions: Vec<TransactionRequest>,

    /// Optional payload covered by the block hash
    #[serde(default)]
    pub aux_data: Option<String>,
}

/// Response for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    /// The message
    pub message: String,

    /// The length of the chain including the new block
    pub length: usize,

    /// The newly mined block
    pub block: Block,
}

/// Response for the seal pending endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct SealResponse {
    /// The message
    pub message: String,

    /// The sealed block, absent when nothing was pending
    pub block: Option<Block>,
}

/// Response for the balance endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: f64,
}

/// Response for the address history endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HistoryResponse {
    pub address: String,

    /// Transactions in chain order
    pub transactions: Vec<Transaction>,
}

/// Response for the validate endpoint
#[derive(Serialize, ToSchema)]
pub struct ValidationResponse {
    /// Whether the chain is valid
    pub valid: bool,

    /// Index of the first offending block
    pub index: Option<u64>,

    /// Why that block failed
    pub reason: Option<Violation>,
}

/// Get the full blockchain
///
/// Returns the entire blockchain and its validity status
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Blockchain retrieved successfully", body = ChainResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn get_chain(blockchain: BlockchainData) -> Result<HttpResponse, ApiError> {
    // revalidation walks every block and waits on any seal in progress
    let (chain, is_valid) =
        web::block(move || (blockchain.get_chain(), blockchain.is_valid())).await?;

    let response = ChainResponse {
        length: chain.len(),
        chain,
        is_valid,
    };

    Ok(HttpResponse::Ok().json(response))
}

/// Get a block by index
#[utoipa::path(
    get,
    path = "/api/v1/blocks/{index}",
    responses(
        (status = 200, description = "Block retrieved successfully", body = Block),
        (status = 404, description = "No block at this index", body = ErrorResponse)
    )
)]
pub async fn get_block(
    blockchain: BlockchainData,
    index: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let block = blockchain.get_block(index.into_inner())?;
    Ok(HttpResponse::Ok().json(block))
}

/// Mine a new block
///
/// Seals the given transactions into exactly one new block. The pending
/// buffer is not touched.
#[utoipa::path(
    post,
    path = "/api/v1/mine",
    request_body = MineRequest,
    responses(
        (status = 200, description = "Block mined successfully", body = MineResponse),
        (status = 400, description = "Invalid transaction data", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn mine_block(
    blockchain: BlockchainData,
    mine_req: web::Json<MineRequest>,
) -> Result<HttpResponse, ApiError> {
    let MineRequest {
        transactions,
        aux_data,
    } = mine_req.into_inner();
    let transactions: Vec<Transaction> = transactions.into_iter().map(Transaction::from).collect();

    // proof of work is CPU bound; keep it off the async workers
    let block = web::block(move || blockchain.seal_batch(transactions, aux_data)).await??;
    info!("Mined block {} via API", block.index);

    Ok(HttpResponse::Ok().json(MineResponse {
        message: "New Block Mined".to_string(),
        length: block.index as usize + 1,
        block,
    }))
}

/// Create a new transaction
///
/// Adds a new transaction to the pending transactions. Filling the buffer
/// seals a block before the response is sent.
#[utoipa::path(
    post,
    path = "/api/v1/transactions/new",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction accepted", body = TransactionResponse),
        (status = 400, description = "Invalid transaction data", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn new_transaction(
    blockchain: BlockchainData,
    transaction_req: web::Json<TransactionRequest>,
) -> Result<HttpResponse, ApiError> {
    let transaction = Transaction::from(transaction_req.into_inner());

    let worker = blockchain.clone();
    let outcome = web::block(move || worker.submit(transaction)).await??;

    let response = match outcome {
        SubmitOutcome::Pending { pending } => TransactionResponse {
            message: "Transaction will be added to the next block".to_string(),
            sealed: false,
            pending,
            block_index: None,
            chain_length: blockchain.len(),
        },
        SubmitOutcome::Sealed {
            block_index,
            chain_length,
        } => TransactionResponse {
            message: format!("Transaction sealed in block {}", block_index),
            sealed: true,
            pending: 0,
            block_index: Some(block_index),
            chain_length,
        },
    };

    Ok(HttpResponse::Created().json(response))
}

/// Seal pending transactions
///
/// Seals everything in the pending buffer without waiting for the threshold
#[utoipa::path(
    post,
    path = "/api/v1/transactions/seal",
    responses(
        (status = 200, description = "Pending transactions sealed", body = SealResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn seal_pending(blockchain: BlockchainData) -> Result<HttpResponse, ApiError> {
    let block = web::block(move || blockchain.seal_pending()).await??;

    let message = match &block {
        Some(block) => format!("Sealed block {}", block.index),
        None => "No pending transactions".to_string(),
    };

    Ok(HttpResponse::Ok().json(SealResponse { message, block }))
}

/// Get all pending transactions
///
/// Returns all transactions waiting to be included in a block
#[utoipa::path(
    get,
    path = "/api/v1/transactions/pending",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = Vec<Transaction>)
    )
)]
pub async fn get_pending_transactions(blockchain: BlockchainData) -> HttpResponse {
    HttpResponse::Ok().json(blockchain.get_pending_transactions())
}

/// Get the transactions of an address
///
/// Returns every sealed transaction sent or received by the address
#[utoipa::path(
    get,
    path = "/api/v1/transactions/address/{address}",
    responses(
        (status = 200, description = "History retrieved successfully", body = HistoryResponse)
    )
)]
pub async fn get_address_history(
    blockchain: BlockchainData,
    address: web::Path<String>,
) -> HttpResponse {
    let address = Address(address.into_inner());
    let transactions = blockchain.get_transactions_by_address(&address);

    HttpResponse::Ok().json(HistoryResponse {
        address: address.0,
        transactions,
    })
}

/// Get an address balance
///
/// Returns the balance replayed from the chain
#[utoipa::path(
    get,
    path = "/api/v1/balance/{address}",
    responses(
        (status = 200, description = "Balance retrieved successfully", body = BalanceResponse)
    )
)]
pub async fn get_balance(blockchain: BlockchainData, address: web::Path<String>) -> HttpResponse {
    let address = Address(address.into_inner());
    let balance = blockchain.get_balance(&address);

    HttpResponse::Ok().json(BalanceResponse {
        address: address.0,
        balance,
    })
}

/// Get all accounts
///
/// Returns the replayed totals of every address in the chain
#[utoipa::path(
    get,
    path = "/api/v1/accounts",
    responses(
        (status = 200, description = "Accounts retrieved successfully", body = Vec<Account>)
    )
)]
pub async fn get_all_accounts(blockchain: BlockchainData) -> HttpResponse {
    HttpResponse::Ok().json(blockchain.get_accounts())
}

/// Check if the blockchain is valid
///
/// Validates the entire blockchain and reports the first violation
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Blockchain validation status", body = ValidationResponse)
    )
)]
pub async fn validate_chain(blockchain: BlockchainData) -> Result<HttpResponse, ApiError> {
    let result = web::block(move || blockchain.validate()).await?;

    let response = match result {
        Ok(()) => ValidationResponse {
            valid: true,
            index: None,
            reason: None,
        },
        Err(violation) => ValidationResponse {
            valid: false,
            index: Some(violation.index),
            reason: Some(violation.reason),
        },
    };

    Ok(HttpResponse::Ok().json(response))
}
