use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::blockchain::BlockchainError;

/// Body returned with every error status
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Human readable reason
    pub error: String,
}

/// Errors surfaced by the HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] BlockchainError),

    #[error("Ledger worker failed: {0}")]
    Worker(#[from] BlockingError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Ledger(BlockchainError::TransactionError(_)) => StatusCode::BAD_REQUEST,
            ApiError::Ledger(BlockchainError::BlockNotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Ledger(BlockchainError::StorageError(_))
            | ApiError::Ledger(BlockchainError::IntegrityViolation(_))
            | ApiError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
