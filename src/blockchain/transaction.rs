use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use std::fmt;

/// Errors raised when a transaction is rejected before buffering or sealing
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransactionError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid sender address: {0}")]
    InvalidSenderAddress(String),

    #[error("Invalid recipient address: {0}")]
    InvalidRecipientAddress(String),

    #[error("Self transfer not allowed for {0}")]
    SelfTransfer(String),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: f64, available: f64 },
}

/// An account identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub struct Address(pub String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Address(s)
    }
}

/// A value transfer between two accounts
///
/// Transactions carry no identity of their own: two transfers with the same
/// fields are indistinguishable once sealed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Sender's address
    pub sender: Address,

    /// Recipient's address
    pub recipient: Address,

    /// Amount being transferred
    pub amount: f64,
}

impl Transaction {
    pub fn new(sender: impl Into<Address>, recipient: impl Into<Address>, amount: f64) -> Self {
        Transaction {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }

    /// Stable textual form used for Merkle leaves
    ///
    /// A JSON object with keys in sorted order, independent of the struct
    /// layout above.
    pub fn canonical_string(&self) -> String {
        serde_json::json!({
            "amount": self.amount,
            "recipient": self.recipient.0,
            "sender": self.sender.0,
        })
        .to_string()
    }

    /// Checks the rules every transaction must satisfy regardless of policy
    pub fn validate_fields(&self) -> Result<(), TransactionError> {
        if !self.amount.is_finite() {
            return Err(TransactionError::InvalidAmount(format!(
                "Amount must be a finite number: {}",
                self.amount
            )));
        }

        if self.amount < 0.0 {
            return Err(TransactionError::InvalidAmount(format!(
                "Amount must not be negative: {}",
                self.amount
            )));
        }

        if self.sender.0.trim().is_empty() {
            return Err(TransactionError::InvalidSenderAddress(
                "Sender address is empty".to_string(),
            ));
        }

        if self.recipient.0.trim().is_empty() {
            return Err(TransactionError::InvalidRecipientAddress(
                "Recipient address is empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether the given address is the sender or the recipient
    pub fn involves(&self, address: &Address) -> bool {
        &self.sender == address || &self.recipient == address
    }
}
