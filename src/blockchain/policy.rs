use serde::{Deserialize, Serialize};

use super::transaction::{Transaction, TransactionError};

/// Optional admission rules applied on top of the field checks every
/// transaction goes through
///
/// The defaults only reject what `Transaction::validate_fields` rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionPolicy {
    /// Accept transfers of exactly zero
    pub allow_zero_amount: bool,

    /// Accept transfers where sender and recipient are the same address
    pub allow_self_transfer: bool,

    /// Require the sender's spendable balance to cover the amount
    pub require_funds: bool,
}

impl Default for TransactionPolicy {
    fn default() -> Self {
        TransactionPolicy {
            allow_zero_amount: true,
            allow_self_transfer: true,
            require_funds: false,
        }
    }
}

impl TransactionPolicy {
    /// Checks a transaction against the policy
    ///
    /// # Arguments
    ///
    /// * `transaction` - The transaction to admit
    /// * `available` - Computes the sender's spendable balance; only called
    ///   when `require_funds` is set
    pub fn check<F>(&self, transaction: &Transaction, available: F) -> Result<(), TransactionError>
    where
        F: FnOnce() -> f64,
    {
        transaction.validate_fields()?;

        if !self.allow_zero_amount && transaction.amount == 0.0 {
            return Err(TransactionError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        if !self.allow_self_transfer && transaction.sender == transaction.recipient {
            return Err(TransactionError::SelfTransfer(transaction.sender.to_string()));
        }

        if self.require_funds {
            let available = available();
            if available < transaction.amount {
                return Err(TransactionError::InsufficientFunds {
                    required: transaction.amount,
                    available,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = TransactionPolicy::default();

        assert!(policy.check(&Transaction::new("a", "b", 0.0), || 0.0).is_ok());
        assert!(policy.check(&Transaction::new("a", "a", 5.0), || 0.0).is_ok());
        assert!(policy.check(&Transaction::new("a", "b", 5.0), || -100.0).is_ok());
        assert!(matches!(
            policy.check(&Transaction::new("a", "b", -5.0), || 0.0),
            Err(TransactionError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_default_policy_skips_balance_lookup() {
        let policy = TransactionPolicy::default();
        let result = policy.check(&Transaction::new("a", "b", 1.0), || {
            panic!("balance should not be computed")
        });
        assert!(result.is_ok());
    }

    #[test]
    fn test_zero_amount_rejected() {
        let policy = TransactionPolicy {
            allow_zero_amount: false,
            ..Default::default()
        };

        assert!(matches!(
            policy.check(&Transaction::new("a", "b", 0.0), || 0.0),
            Err(TransactionError::InvalidAmount(_))
        ));
        assert!(policy.check(&Transaction::new("a", "b", 0.1), || 0.0).is_ok());
    }

    #[test]
    fn test_self_transfer_rejected() {
        let policy = TransactionPolicy {
            allow_self_transfer: false,
            ..Default::default()
        };

        assert_eq!(
            policy.check(&Transaction::new("a", "a", 1.0), || 0.0),
            Err(TransactionError::SelfTransfer("a".to_string()))
        );
    }

    #[test]
    fn test_require_funds() {
        let policy = TransactionPolicy {
            require_funds: true,
            ..Default::default()
        };

        assert!(policy.check(&Transaction::new("a", "b", 10.0), || 10.0).is_ok());
        assert_eq!(
            policy.check(&Transaction::new("a", "b", 10.0), || 7.5),
            Err(TransactionError::InsufficientFunds {
                required: 10.0,
                available: 7.5
            })
        );
    }
}
