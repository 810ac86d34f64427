//! Account views derived by replaying the chain.
//!
//! Nothing here is stored: every figure is folded from sealed transactions
//! on demand.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use std::collections::BTreeMap;

use super::block::Block;
use super::transaction::{Address, Transaction};

/// Replayed totals for a single address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Account {
    /// The account's address
    pub address: Address,

    /// Received minus sent
    pub balance: f64,

    /// Total amount received
    pub received: f64,

    /// Total amount sent
    pub sent: f64,

    /// Number of transactions the address takes part in
    pub transaction_count: u64,
}

impl Account {
    /// Creates an account with no activity
    pub fn new(address: Address) -> Self {
        Account {
            address,
            balance: 0.0,
            received: 0.0,
            sent: 0.0,
            transaction_count: 0,
        }
    }

    /// Applies one transaction to this account, if it is involved
    pub fn apply(&mut self, transaction: &Transaction) {
        if !transaction.involves(&self.address) {
            return;
        }

        if transaction.recipient == self.address {
            self.received += transaction.amount;
            self.balance += transaction.amount;
        }

        if transaction.sender == self.address {
            self.sent += transaction.amount;
            self.balance -= transaction.amount;
        }

        self.transaction_count += 1;
    }
}

/// Every sealed transaction, in block order then in-block order
pub fn chain_transactions(chain: &[Block]) -> impl Iterator<Item = &Transaction> {
    chain.iter().flat_map(|block| block.transactions.iter())
}

/// Net balance of an address over a sequence of transactions
pub fn balance_of<'a, I>(transactions: I, address: &Address) -> f64
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut account = Account::new(address.clone());
    for transaction in transactions {
        account.apply(transaction);
    }
    account.balance
}

/// Every transaction sent or received by an address, in chain order
pub fn history_of(chain: &[Block], address: &Address) -> Vec<Transaction> {
    chain_transactions(chain)
        .filter(|transaction| transaction.involves(address))
        .cloned()
        .collect()
}

/// Replays the chain into one account per address, sorted by address
pub fn replay_accounts(chain: &[Block]) -> Vec<Account> {
    let mut accounts: BTreeMap<Address, Account> = BTreeMap::new();

    for transaction in chain_transactions(chain) {
        for address in [&transaction.sender, &transaction.recipient] {
            accounts
                .entry(address.clone())
                .or_insert_with(|| Account::new(address.clone()));
        }

        if let Some(sender) = accounts.get_mut(&transaction.sender) {
            sender.apply(transaction);
        }

        // a self transfer was already applied through the sender entry
        if transaction.recipient != transaction.sender {
            if let Some(recipient) = accounts.get_mut(&transaction.recipient) {
                recipient.apply(transaction);
            }
        }
    }

    accounts.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::hash::ZERO_HASH;

    fn block(index: u64, transactions: Vec<Transaction>) -> Block {
        Block::new(index, transactions, ZERO_HASH.to_string(), None)
    }

    #[test]
    fn test_account_creation() {
        let address = Address("test_address".to_string());
        let account = Account::new(address.clone());

        assert_eq!(account.address, address);
        assert_eq!(account.balance, 0.0);
        assert_eq!(account.transaction_count, 0);
    }

    #[test]
    fn test_apply() {
        let mut account = Account::new("bob".into());

        account.apply(&Transaction::new("alice", "bob", 10.0));
        account.apply(&Transaction::new("bob", "carol", 4.0));
        account.apply(&Transaction::new("alice", "carol", 100.0));

        assert_eq!(account.balance, 6.0);
        assert_eq!(account.received, 10.0);
        assert_eq!(account.sent, 4.0);
        assert_eq!(account.transaction_count, 2);
    }

    #[test]
    fn test_self_transfer_nets_zero() {
        let mut account = Account::new("alice".into());
        account.apply(&Transaction::new("alice", "alice", 5.0));

        assert_eq!(account.balance, 0.0);
        assert_eq!(account.transaction_count, 1);
    }

    #[test]
    fn test_balance_of() {
        let chain = vec![block(
            1,
            vec![
                Transaction::new("A", "B", 10.0),
                Transaction::new("B", "C", 5.0),
                Transaction::new("C", "A", 2.0),
            ],
        )];

        let transactions = || chain_transactions(&chain);
        assert_eq!(balance_of(transactions(), &"A".into()), -8.0);
        assert_eq!(balance_of(transactions(), &"B".into()), 5.0);
        assert_eq!(balance_of(transactions(), &"C".into()), 3.0);
        assert_eq!(balance_of(transactions(), &"D".into()), 0.0);
    }

    #[test]
    fn test_history_of_keeps_chain_order() {
        let chain = vec![
            block(0, Vec::new()),
            block(
                1,
                vec![
                    Transaction::new("A", "B", 1.0),
                    Transaction::new("C", "D", 2.0),
                    Transaction::new("B", "A", 3.0),
                ],
            ),
            block(2, vec![Transaction::new("D", "A", 4.0)]),
        ];

        let amounts: Vec<f64> = history_of(&chain, &"A".into())
            .iter()
            .map(|transaction| transaction.amount)
            .collect();

        assert_eq!(amounts, vec![1.0, 3.0, 4.0]);
        assert!(history_of(&chain, &"Z".into()).is_empty());
    }

    #[test]
    fn test_replay_accounts() {
        let chain = vec![block(
            1,
            vec![
                Transaction::new("B", "A", 10.0),
                Transaction::new("A", "C", 4.0),
                Transaction::new("C", "C", 1.0),
            ],
        )];

        let accounts = replay_accounts(&chain);
        let addresses: Vec<&str> = accounts.iter().map(|a| a.address.as_str()).collect();
        assert_eq!(addresses, vec!["A", "B", "C"]);

        assert_eq!(accounts[0].balance, 6.0);
        assert_eq!(accounts[1].balance, -10.0);
        assert_eq!(accounts[2].balance, 4.0);
        assert_eq!(accounts[2].transaction_count, 2);
    }
}
