//! Ledger store: authoritative account and transaction maps
//!
//! The store pairs the live in-memory state with a write-through JSON
//! snapshot. `commit` persists the *next* state before swapping it in,
//! so a failed write leaves the previous state untouched and the caller
//! sees the failure. Nothing moves without hitting disk first.

use crate::{
    credential::PasswordHash,
    types::{Account, AccountId, Role, Transaction, TxStatus},
    Result,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// In-memory ledger state: all accounts and all transactions
#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    accounts: HashMap<AccountId, Account>,
    transactions: HashMap<Uuid, Transaction>,
}

impl LedgerState {
    /// Look up an account
    pub fn get_account(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.get(id)
    }

    /// Insert or replace an account
    pub fn put_account(&mut self, account: Account) {
        self.accounts.insert(account.username.clone(), account);
    }

    /// Look up a transaction
    pub fn get_transaction(&self, id: &Uuid) -> Option<&Transaction> {
        self.transactions.get(id)
    }

    /// Insert or replace a transaction
    pub fn put_transaction(&mut self, tx: Transaction) {
        self.transactions.insert(tx.id, tx);
    }

    /// Iterate all accounts
    pub fn all_accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    /// Fresh transaction id, never previously used
    pub fn next_transaction_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Store: live state plus its snapshot location
pub struct Store {
    state: LedgerState,
    path: PathBuf,
}

impl Store {
    /// Open the store, loading an existing snapshot if present
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(content) => {
                let snapshot: Snapshot = serde_json::from_str(&content)?;
                snapshot.into_state()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LedgerState::default(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            path = %path.display(),
            accounts = state.accounts.len(),
            transactions = state.transactions.len(),
            "Ledger store opened"
        );

        Ok(Self { state, path })
    }

    /// Current state (reads)
    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    /// Commit a new state: persist first, swap only on success
    pub fn commit(&mut self, next: LedgerState) -> Result<()> {
        persist(&self.path, &next)?;
        self.state = next;
        Ok(())
    }
}

/// Write a snapshot atomically: temp file in the same directory, then rename
fn persist(path: &Path, state: &LedgerState) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let snapshot = Snapshot::from_state(state);
    let content = serde_json::to_string_pretty(&snapshot)?;

    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;

    tracing::debug!(path = %path.display(), "Snapshot written");
    Ok(())
}

// Snapshot layout:
//
// accounts:     username -> { password_hash, role, balance }
// transactions: txid     -> { from, to, amount, status, initiator }

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    accounts: HashMap<String, AccountRecord>,
    #[serde(default)]
    transactions: HashMap<Uuid, TxRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccountRecord {
    password_hash: PasswordHash,
    role: Role,
    balance: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
struct TxRecord {
    from: String,
    to: String,
    amount: Decimal,
    status: TxStatus,
    initiator: String,
}

impl Snapshot {
    fn from_state(state: &LedgerState) -> Self {
        let accounts = state
            .accounts
            .iter()
            .map(|(id, account)| {
                (
                    id.as_str().to_string(),
                    AccountRecord {
                        password_hash: account.password_hash.clone(),
                        role: account.role,
                        balance: account.balance,
                    },
                )
            })
            .collect();

        let transactions = state
            .transactions
            .iter()
            .map(|(id, tx)| {
                (
                    *id,
                    TxRecord {
                        from: tx.from.as_str().to_string(),
                        to: tx.to.as_str().to_string(),
                        amount: tx.amount,
                        status: tx.status,
                        initiator: tx.initiator.as_str().to_string(),
                    },
                )
            })
            .collect();

        Self {
            accounts,
            transactions,
        }
    }

    fn into_state(self) -> LedgerState {
        let mut state = LedgerState::default();

        for (username, record) in self.accounts {
            let id = AccountId::new(username);
            state.put_account(Account {
                username: id,
                password_hash: record.password_hash,
                role: record.role,
                balance: record.balance,
            });
        }

        for (id, record) in self.transactions {
            state.put_transaction(Transaction {
                id,
                from: AccountId::new(record.from),
                to: AccountId::new(record.to),
                amount: record.amount,
                status: record.status,
                initiator: AccountId::new(record.initiator),
            });
        }

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(name: &str, role: Role, balance: i64) -> Account {
        Account {
            username: AccountId::new(name),
            password_hash: PasswordHash::digest("pw"),
            role,
            balance: Decimal::from(balance),
        }
    }

    #[test]
    fn test_open_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("ledger.json")).unwrap();
        assert_eq!(store.state().all_accounts().count(), 0);
    }

    #[test]
    fn test_commit_then_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let mut store = Store::open(&path).unwrap();
        let mut next = store.state().clone();
        next.put_account(account("alice", Role::User, 75));
        let tx_id = next.next_transaction_id();
        next.put_transaction(Transaction {
            id: tx_id,
            from: AccountId::new("alice"),
            to: AccountId::new("bob"),
            amount: Decimal::from(10),
            status: TxStatus::Pending,
            initiator: AccountId::new("alice"),
        });
        store.commit(next).unwrap();

        let reopened = Store::open(&path).unwrap();
        let alice = reopened
            .state()
            .get_account(&AccountId::new("alice"))
            .unwrap();
        assert_eq!(alice.balance, Decimal::from(75));
        assert_eq!(alice.role, Role::User);

        let tx = reopened.state().get_transaction(&tx_id).unwrap();
        assert_eq!(tx.status, TxStatus::Pending);
        assert_eq!(tx.initiator, AccountId::new("alice"));
    }

    #[test]
    fn test_failed_persist_keeps_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path().join("ledger.json")).unwrap();

        let mut next = store.state().clone();
        next.put_account(account("alice", Role::User, 10));
        store.commit(next).unwrap();

        // Point the snapshot at an unwritable location
        store.path = dir.path().join("gone").join("deeper").join("x.json");
        std::fs::write(dir.path().join("gone"), b"not a directory").unwrap();

        let mut next = store.state().clone();
        next.put_account(account("alice", Role::User, 999));
        assert!(store.commit(next).is_err());

        // In-memory state unchanged
        let alice = store.state().get_account(&AccountId::new("alice")).unwrap();
        assert_eq!(alice.balance, Decimal::from(10));
    }

    #[test]
    fn test_snapshot_wire_layout() {
        let mut state = LedgerState::default();
        state.put_account(account("admin", Role::Admin, 0));

        let snapshot = Snapshot::from_state(&state);
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&snapshot).unwrap()).unwrap();

        assert_eq!(json["accounts"]["admin"]["role"], "ADMIN");
        assert!(json["accounts"]["admin"]["password_hash"].is_string());
    }

    #[test]
    fn test_fresh_transaction_ids() {
        let state = LedgerState::default();
        assert_ne!(state.next_transaction_id(), state.next_transaction_id());
    }
}
