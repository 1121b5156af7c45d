//! Transaction engine: single-writer actor over the ledger store
//!
//! All ledger operations are messages processed by one task, so every
//! read-modify-write-persist sequence runs to completion before the
//! next begins. Two simultaneous approvals of one transaction cannot
//! both observe `Pending`, and a deposit concurrent with an approval
//! touching the same account cannot lose an update.
//!
//! Replies are only sent after the mutated snapshot is on disk; a
//! failed persist leaves the previous state in place and the caller
//! sees the failure.

use crate::{
    config::BootstrapConfig,
    credential::PasswordHash,
    policy::{may, Operation},
    session::{ConnId, SessionRegistry},
    store::Store,
    types::{Account, AccountId, Role, Transaction, TxStatus},
    Error, Result,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Message sent to the engine actor
pub enum EngineMessage {
    /// Authenticate a connection
    Login {
        conn: ConnId,
        username: AccountId,
        password: String,
        response: oneshot::Sender<Result<Role>>,
    },

    /// Release a connection's identity
    Logout {
        conn: ConnId,
        response: oneshot::Sender<Result<AccountId>>,
    },

    /// Create a new account
    Enroll {
        actor: AccountId,
        username: AccountId,
        password: String,
        role: Role,
        response: oneshot::Sender<Result<()>>,
    },

    /// Add cash to an account
    Deposit {
        actor: AccountId,
        target: AccountId,
        amount: Decimal,
        response: oneshot::Sender<Result<Uuid>>,
    },

    /// Remove cash from an account
    Withdraw {
        actor: AccountId,
        target: AccountId,
        amount: Decimal,
        response: oneshot::Sender<Result<Uuid>>,
    },

    /// Propose a payer-initiated transfer
    Send {
        actor: AccountId,
        target: AccountId,
        amount: Decimal,
        response: oneshot::Sender<Result<Uuid>>,
    },

    /// Propose a payee-initiated transfer
    Request {
        actor: AccountId,
        target: AccountId,
        amount: Decimal,
        response: oneshot::Sender<Result<Uuid>>,
    },

    /// Settle a pending transfer
    Approve {
        actor: AccountId,
        tx_id: Uuid,
        response: oneshot::Sender<Result<()>>,
    },

    /// Raise an account one role step
    Promote {
        actor: AccountId,
        target: AccountId,
        response: oneshot::Sender<Result<Role>>,
    },

    /// Lower an account one role step
    Demote {
        actor: AccountId,
        target: AccountId,
        response: oneshot::Sender<Result<Role>>,
    },

    /// Read the actor's balance
    Balance {
        actor: AccountId,
        response: oneshot::Sender<Result<Decimal>>,
    },
}

/// Actor that processes engine messages
pub struct Engine {
    /// Ledger store (owned: no other writer exists)
    store: Store,

    /// Session registry, shared with the dispatcher
    sessions: Arc<SessionRegistry>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<EngineMessage>,
}

impl Engine {
    /// Create new engine actor
    pub fn new(
        store: Store,
        sessions: Arc<SessionRegistry>,
        mailbox: mpsc::Receiver<EngineMessage>,
    ) -> Self {
        Self {
            store,
            sessions,
            mailbox,
        }
    }

    /// Run the actor event loop until every handle is dropped
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            self.handle_message(msg);
        }
        tracing::debug!("Engine mailbox closed, actor stopping");
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: EngineMessage) {
        match msg {
            EngineMessage::Login {
                conn,
                username,
                password,
                response,
            } => {
                let _ = response.send(self.login(conn, username, password));
            }

            EngineMessage::Logout { conn, response } => {
                let _ = response.send(self.logout(conn));
            }

            EngineMessage::Enroll {
                actor,
                username,
                password,
                role,
                response,
            } => {
                let _ = response.send(self.enroll(&actor, username, password, role));
            }

            EngineMessage::Deposit {
                actor,
                target,
                amount,
                response,
            } => {
                let _ = response.send(self.deposit(&actor, &target, amount));
            }

            EngineMessage::Withdraw {
                actor,
                target,
                amount,
                response,
            } => {
                let _ = response.send(self.withdraw(&actor, &target, amount));
            }

            EngineMessage::Send {
                actor,
                target,
                amount,
                response,
            } => {
                let _ = response.send(self.send(&actor, &target, amount));
            }

            EngineMessage::Request {
                actor,
                target,
                amount,
                response,
            } => {
                let _ = response.send(self.request(&actor, &target, amount));
            }

            EngineMessage::Approve {
                actor,
                tx_id,
                response,
            } => {
                let _ = response.send(self.approve(&actor, tx_id));
            }

            EngineMessage::Promote {
                actor,
                target,
                response,
            } => {
                let _ = response.send(self.change_role(
                    &actor,
                    &target,
                    Operation::Promote,
                    Role::promoted,
                ));
            }

            EngineMessage::Demote {
                actor,
                target,
                response,
            } => {
                let _ = response.send(self.change_role(
                    &actor,
                    &target,
                    Operation::Demote,
                    Role::demoted,
                ));
            }

            EngineMessage::Balance { actor, response } => {
                let _ = response.send(self.balance(&actor));
            }
        }
    }

    // Operations. Each mutating operation clones the current state,
    // applies its changes, and commits; the store swaps states only
    // after the snapshot write succeeds.

    fn login(&mut self, conn: ConnId, username: AccountId, password: String) -> Result<Role> {
        let account = self
            .store
            .state()
            .get_account(&username)
            .ok_or(Error::Auth)?;

        if !account.password_hash.verify(&password) {
            return Err(Error::Auth);
        }

        let role = account.role;
        self.sessions.bind(conn, username.clone(), role)?;

        tracing::info!(user = %username, role = %role, "Login");
        Ok(role)
    }

    fn logout(&mut self, conn: ConnId) -> Result<AccountId> {
        let account = self.sessions.release(conn).ok_or(Error::NotLoggedIn)?;
        tracing::info!(user = %account, "Logout");
        Ok(account)
    }

    fn enroll(
        &mut self,
        actor: &AccountId,
        username: AccountId,
        password: String,
        role: Role,
    ) -> Result<()> {
        self.authorize(actor, Operation::Enroll)?;

        if self.store.state().get_account(&username).is_some() {
            return Err(Error::DuplicateAccount(username.to_string()));
        }

        let mut next = self.store.state().clone();
        next.put_account(Account::new(
            username.clone(),
            PasswordHash::digest(&password),
            role,
        ));
        self.store.commit(next)?;

        tracing::info!(user = %username, role = %role, by = %actor, "Account enrolled");
        Ok(())
    }

    fn deposit(&mut self, actor: &AccountId, target: &AccountId, amount: Decimal) -> Result<Uuid> {
        self.authorize(actor, Operation::Deposit)?;

        let mut next = self.store.state().clone();
        let mut account = next
            .get_account(target)
            .cloned()
            .ok_or_else(|| Error::NoSuchAccount(target.to_string()))?;
        account.balance += amount;
        next.put_account(account);

        let receipt = next.next_transaction_id();
        self.store.commit(next)?;

        tracing::info!(target = %target, %amount, by = %actor, "Deposit");
        Ok(receipt)
    }

    fn withdraw(&mut self, actor: &AccountId, target: &AccountId, amount: Decimal) -> Result<Uuid> {
        self.authorize(actor, Operation::Withdraw)?;

        let mut next = self.store.state().clone();
        let mut account = next
            .get_account(target)
            .cloned()
            .ok_or_else(|| Error::NoSuchAccount(target.to_string()))?;

        if amount > account.balance {
            return Err(Error::InsufficientFunds);
        }

        account.balance -= amount;
        next.put_account(account);

        let receipt = next.next_transaction_id();
        self.store.commit(next)?;

        tracing::info!(target = %target, %amount, by = %actor, "Withdrawal");
        Ok(receipt)
    }

    fn send(&mut self, actor: &AccountId, target: &AccountId, amount: Decimal) -> Result<Uuid> {
        let sender = self.resolve(actor)?;
        if amount > sender.balance {
            return Err(Error::InsufficientFunds);
        }

        if self.store.state().get_account(target).is_none() {
            return Err(Error::NoSuchAccount(target.to_string()));
        }

        // Balance moves only on approval
        self.record_transaction(actor.clone(), target.clone(), actor.clone(), amount)
    }

    fn request(&mut self, actor: &AccountId, target: &AccountId, amount: Decimal) -> Result<Uuid> {
        if self.store.state().get_account(target).is_none() {
            return Err(Error::NoSuchAccount(target.to_string()));
        }

        self.record_transaction(target.clone(), actor.clone(), actor.clone(), amount)
    }

    fn record_transaction(
        &mut self,
        from: AccountId,
        to: AccountId,
        initiator: AccountId,
        amount: Decimal,
    ) -> Result<Uuid> {
        let mut next = self.store.state().clone();
        let id = next.next_transaction_id();
        next.put_transaction(Transaction {
            id,
            from: from.clone(),
            to: to.clone(),
            amount,
            status: TxStatus::Pending,
            initiator,
        });
        self.store.commit(next)?;

        tracing::info!(tx = %id, %from, %to, %amount, "Transaction recorded");
        Ok(id)
    }

    fn approve(&mut self, actor: &AccountId, tx_id: Uuid) -> Result<()> {
        let tx = match self.store.state().get_transaction(&tx_id) {
            Some(tx) if tx.status == TxStatus::Pending => tx.clone(),
            _ => return Err(Error::NoSuchTransaction(tx_id.to_string())),
        };

        if tx.initiator == *actor {
            return Err(Error::SelfApproval);
        }

        if tx.from != *actor && tx.to != *actor {
            return Err(Error::Unauthorized);
        }

        // Funds are re-checked now, not at creation time, so a stale
        // pending request cannot overdraw the payer.
        let payer = self.resolve(&tx.from)?;
        if payer.balance < tx.amount {
            return Err(Error::InsufficientFunds);
        }

        let mut next = self.store.state().clone();

        let mut from_account = next
            .get_account(&tx.from)
            .cloned()
            .ok_or_else(|| Error::NoSuchAccount(tx.from.to_string()))?;
        from_account.balance -= tx.amount;
        next.put_account(from_account);

        let mut to_account = next
            .get_account(&tx.to)
            .cloned()
            .ok_or_else(|| Error::NoSuchAccount(tx.to.to_string()))?;
        to_account.balance += tx.amount;
        next.put_account(to_account);

        let mut settled = tx.clone();
        settled.status = TxStatus::Approved;
        next.put_transaction(settled);

        self.store.commit(next)?;

        tracing::info!(tx = %tx_id, from = %tx.from, to = %tx.to, amount = %tx.amount, by = %actor, "Transaction approved");
        Ok(())
    }

    fn change_role(
        &mut self,
        actor: &AccountId,
        target: &AccountId,
        op: Operation,
        step: fn(&Role) -> Option<Role>,
    ) -> Result<Role> {
        self.authorize(actor, op)?;

        let mut next = self.store.state().clone();
        let mut account = next
            .get_account(target)
            .cloned()
            .ok_or_else(|| Error::NoSuchAccount(target.to_string()))?;

        // At the boundary the step fails, it does not no-op-succeed
        let new_role = step(&account.role).ok_or(Error::Unauthorized)?;
        account.role = new_role;
        next.put_account(account);
        self.store.commit(next)?;

        // Keep a live session's prompt in step with its new role
        self.sessions.update_role(target, new_role);

        tracing::info!(target = %target, role = %new_role, by = %actor, "Role changed");
        Ok(new_role)
    }

    fn balance(&self, actor: &AccountId) -> Result<Decimal> {
        Ok(self.resolve(actor)?.balance)
    }

    // Helpers

    fn resolve(&self, id: &AccountId) -> Result<Account> {
        self.store
            .state()
            .get_account(id)
            .cloned()
            .ok_or_else(|| Error::NoSuchAccount(id.to_string()))
    }

    fn authorize(&self, actor: &AccountId, op: Operation) -> Result<()> {
        let account = self.resolve(actor)?;
        if !may(account.role, op) {
            return Err(Error::Unauthorized);
        }
        Ok(())
    }
}

/// Handle for sending messages to the engine actor
#[derive(Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<EngineMessage>,
}

impl EngineHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<EngineMessage>) -> Self {
        Self { sender }
    }

    async fn call<T>(
        &self,
        msg: EngineMessage,
        rx: oneshot::Receiver<Result<T>>,
    ) -> Result<T> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| Error::Concurrency("Engine mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Authenticate `conn` as `username`
    pub async fn login(
        &self,
        conn: ConnId,
        username: AccountId,
        password: String,
    ) -> Result<Role> {
        let (tx, rx) = oneshot::channel();
        self.call(
            EngineMessage::Login {
                conn,
                username,
                password,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Release the identity bound to `conn`
    pub async fn logout(&self, conn: ConnId) -> Result<AccountId> {
        let (tx, rx) = oneshot::channel();
        self.call(EngineMessage::Logout { conn, response: tx }, rx).await
    }

    /// Create a new account with zero balance
    pub async fn enroll(
        &self,
        actor: AccountId,
        username: AccountId,
        password: String,
        role: Role,
    ) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.call(
            EngineMessage::Enroll {
                actor,
                username,
                password,
                role,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Add cash to `target`, returning a receipt id
    pub async fn deposit(
        &self,
        actor: AccountId,
        target: AccountId,
        amount: Decimal,
    ) -> Result<Uuid> {
        let (tx, rx) = oneshot::channel();
        self.call(
            EngineMessage::Deposit {
                actor,
                target,
                amount,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Remove cash from `target`, returning a receipt id
    pub async fn withdraw(
        &self,
        actor: AccountId,
        target: AccountId,
        amount: Decimal,
    ) -> Result<Uuid> {
        let (tx, rx) = oneshot::channel();
        self.call(
            EngineMessage::Withdraw {
                actor,
                target,
                amount,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Propose paying `target`, returning the pending transaction id
    pub async fn send(
        &self,
        actor: AccountId,
        target: AccountId,
        amount: Decimal,
    ) -> Result<Uuid> {
        let (tx, rx) = oneshot::channel();
        self.call(
            EngineMessage::Send {
                actor,
                target,
                amount,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Ask `target` for money, returning the pending transaction id
    pub async fn request(
        &self,
        actor: AccountId,
        target: AccountId,
        amount: Decimal,
    ) -> Result<Uuid> {
        let (tx, rx) = oneshot::channel();
        self.call(
            EngineMessage::Request {
                actor,
                target,
                amount,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Settle a pending transaction
    pub async fn approve(&self, actor: AccountId, tx_id: Uuid) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.call(
            EngineMessage::Approve {
                actor,
                tx_id,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Raise `target` one role step
    pub async fn promote(&self, actor: AccountId, target: AccountId) -> Result<Role> {
        let (tx, rx) = oneshot::channel();
        self.call(
            EngineMessage::Promote {
                actor,
                target,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Lower `target` one role step
    pub async fn demote(&self, actor: AccountId, target: AccountId) -> Result<Role> {
        let (tx, rx) = oneshot::channel();
        self.call(
            EngineMessage::Demote {
                actor,
                target,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Read the actor's balance
    pub async fn balance(&self, actor: AccountId) -> Result<Decimal> {
        let (tx, rx) = oneshot::channel();
        self.call(EngineMessage::Balance { actor, response: tx }, rx).await
    }
}

/// Ensure the bootstrap admin exists before the engine starts
pub fn bootstrap_admin(store: &mut Store, bootstrap: &BootstrapConfig) -> Result<()> {
    let admin = AccountId::new(bootstrap.admin_username.clone());
    if store.state().get_account(&admin).is_some() {
        return Ok(());
    }

    let mut next = store.state().clone();
    next.put_account(Account::new(
        admin.clone(),
        PasswordHash::digest(&bootstrap.admin_password),
        Role::Admin,
    ));
    store.commit(next)?;

    tracing::info!(user = %admin, "Bootstrap admin created");
    Ok(())
}

/// Spawn the engine actor
pub fn spawn_engine(store: Store, sessions: Arc<SessionRegistry>) -> EngineHandle {
    let (tx, rx) = mpsc::channel(1000); // Bounded channel for backpressure
    let engine = Engine::new(store, sessions, rx);

    tokio::spawn(async move {
        engine.run().await;
    });

    EngineHandle::new(tx)
}
