//! Meridian ledger core
//!
//! A multi-client ledger server: clients connect over a text-command
//! protocol, authenticate, and mutate a shared account ledger.
//!
//! # Architecture
//!
//! - **Single Writer**: one engine task owns the ledger; every
//!   operation is one atomic read-modify-write-persist unit
//! - **Write-Through**: the JSON snapshot hits disk before any
//!   operation reports success
//! - **Ordered Roles**: `USER < TELLER < ADMIN`, checked by a pure
//!   authorization function
//! - **Two-Phase Transfers**: send/request create pending
//!   transactions; balances move only on counterparty approval

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod credential;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod policy;
pub mod server;
pub mod session;
pub mod store;
pub mod types;

// Re-exports
pub use config::Config;
pub use dispatcher::{Command, Dispatcher};
pub use engine::{bootstrap_admin, spawn_engine, Engine, EngineHandle};
pub use error::{Error, Result};
pub use server::Server;
pub use session::SessionRegistry;
pub use store::{LedgerState, Store};
pub use types::{Account, AccountId, Role, Transaction, TxStatus};
