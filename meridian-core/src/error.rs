//! Error types for the ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// Everything up to `MalformedCommand` is recoverable by the caller and
/// rendered as a `FAIL:` line on the wire; the engine never terminates a
/// connection over them.
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown identity or wrong password
    #[error("Incorrect username or password")]
    Auth,

    /// Another connection already holds this identity
    #[error("User already logged in")]
    AlreadyLoggedIn,

    /// The connection has no authenticated identity
    #[error("Not logged in")]
    NotLoggedIn,

    /// Username already taken
    #[error("Username {0} already exists")]
    DuplicateAccount(String),

    /// Role token outside the known set
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    /// No account under that username
    #[error("No such account: {0}")]
    NoSuchAccount(String),

    /// Unknown transaction id, or the transaction already settled
    #[error("No such pending transaction: {0}")]
    NoSuchTransaction(String),

    /// Source balance cannot cover the amount
    #[error("Insufficient funds")]
    InsufficientFunds,

    /// Role or ownership check failed
    #[error("Unauthorized")]
    Unauthorized,

    /// The initiator may not approve their own transaction
    #[error("Cannot approve your own transaction")]
    SelfApproval,

    /// Wrong arity or argument type at the dispatcher boundary
    #[error("Malformed command: {0}")]
    MalformedCommand(String),

    /// Snapshot serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (snapshot write, socket)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Concurrency error (engine mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
