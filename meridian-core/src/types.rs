//! Core types for the ledger
//!
//! All types are designed for:
//! - Stable snapshot serialization (serde_json)
//! - Exact arithmetic (Decimal for money)
//! - A totally ordered role hierarchy for authorization

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Account identifier (the username)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Account role, totally ordered: `User < Teller < Admin`
///
/// Authorization decisions compare roles directly; there is no
/// capability inheritance beyond this order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Regular account holder
    User,
    /// Branch teller: may enroll accounts and move cash in/out
    Teller,
    /// Administrator: may change roles
    Admin,
}

impl Role {
    /// Wire name
    pub fn code(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Teller => "TELLER",
            Role::Admin => "ADMIN",
        }
    }

    /// Parse from wire name (case-sensitive, upper-case)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "USER" => Some(Role::User),
            "TELLER" => Some(Role::Teller),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Next role up the order, `None` at the top
    pub fn promoted(&self) -> Option<Role> {
        match self {
            Role::User => Some(Role::Teller),
            Role::Teller => Some(Role::Admin),
            Role::Admin => None,
        }
    }

    /// Next role down the order, `None` at the bottom
    pub fn demoted(&self) -> Option<Role> {
        match self {
            Role::Admin => Some(Role::Teller),
            Role::Teller => Some(Role::User),
            Role::User => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A ledger account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique username (immutable after creation)
    pub username: AccountId,

    /// One-way hash of the password
    pub password_hash: crate::credential::PasswordHash,

    /// Authorization role
    pub role: Role,

    /// Current balance (exact decimal)
    pub balance: Decimal,
}

impl Account {
    /// Create a new account with zero balance
    pub fn new(
        username: AccountId,
        password_hash: crate::credential::PasswordHash,
        role: Role,
    ) -> Self {
        Self {
            username,
            password_hash,
            role,
            balance: Decimal::ZERO,
        }
    }
}

/// Two-party transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxStatus {
    /// Awaiting counterparty approval
    Pending,
    /// Settled: balances moved (terminal)
    Approved,
    /// Declined by the counterparty (terminal)
    Rejected,
    /// Withdrawn by the initiator (terminal)
    Cancelled,
}

impl TxStatus {
    /// Terminal statuses never transition again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Pending)
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxStatus::Pending => "PENDING",
            TxStatus::Approved => "APPROVED",
            TxStatus::Rejected => "REJECTED",
            TxStatus::Cancelled => "CANCELLED",
        };
        write!(f, "{}", s)
    }
}

/// A two-party transfer awaiting (or past) approval
///
/// `from` always loses the amount and `to` always gains it, once
/// approved. `initiator` distinguishes a send (payer-initiated) from a
/// request (payee-initiated) and is barred from approving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction id, never reused
    pub id: Uuid,

    /// Account debited on approval
    pub from: AccountId,

    /// Account credited on approval
    pub to: AccountId,

    /// Transfer amount (positive)
    pub amount: Decimal,

    /// Lifecycle status
    pub status: TxStatus,

    /// Account that created the transaction
    pub initiator: AccountId,
}
