//! Session registry
//!
//! Binds live connections to authenticated accounts and enforces at
//! most one connection per account identity. The registry is its own
//! small shared resource, guarded independently of the ledger; its lock
//! is never held across an engine call.

use crate::{
    types::{AccountId, Role},
    Error, Result,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

/// Connection identifier (the peer socket address is stable per connection)
pub type ConnId = SocketAddr;

/// An authenticated binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Who is logged in
    pub account: AccountId,
    /// Their role, kept current across promote/demote
    pub role: Role,
}

#[derive(Default)]
struct Sessions {
    by_conn: HashMap<ConnId, Session>,
    active: HashSet<AccountId>,
}

/// Registry of authenticated connections
#[derive(Default)]
pub struct SessionRegistry {
    inner: Mutex<Sessions>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `conn` to `account`
    ///
    /// Fails with `AlreadyLoggedIn` when the account is active on some
    /// other connection. A connection re-logging-in releases its previous
    /// identity first, so a stale binding never wedges an account.
    pub fn bind(&self, conn: ConnId, account: AccountId, role: Role) -> Result<()> {
        let mut sessions = self.inner.lock();

        let held_here = sessions
            .by_conn
            .get(&conn)
            .map(|s| s.account == account)
            .unwrap_or(false);
        if sessions.active.contains(&account) && !held_here {
            return Err(Error::AlreadyLoggedIn);
        }

        if let Some(previous) = sessions.by_conn.remove(&conn) {
            sessions.active.remove(&previous.account);
        }

        sessions.active.insert(account.clone());
        sessions.by_conn.insert(conn, Session { account, role });
        Ok(())
    }

    /// Release the binding for `conn`, returning who was bound
    ///
    /// Used by both logout and disconnect; freeing the identity lets the
    /// same account reauthenticate from elsewhere.
    pub fn release(&self, conn: ConnId) -> Option<AccountId> {
        let mut sessions = self.inner.lock();
        let session = sessions.by_conn.remove(&conn)?;
        sessions.active.remove(&session.account);
        Some(session.account)
    }

    /// Current binding for `conn`, if any
    pub fn current(&self, conn: ConnId) -> Option<Session> {
        self.inner.lock().by_conn.get(&conn).cloned()
    }

    /// Refresh the role shown for a logged-in account after a role change
    pub fn update_role(&self, account: &AccountId, role: Role) {
        let mut sessions = self.inner.lock();
        for session in sessions.by_conn.values_mut() {
            if session.account == *account {
                session.role = role;
            }
        }
    }
}
