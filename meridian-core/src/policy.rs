//! Authorization policy
//!
//! A pure decision function over (role, operation). No hidden state:
//! the same inputs always give the same answer.

use crate::types::Role;

/// Engine entry points subject to authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Authenticate a connection
    Login,
    /// Release the connection's identity
    Logout,
    /// Create a new account
    Enroll,
    /// Add cash to an account
    Deposit,
    /// Remove cash from an account
    Withdraw,
    /// Propose a payer-initiated transfer
    Send,
    /// Propose a payee-initiated transfer
    Request,
    /// Settle a pending transfer
    Approve,
    /// Read own balance
    Balance,
    /// Raise an account one role step
    Promote,
    /// Lower an account one role step
    Demote,
}

/// May an actor with `role` perform `op`?
pub fn may(role: Role, op: Operation) -> bool {
    match op {
        Operation::Enroll | Operation::Deposit | Operation::Withdraw => role >= Role::Teller,
        Operation::Promote | Operation::Demote => role == Role::Admin,
        Operation::Login
        | Operation::Logout
        | Operation::Send
        | Operation::Request
        | Operation::Approve
        | Operation::Balance => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teller_gate() {
        for op in [Operation::Enroll, Operation::Deposit, Operation::Withdraw] {
            assert!(!may(Role::User, op));
            assert!(may(Role::Teller, op));
            assert!(may(Role::Admin, op));
        }
    }

    #[test]
    fn test_admin_gate() {
        for op in [Operation::Promote, Operation::Demote] {
            assert!(!may(Role::User, op));
            assert!(!may(Role::Teller, op));
            assert!(may(Role::Admin, op));
        }
    }

    #[test]
    fn test_open_to_any_authenticated_actor() {
        for op in [
            Operation::Login,
            Operation::Logout,
            Operation::Send,
            Operation::Request,
            Operation::Approve,
            Operation::Balance,
        ] {
            assert!(may(Role::User, op));
            assert!(may(Role::Teller, op));
            assert!(may(Role::Admin, op));
        }
    }
}
