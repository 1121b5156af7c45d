//! Command dispatcher
//!
//! Parses one whitespace-tokenized command line, resolves the
//! connection's authenticated actor, routes to the engine, and renders
//! the `SUCCESS:`/`FAIL:` result line plus the prompt. Verbs are
//! case-insensitive; arity and argument types are checked here, before
//! anything reaches the engine.

use crate::{
    engine::EngineHandle,
    session::{ConnId, SessionRegistry},
    types::{AccountId, Role},
    Error, Result,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `login <user> <pass>`
    Login { username: AccountId, password: String },
    /// `logout`
    Logout,
    /// `enroll <user> <pass> <ROLE>`
    Enroll {
        username: AccountId,
        password: String,
        role: Role,
    },
    /// `deposit <user> <amount>`
    Deposit { target: AccountId, amount: Decimal },
    /// `withdraw <user> <amount>`
    Withdraw { target: AccountId, amount: Decimal },
    /// `send <user> <amount>`
    Send { target: AccountId, amount: Decimal },
    /// `request <user> <amount>`
    Request { target: AccountId, amount: Decimal },
    /// `approve <txid>`
    Approve { tx_id: Uuid },
    /// `balance`
    Balance,
    /// `promote <user>`
    Promote { target: AccountId },
    /// `demote <user>`
    Demote { target: AccountId },
}

impl Command {
    /// Parse a raw command line
    pub fn parse(line: &str) -> Result<Command> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let verb = tokens
            .first()
            .ok_or_else(|| Error::MalformedCommand("empty command".to_string()))?
            .to_ascii_lowercase();

        match (verb.as_str(), &tokens[1..]) {
            ("login", [user, pass]) => Ok(Command::Login {
                username: AccountId::new(*user),
                password: (*pass).to_string(),
            }),
            ("logout", []) => Ok(Command::Logout),
            ("enroll", [user, pass, role]) => Ok(Command::Enroll {
                username: AccountId::new(*user),
                password: (*pass).to_string(),
                role: Role::parse(&role.to_ascii_uppercase())
                    .ok_or_else(|| Error::InvalidRole((*role).to_string()))?,
            }),
            ("deposit", [user, amount]) => Ok(Command::Deposit {
                target: AccountId::new(*user),
                amount: parse_amount(amount)?,
            }),
            ("withdraw", [user, amount]) => Ok(Command::Withdraw {
                target: AccountId::new(*user),
                amount: parse_amount(amount)?,
            }),
            ("send", [user, amount]) => Ok(Command::Send {
                target: AccountId::new(*user),
                amount: parse_amount(amount)?,
            }),
            ("request", [user, amount]) => Ok(Command::Request {
                target: AccountId::new(*user),
                amount: parse_amount(amount)?,
            }),
            ("approve", [tx_id]) => Ok(Command::Approve {
                tx_id: Uuid::parse_str(tx_id).map_err(|_| {
                    Error::MalformedCommand(format!("invalid transaction id '{}'", tx_id))
                })?,
            }),
            ("balance", []) => Ok(Command::Balance),
            ("promote", [user]) => Ok(Command::Promote {
                target: AccountId::new(*user),
            }),
            ("demote", [user]) => Ok(Command::Demote {
                target: AccountId::new(*user),
            }),
            ("login" | "logout" | "enroll" | "deposit" | "withdraw" | "send" | "request"
            | "approve" | "balance" | "promote" | "demote", _) => Err(Error::MalformedCommand(
                format!("wrong number of arguments for '{}'", verb),
            )),
            _ => Err(Error::MalformedCommand(format!("unknown verb '{}'", verb))),
        }
    }
}

fn parse_amount(token: &str) -> Result<Decimal> {
    let amount: Decimal = token
        .parse()
        .map_err(|_| Error::MalformedCommand(format!("invalid amount '{}'", token)))?;
    if amount <= Decimal::ZERO {
        return Err(Error::MalformedCommand("amount must be positive".to_string()));
    }
    Ok(amount)
}

/// Routes parsed commands to the engine and renders wire responses
pub struct Dispatcher {
    engine: EngineHandle,
    sessions: Arc<SessionRegistry>,
}

impl Dispatcher {
    /// Create new dispatcher
    pub fn new(engine: EngineHandle, sessions: Arc<SessionRegistry>) -> Self {
        Self { engine, sessions }
    }

    /// Handle one command line, producing the result line
    pub async fn dispatch(&self, conn: ConnId, line: &str) -> String {
        match self.execute(conn, line).await {
            Ok(message) => format!("SUCCESS: {}", message),
            Err(e) => format!("FAIL: {}", e),
        }
    }

    /// Prompt reflecting the connection's current identity
    pub fn prompt(&self, conn: ConnId) -> String {
        match self.sessions.current(conn) {
            Some(session) => format!("Meridian({}:{})> ", session.account, session.role),
            None => "Meridian> ".to_string(),
        }
    }

    async fn execute(&self, conn: ConnId, line: &str) -> Result<String> {
        let command = Command::parse(line)?;

        // login is the one verb open to unauthenticated connections
        if let Command::Login { username, password } = &command {
            let role = self
                .engine
                .login(conn, username.clone(), password.clone())
                .await?;
            return Ok(format!("{} logged in as {}", username, role));
        }

        let actor = self
            .sessions
            .current(conn)
            .map(|session| session.account)
            .ok_or(Error::NotLoggedIn)?;

        match command {
            Command::Login { .. } => unreachable!("handled above"),

            Command::Logout => {
                let account = self.engine.logout(conn).await?;
                Ok(format!("{} logged out", account))
            }

            Command::Enroll {
                username,
                password,
                role,
            } => {
                self.engine
                    .enroll(actor, username.clone(), password, role)
                    .await?;
                Ok(format!("{} created as {}", username, role))
            }

            Command::Deposit { target, amount } => {
                self.engine
                    .deposit(actor, target.clone(), amount)
                    .await?;
                Ok(format!("Deposited ${} to {}", amount, target))
            }

            Command::Withdraw { target, amount } => {
                self.engine
                    .withdraw(actor, target.clone(), amount)
                    .await?;
                Ok(format!("Withdrawn ${} from {}", amount, target))
            }

            Command::Send { target, amount } => {
                let tx_id = self.engine.send(actor, target, amount).await?;
                Ok(format!("Created send transaction with TXID {}", tx_id))
            }

            Command::Request { target, amount } => {
                let tx_id = self.engine.request(actor, target, amount).await?;
                Ok(format!("Created request transaction with TXID {}", tx_id))
            }

            Command::Approve { tx_id } => {
                self.engine.approve(actor, tx_id).await?;
                Ok(format!("Transaction {} approved", tx_id))
            }

            Command::Balance => {
                let balance = self.engine.balance(actor.clone()).await?;
                Ok(format!("{}'s balance is ${}", actor, balance))
            }

            Command::Promote { target } => {
                let role = self.engine.promote(actor, target.clone()).await?;
                Ok(format!("{} promoted to {}", target, role))
            }

            Command::Demote { target } => {
                let role = self.engine.demote(actor, target.clone()).await?;
                Ok(format!("{} demoted to {}", target, role))
            }
        }
    }
}
