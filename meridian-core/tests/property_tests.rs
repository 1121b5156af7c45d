//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Zero-sum transfers: approval moves exactly the amount, nowhere else
//! - Pending transactions move nothing until approved
//! - Withdrawals can never overdraw an account
//! - Settled transactions can never settle again

use meridian_core::{
    config::BootstrapConfig,
    engine::{bootstrap_admin, spawn_engine, EngineHandle},
    AccountId, Error, Role, SessionRegistry, Store,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

const ADMIN: &str = "admin";

/// Strategy for generating valid amounts (positive decimals)
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000).prop_map(Decimal::from)
}

/// Strategy for generating usernames
fn username_strategy() -> impl Strategy<Value = String> {
    "[a-z]{4,10}"
}

/// Create a test engine over a temp snapshot, with the admin bootstrapped
async fn create_test_engine(dir: &tempfile::TempDir) -> EngineHandle {
    let mut store = Store::open(dir.path().join("ledger.json")).unwrap();
    bootstrap_admin(&mut store, &BootstrapConfig::default()).unwrap();
    spawn_engine(store, Arc::new(SessionRegistry::new()))
}

async fn enroll_funded(handle: &EngineHandle, name: &str, balance: Decimal) {
    handle
        .enroll(
            AccountId::new(ADMIN),
            AccountId::new(name),
            format!("pw-{}", name),
            Role::User,
        )
        .await
        .unwrap();
    if balance > Decimal::ZERO {
        handle
            .deposit(AccountId::new(ADMIN), AccountId::new(name), balance)
            .await
            .unwrap();
    }
}

async fn total_balance(handle: &EngineHandle, names: &[&str]) -> Decimal {
    let mut sum = Decimal::ZERO;
    for name in names {
        sum += handle.balance(AccountId::new(*name)).await.unwrap();
    }
    sum
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: send+approve conserves the sum of balances
    #[test]
    fn prop_zero_sum_transfer(
        funding in amount_strategy(),
        fraction in 1u32..100,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let handle = create_test_engine(&dir).await;

            enroll_funded(&handle, "payer", funding).await;
            enroll_funded(&handle, "payee", Decimal::ZERO).await;

            // Some amount the payer can actually cover
            let amount = (funding * Decimal::from(fraction) / Decimal::from(100))
                .max(Decimal::ONE);

            let before = total_balance(&handle, &["payer", "payee"]).await;

            let tx_id = handle
                .send(AccountId::new("payer"), AccountId::new("payee"), amount)
                .await
                .unwrap();
            handle.approve(AccountId::new("payee"), tx_id).await.unwrap();

            let after = total_balance(&handle, &["payer", "payee"]).await;
            prop_assert_eq!(before, after);

            let payee = handle.balance(AccountId::new("payee")).await.unwrap();
            prop_assert_eq!(payee, amount);
            Ok(())
        })?;
    }

    /// Property: a pending send moves nothing
    #[test]
    fn prop_send_alone_moves_nothing(funding in amount_strategy()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let handle = create_test_engine(&dir).await;

            enroll_funded(&handle, "payer", funding).await;
            enroll_funded(&handle, "payee", Decimal::ZERO).await;

            handle
                .send(AccountId::new("payer"), AccountId::new("payee"), funding)
                .await
                .unwrap();

            let payer = handle.balance(AccountId::new("payer")).await.unwrap();
            let payee = handle.balance(AccountId::new("payee")).await.unwrap();
            prop_assert_eq!(payer, funding);
            prop_assert_eq!(payee, Decimal::ZERO);
            Ok(())
        })?;
    }

    /// Property: withdraw never drives a balance negative
    #[test]
    fn prop_withdraw_never_overdraws(
        funding in 0i64..1000,
        withdrawal in 1i64..2000,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let handle = create_test_engine(&dir).await;

            let funding = Decimal::from(funding);
            let withdrawal = Decimal::from(withdrawal);
            enroll_funded(&handle, "holder", funding).await;

            let result = handle
                .withdraw(AccountId::new(ADMIN), AccountId::new("holder"), withdrawal)
                .await;

            let balance = handle.balance(AccountId::new("holder")).await.unwrap();
            if withdrawal > funding {
                prop_assert!(matches!(result, Err(Error::InsufficientFunds)));
                prop_assert_eq!(balance, funding);
            } else {
                prop_assert!(result.is_ok());
                prop_assert_eq!(balance, funding - withdrawal);
            }
            prop_assert!(balance >= Decimal::ZERO);
            Ok(())
        })?;
    }

    /// Property: the second approval of any transaction always fails
    #[test]
    fn prop_double_approval_fails(amount in amount_strategy()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let handle = create_test_engine(&dir).await;

            enroll_funded(&handle, "payer", amount).await;
            enroll_funded(&handle, "payee", Decimal::ZERO).await;

            let tx_id = handle
                .send(AccountId::new("payer"), AccountId::new("payee"), amount)
                .await
                .unwrap();
            handle.approve(AccountId::new("payee"), tx_id).await.unwrap();

            let second = handle.approve(AccountId::new("payee"), tx_id).await;
            prop_assert!(matches!(second, Err(Error::NoSuchTransaction(_))));

            // Balances unchanged by the failed retry
            let payee = handle.balance(AccountId::new("payee")).await.unwrap();
            prop_assert_eq!(payee, amount);
            Ok(())
        })?;
    }

    /// Property: the initiator can never approve, funded or not
    #[test]
    fn prop_self_approval_rejected(
        name in username_strategy(),
        amount in amount_strategy(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let handle = create_test_engine(&dir).await;

            prop_assume!(name != ADMIN);
            enroll_funded(&handle, &name, amount).await;

            let tx_id = handle
                .request(AccountId::new(name.as_str()), AccountId::new(ADMIN), amount)
                .await
                .unwrap();

            let result = handle
                .approve(AccountId::new(name.as_str()), tx_id)
                .await;
            prop_assert!(matches!(result, Err(Error::SelfApproval)));
            Ok(())
        })?;
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use meridian_core::Dispatcher;
    use std::net::SocketAddr;

    fn conn(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    #[tokio::test]
    async fn test_full_branch_day() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path().join("ledger.json")).unwrap();
        bootstrap_admin(&mut store, &BootstrapConfig::default()).unwrap();

        let sessions = Arc::new(SessionRegistry::new());
        let engine = spawn_engine(store, sessions.clone());
        let dispatcher = Dispatcher::new(engine, sessions);

        let admin = conn(1);
        let teller = conn(2);
        let alice = conn(3);
        let bob = conn(4);

        // Admin sets up the branch
        assert_eq!(
            dispatcher.dispatch(admin, "login admin Spookytus").await,
            "SUCCESS: admin logged in as ADMIN"
        );
        assert_eq!(
            dispatcher.dispatch(admin, "enroll tina pw0 TELLER").await,
            "SUCCESS: tina created as TELLER"
        );
        assert_eq!(
            dispatcher.dispatch(admin, "enroll alice pw1 USER").await,
            "SUCCESS: alice created as USER"
        );
        assert_eq!(
            dispatcher.dispatch(admin, "enroll bob pw2 USER").await,
            "SUCCESS: bob created as USER"
        );

        // Teller funds alice
        dispatcher.dispatch(teller, "login tina pw0").await;
        assert_eq!(
            dispatcher.dispatch(teller, "deposit alice 100").await,
            "SUCCESS: Deposited $100 to alice"
        );

        // Alice cannot use the cash drawer
        dispatcher.dispatch(alice, "login alice pw1").await;
        assert_eq!(
            dispatcher.dispatch(alice, "deposit alice 100").await,
            "FAIL: Unauthorized"
        );

        // Two-phase transfer
        let reply = dispatcher.dispatch(alice, "send bob 40").await;
        let tx_id = reply
            .strip_prefix("SUCCESS: Created send transaction with TXID ")
            .expect("send should succeed")
            .to_string();

        dispatcher.dispatch(bob, "login bob pw2").await;
        assert_eq!(
            dispatcher.dispatch(bob, &format!("approve {}", tx_id)).await,
            format!("SUCCESS: Transaction {} approved", tx_id)
        );
        assert_eq!(
            dispatcher.dispatch(alice, "balance").await,
            "SUCCESS: alice's balance is $60"
        );
        assert_eq!(
            dispatcher.dispatch(bob, "balance").await,
            "SUCCESS: bob's balance is $40"
        );
        assert!(dispatcher
            .dispatch(bob, &format!("approve {}", tx_id))
            .await
            .starts_with("FAIL: No such pending transaction"));

        // A request against an empty account stays pending until funded
        let reply = dispatcher.dispatch(bob, "request alice 200").await;
        let rq_id = reply
            .strip_prefix("SUCCESS: Created request transaction with TXID ")
            .expect("request should succeed")
            .to_string();
        assert_eq!(
            dispatcher.dispatch(alice, &format!("approve {}", rq_id)).await,
            "FAIL: Insufficient funds"
        );
        dispatcher.dispatch(teller, "deposit alice 200").await;
        assert_eq!(
            dispatcher.dispatch(alice, &format!("approve {}", rq_id)).await,
            format!("SUCCESS: Transaction {} approved", rq_id)
        );

        // Role management stays admin-only and fails at the boundary
        assert_eq!(
            dispatcher.dispatch(teller, "promote alice").await,
            "FAIL: Unauthorized"
        );
        assert_eq!(
            dispatcher.dispatch(admin, "promote alice").await,
            "SUCCESS: alice promoted to TELLER"
        );
        assert_eq!(
            dispatcher.dispatch(admin, "promote alice").await,
            "SUCCESS: alice promoted to ADMIN"
        );
        assert_eq!(
            dispatcher.dispatch(admin, "promote alice").await,
            "FAIL: Unauthorized"
        );
        assert_eq!(
            dispatcher.dispatch(admin, "demote alice").await,
            "SUCCESS: alice demoted to TELLER"
        );

        // Sessions
        assert_eq!(
            dispatcher.dispatch(bob, "logout").await,
            "SUCCESS: bob logged out"
        );
        assert_eq!(
            dispatcher.dispatch(bob, "balance").await,
            "FAIL: Not logged in"
        );
    }

    #[tokio::test]
    async fn test_pending_transactions_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let tx_id;
        {
            let mut store = Store::open(&path).unwrap();
            bootstrap_admin(&mut store, &BootstrapConfig::default()).unwrap();
            let handle = spawn_engine(store, Arc::new(SessionRegistry::new()));

            enroll_funded(&handle, "payer", Decimal::from(50)).await;
            enroll_funded(&handle, "payee", Decimal::ZERO).await;
            tx_id = handle
                .send(
                    AccountId::new("payer"),
                    AccountId::new("payee"),
                    Decimal::from(50),
                )
                .await
                .unwrap();
        }

        // The pending transaction is still approvable after a restart
        let store = Store::open(&path).unwrap();
        let handle = spawn_engine(store, Arc::new(SessionRegistry::new()));
        handle.approve(AccountId::new("payee"), tx_id).await.unwrap();
        assert_eq!(
            handle.balance(AccountId::new("payee")).await.unwrap(),
            Decimal::from(50)
        );
    }
}
