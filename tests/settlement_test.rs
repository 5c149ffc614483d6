//! End-to-end settlement behavior through the public services

use futures::future::join_all;
use rgs_core::config::ConfigBuilder;
use rgs_core::errors::{StorageError, StorageResult};
use rgs_core::games::{Grid, OutcomeEngine, Paytable, CLASSIC_GAME_ID};
use rgs_core::ledger::{
    MemoryStore, PlayerRecord, RoundRecord, SessionRecord, StoreBackend, Wallet, WriteSet,
};
use rgs_core::{Amount, DeclineReason, RgsError, RgsFactory, RgsServices, SpinRequest, TransactionFault};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn services_with_balance(balance: f64) -> RgsServices {
    let config = ConfigBuilder::new()
        .starting_balance(balance)
        .lock_timeout_ms(2_000)
        .build()
        .expect("valid config");
    RgsFactory::build(&config).expect("services")
}

fn spin(session_id: &str, player_id: &str, wager: Amount) -> SpinRequest {
    SpinRequest {
        session_id: session_id.to_string(),
        player_id: player_id.to_string(),
        game_id: CLASSIC_GAME_ID.to_string(),
        wager,
        currency: "USD".to_string(),
    }
}

#[tokio::test]
async fn test_balance_identity_over_many_spins() {
    let services = services_with_balance(1000.0);
    let start = services
        .sessions
        .start_session("casino", "alice", "USD")
        .await
        .unwrap();
    let (session, player) = (start.session.session_id, start.session.player_id);

    let wager = Amount::from_major_units(2);
    let mut balance = Amount::from_major_units(1000);
    for _ in 0..100 {
        let result = services
            .orchestrator
            .spin(spin(&session, &player, wager))
            .await
            .unwrap();

        let summed = Amount::checked_sum(result.contributions.iter().map(|c| c.amount)).unwrap();
        assert_eq!(result.payout, summed);

        let expected = balance.checked_sub(wager).unwrap().checked_add(result.payout).unwrap();
        assert_eq!(result.balance, expected);
        balance = expected;
    }

    assert_eq!(services.ledger.wallet(&player).unwrap().balance, balance);
    assert_eq!(services.metrics.snapshot().spins_total, 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_spins_lose_no_updates() {
    let services = services_with_balance(1000.0);
    let start = services
        .sessions
        .start_session("casino", "alice", "USD")
        .await
        .unwrap();
    let session = start.session.session_id;
    let player = start.session.player_id;

    let handles = (0..64).map(|_| {
        let orchestrator = services.orchestrator.clone();
        let request = spin(&session, &player, Amount::from_major_units(1));
        tokio::spawn(async move { orchestrator.spin(request).await })
    });

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked").expect("spin settles"))
        .collect();

    let paid: u64 = results.iter().map(|r| r.payout.units()).sum();
    let expected = Amount::from_major_units(1000 - 64).units() + paid;
    assert_eq!(services.ledger.wallet(&player).unwrap().balance.units(), expected);

    // Every round was persisted exactly once
    for result in &results {
        assert!(services.orchestrator.load_round(&result.round_id).unwrap().is_some());
    }
}

#[tokio::test]
async fn test_insufficient_balance_leaves_wallet_untouched() {
    let services = services_with_balance(5.0);
    let start = services
        .sessions
        .start_session("casino", "alice", "USD")
        .await
        .unwrap();

    let err = services
        .orchestrator
        .spin(spin(
            &start.session.session_id,
            &start.session.player_id,
            Amount::from_major_units(10),
        ))
        .await
        .unwrap_err();

    assert_eq!(err.decline_reason().map(|r| r.code()), Some("INSUFFICIENT_BALANCE"));
    assert_eq!(
        services.ledger.wallet(&start.session.player_id).unwrap().balance,
        Amount::from_major_units(5)
    );
}

#[tokio::test]
async fn test_foreign_session_is_declined() {
    let services = services_with_balance(1000.0);
    let alice = services.sessions.start_session("casino", "alice", "USD").await.unwrap();
    let bob = services.sessions.start_session("casino", "bob", "USD").await.unwrap();

    let err = services
        .orchestrator
        .spin(spin(
            &alice.session.session_id,
            &bob.session.player_id,
            Amount::from_major_units(1),
        ))
        .await
        .unwrap_err();

    assert_eq!(err.decline_reason(), Some(&DeclineReason::SessionPlayerMismatch));
    assert_eq!(
        services.ledger.wallet(&bob.session.player_id).unwrap().balance,
        Amount::from_major_units(1000)
    );
    assert_eq!(services.metrics.snapshot().spins_total, 0);
}

#[tokio::test]
async fn test_lock_timeout_surfaces_as_retryable_fault() {
    let config = ConfigBuilder::new().lock_timeout_ms(20).build().unwrap();
    let services = RgsFactory::build(&config).unwrap();
    let start = services.sessions.start_session("casino", "alice", "USD").await.unwrap();
    let player = start.session.player_id.clone();

    let held = services.ledger.begin(&player).await.unwrap();
    let err = services
        .orchestrator
        .spin(spin(&start.session.session_id, &player, Amount::from_major_units(1)))
        .await
        .unwrap_err();
    drop(held);

    assert!(matches!(err, RgsError::Transaction(TransactionFault::LockTimeout { .. })));
    assert!(err.is_retryable());
    assert_eq!(
        services.ledger.wallet(&player).unwrap().balance,
        Amount::from_major_units(1000)
    );

    // Once the holder is gone the same request goes through
    assert!(services
        .orchestrator
        .spin(spin(&start.session.session_id, &player, Amount::from_major_units(1)))
        .await
        .is_ok());
}

/// Memory store whose commits can be switched off
struct FlakyStore {
    inner: MemoryStore,
    fail_commits: AtomicBool,
}

impl StoreBackend for FlakyStore {
    fn load_wallet(&self, player_id: &str) -> StorageResult<Option<Wallet>> {
        self.inner.load_wallet(player_id)
    }

    fn load_player(&self, player_id: &str) -> StorageResult<Option<PlayerRecord>> {
        self.inner.load_player(player_id)
    }

    fn load_session(&self, session_id: &str) -> StorageResult<Option<SessionRecord>> {
        self.inner.load_session(session_id)
    }

    fn load_round(&self, round_id: &str) -> StorageResult<Option<RoundRecord>> {
        self.inner.load_round(round_id)
    }

    fn load_metadata(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.load_metadata(key)
    }

    fn commit(&self, writes: WriteSet) -> StorageResult<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected commit failure".to_string()));
        }
        self.inner.commit(writes)
    }

    fn ping(&self) -> StorageResult<()> {
        self.inner.ping()
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

#[tokio::test]
async fn test_failed_commit_rolls_back_debit() {
    let store = Arc::new(FlakyStore {
        inner: MemoryStore::new(),
        fail_commits: AtomicBool::new(false),
    });
    let config = ConfigBuilder::new().build().unwrap();
    let services = RgsFactory::build_with_store(&config, store.clone()).unwrap();

    let start = services.sessions.start_session("casino", "alice", "USD").await.unwrap();
    let player = start.session.player_id.clone();

    store.fail_commits.store(true, Ordering::SeqCst);
    let err = services
        .orchestrator
        .spin(spin(&start.session.session_id, &player, Amount::from_major_units(10)))
        .await
        .unwrap_err();
    store.fail_commits.store(false, Ordering::SeqCst);

    assert!(!err.is_declined());
    assert!(err.is_retryable());
    assert_eq!(
        services.ledger.wallet(&player).unwrap().balance,
        Amount::from_major_units(1000)
    );
    assert_eq!(store.inner.round_count(), 0);
    assert_eq!(services.metrics.snapshot().faults_total, 1);
}

#[tokio::test]
async fn test_session_start_is_idempotent_under_concurrency() {
    let services = services_with_balance(1000.0);

    let starts = join_all((0..16).map(|_| services.sessions.start_session("casino", "carol", "USD"))).await;
    let starts: Vec<_> = starts.into_iter().map(|s| s.unwrap()).collect();

    assert_eq!(starts.iter().filter(|s| s.new_player).count(), 1);
    let player = &starts[0].session.player_id;
    assert!(starts.iter().all(|s| &s.session.player_id == player));
    assert_eq!(
        services.ledger.wallet(player).unwrap().balance,
        Amount::from_major_units(1000)
    );
}

#[test]
fn test_three_aces_scenario() {
    let engine = OutcomeEngine::new(Arc::new(Paytable::classic())).unwrap();
    let outcome = engine.evaluate(
        Amount::from_major_units(10),
        Grid::from_names([
            ["9", "10", "9", "10", "9"],
            ["A", "A", "A", "K", "Q"],
            ["J", "Q", "J", "Q", "J"],
        ]),
    )
    .unwrap();

    assert_eq!(outcome.payout, Amount::from_major_units(10));
    assert_eq!(outcome.contributions.len(), 1);
}
