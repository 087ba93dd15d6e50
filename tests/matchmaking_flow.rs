//! End-to-end coverage across admission, assembly, round resolution,
//! settlement, and recovery, wired the same way `main.rs` wires the
//! production services but with in-memory stores and a fake clock.
//!
//! The assembler's post-assembly countdown and the admission layer's
//! assembly hint are both fire-and-forget `tokio::spawn` tasks; these
//! tests never wait on them and instead drive `try_assemble` and
//! `begin_first_round` directly so outcomes are deterministic.

use std::sync::Arc;

use async_trait::async_trait;

use clash_arena::audit::{self, AuditEvent, AuditWriter};
use clash_arena::clock::{Clock, FakeClock};
use clash_arena::config::AppConfig;
use clash_arena::core_types::{Choice, Id, UserId};
use clash_arena::error::EngineError;
use clash_arena::events::EventDispatcher;
use clash_arena::match_engine::model::{MatchStatus, Mode, PlayerId};
use clash_arena::match_engine::RoundEngine;
use clash_arena::matchmaking::{Admission, MatchAssembler, QueueManager};
use clash_arena::recovery::{ActiveState, Recovery};
use clash_arena::settlement::{InMemoryStatsRepo, Settlement};
use clash_arena::store::{InMemoryStore, KvStore};
use clash_arena::wallet::{InMemoryWalletRepo, WalletRepo};
use clash_arena::websocket::ConnectionManager;

struct NullWriter;

#[async_trait]
impl AuditWriter for NullWriter {
    async fn write(&self, _event: &AuditEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

struct Harness {
    store: Arc<dyn KvStore>,
    wallet: Arc<InMemoryWalletRepo>,
    queue: Arc<QueueManager>,
    admission: Arc<Admission>,
    assembler: Arc<MatchAssembler>,
    round_engine: Arc<RoundEngine>,
    recovery: Arc<Recovery>,
}

fn build_harness(house_user_id: Option<UserId>) -> Harness {
    let store: Arc<dyn KvStore> = Arc::new(InMemoryStore::new());
    let wallet = Arc::new(InMemoryWalletRepo::new());
    let stats = Arc::new(InMemoryStatsRepo::new());
    let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(0));
    let audit: Arc<dyn audit::AuditSink> = Arc::new(audit::spawn_worker(NullWriter, 64));
    let config = Arc::new(AppConfig { house_user_id, ..AppConfig::from_env() });

    let ws_manager = Arc::new(ConnectionManager::new());
    let events = Arc::new(EventDispatcher::new(ws_manager));

    let queue = Arc::new(QueueManager::new(store.clone(), clock.clone()));
    let settlement = Arc::new(Settlement::new(
        wallet.clone() as Arc<dyn WalletRepo>,
        stats,
        audit.clone(),
        clock.clone(),
        config.clone(),
    ));
    let round_engine = Arc::new(RoundEngine::new(store.clone(), audit.clone(), clock.clone(), settlement, events.clone()));

    let assembler = Arc::new(MatchAssembler::new(
        store.clone(),
        wallet.clone() as Arc<dyn WalletRepo>,
        queue.clone(),
        round_engine.clone(),
        events,
        audit,
        clock.clone(),
        config,
    ));

    let admission = Arc::new(Admission::new(
        store.clone(),
        wallet.clone() as Arc<dyn WalletRepo>,
        queue.clone(),
        assembler.clone(),
        clock,
    ));

    let recovery = Arc::new(Recovery::new(store.clone(), queue.clone(), round_engine.clone(), wallet.clone() as Arc<dyn WalletRepo>));

    Harness { store, wallet, queue, admission, assembler, round_engine, recovery }
}

/// Drain the background assembly hint that `Admission::quick_play`
/// spawns, then drive assembly ourselves until a match appears,
/// regardless of whether the hint or this call actually won the race
/// for the per-queue lock.
async fn assemble_eventually(h: &Harness, party_size: u8, stake: u64) -> Id {
    for _ in 0..50 {
        if let Some(id) = h.assembler.try_assemble(party_size, stake, false).await.unwrap() {
            return id;
        }
        tokio::task::yield_now().await;
        let keys = h.store.scan_keys("match:*").await.unwrap();
        if let Some(key) = keys.first() {
            let id_str = key.strip_prefix("match:").unwrap();
            return id_str.parse().unwrap();
        }
    }
    panic!("match never assembled for party_size={party_size} stake={stake}");
}

#[tokio::test]
async fn quickplay_to_settlement_end_to_end() {
    let h = build_harness(None);
    h.wallet.seed(1, 10_000);
    h.wallet.seed(2, 10_000);

    h.admission.quick_play(1, 2, 100, Some("alice".to_string())).await.unwrap();
    h.admission.quick_play(2, 2, 100, Some("bob".to_string())).await.unwrap();

    let match_id = assemble_eventually(&h, 2, 100).await;

    let m = h.round_engine.load(match_id).await.unwrap().unwrap();
    assert_eq!(m.mode, Mode::Real);
    assert_eq!(m.status, MatchStatus::Ready);
    assert_eq!(m.player_ids.len(), 2);

    // Bypass the assembler's 5s countdown and arm round 1 directly.
    h.round_engine.begin_first_round(match_id).await.unwrap();

    h.round_engine.submit_move(match_id, 1, Choice::Rock).await.unwrap();
    h.round_engine.submit_move(match_id, 2, Choice::Scissors).await.unwrap();

    let finished = h.round_engine.load(match_id).await.unwrap().unwrap();
    assert_eq!(finished.status, MatchStatus::Finished);
    assert_eq!(finished.winner_id, Some(PlayerId::User(1)));
    assert!(finished.settled);

    let winner_wallet = h.wallet.get(1).await.unwrap();
    let loser_wallet = h.wallet.get(2).await.unwrap();
    assert_eq!(winner_wallet.balance_avail, 10_000 - 100 + finished.payout as i64);
    assert_eq!(loser_wallet.balance_avail, 10_000 - 100);
    assert_eq!(winner_wallet.balance_frozen, 0);
    assert_eq!(loser_wallet.balance_frozen, 0);
}

#[tokio::test]
async fn quickplay_rejects_insufficient_balance() {
    let h = build_harness(None);
    h.wallet.seed(1, 50);

    let err = h.admission.quick_play(1, 2, 100, None).await.unwrap_err();
    assert_eq!(err, EngineError::InsufficientBalance);

    assert_eq!(h.queue.length(2, 100).await.unwrap(), 0);
}

#[tokio::test]
async fn quickplay_reports_already_in_queue() {
    let h = build_harness(None);
    h.wallet.seed(1, 10_000);

    let first = h.admission.quick_play(1, 2, 100, None).await.unwrap();
    let ticket_id = match first {
        clash_arena::matchmaking::QuickPlayOutcome::Queued { ticket_id } => ticket_id,
        other => panic!("expected Queued, got {other:?}"),
    };

    let second = h.admission.quick_play(1, 2, 100, None).await.unwrap();
    assert_eq!(second, clash_arena::matchmaking::QuickPlayOutcome::AlreadyInQueue { ticket_id });
}

#[tokio::test]
async fn lone_ticket_force_assembles_as_practice_without_house() {
    let h = build_harness(None);
    h.wallet.seed(1, 10_000);

    h.admission.quick_play(1, 2, 100, Some("solo".to_string())).await.unwrap();

    // Only one ticket is queued; without `force` this would stay queued.
    let match_id = h.assembler.try_assemble(2, 100, true).await.unwrap().expect("force assembles a lone ticket");

    let m = h.round_engine.load(match_id).await.unwrap().unwrap();
    assert_eq!(m.mode, Mode::Practice);
    assert!(m.has_bot_fillers());
    assert_eq!(m.stake, 0);
    assert_eq!(m.fee, 0);
    assert_eq!(m.payout, 0);

    // Practice mode never touches the wallet.
    let wallet = h.wallet.get(1).await.unwrap();
    assert_eq!(wallet.balance_avail, 10_000);
    assert_eq!(wallet.balance_frozen, 0);
}

#[tokio::test]
async fn active_state_reports_queued_ticket_then_match_then_idle() {
    let h = build_harness(None);
    h.wallet.seed(1, 10_000);
    h.wallet.seed(2, 10_000);

    match h.recovery.get_user_active_state(1).await.unwrap() {
        ActiveState::Idle { in_queue } => assert!(!in_queue),
        other => panic!("expected Idle before queueing, got {other:?}"),
    }

    h.admission.quick_play(1, 2, 100, None).await.unwrap();
    match h.recovery.get_user_active_state(1).await.unwrap() {
        ActiveState::InQueue { in_queue, total_needed, .. } => {
            assert!(in_queue);
            assert_eq!(total_needed, 2);
        }
        other => panic!("expected InQueue, got {other:?}"),
    }

    h.admission.quick_play(2, 2, 100, None).await.unwrap();
    let match_id = assemble_eventually(&h, 2, 100).await;

    match h.recovery.get_user_active_state(1).await.unwrap() {
        ActiveState::InMatch { in_queue, active_match } => {
            assert!(!in_queue);
            assert_eq!(active_match.match_id, match_id);
        }
        other => panic!("expected InMatch, got {other:?}"),
    }
}

#[tokio::test]
async fn reconcile_wallet_matches_frozen_stake_in_active_match() {
    let h = build_harness(None);
    h.wallet.seed(1, 10_000);
    h.wallet.seed(2, 10_000);

    h.admission.quick_play(1, 2, 100, None).await.unwrap();
    h.admission.quick_play(2, 2, 100, None).await.unwrap();
    assemble_eventually(&h, 2, 100).await;

    let reconciliation = h.recovery.reconcile_wallet(1).await.unwrap();
    assert_eq!(reconciliation.balance_frozen, 100);
    assert_eq!(reconciliation.expected_frozen, 100);
    assert_eq!(reconciliation.drift, 0);
}

#[tokio::test]
async fn cleanup_cancels_orphaned_match_and_refunds_stake() {
    let h = build_harness(None);
    h.wallet.seed(1, 10_000);
    h.wallet.seed(2, 10_000);

    h.admission.quick_play(1, 2, 100, None).await.unwrap();
    h.admission.quick_play(2, 2, 100, None).await.unwrap();
    assemble_eventually(&h, 2, 100).await;

    // An orphan is any non-terminal match older than the threshold;
    // a zero-second threshold makes the freshly assembled match orphaned.
    let result = h.recovery.check_and_cleanup_user_matches(1, Some(0)).await.unwrap();
    assert_eq!(result.cleaned, 1);
    assert_eq!(result.refunded, 100);

    let wallet_after = h.wallet.get(1).await.unwrap();
    assert_eq!(wallet_after.balance_avail, 10_000);
    assert_eq!(wallet_after.balance_frozen, 0);
}
