//! Round engine: move ingestion, round resolution, timeouts, and
//! bot-only autoplay.

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::audit::{AuditEvent, AuditSink};
use crate::clock::Clock;
use crate::core_types::{Choice, Id, RoundNo, UserId};
use crate::error::EngineError;
use crate::events::EventDispatcher;
use crate::settlement::Settlement;
use crate::store::KvStore;
use crate::timers::TimerService;

use super::model::{match_key, ttl_for_status, LastRound, Match, MatchStatus, PlayerId, RoundOutcome, TieReason};

const MOVE_DEADLINE_MS: i64 = 12_000;
const BOT_AUTOPLAY_INTERVAL_MS: u64 = 1_500;
const BOT_AUTOPLAY_MAX_ITERATIONS: u32 = 50;

/// What happened after a round was resolved, so callers (`submit_move`,
/// `handle_move_timeout`, the autoplay loop) know whether to arm a
/// timer, kick off autoplay, or stop.
enum ResolveOutcome {
    Finished,
    WaitingOnRealPlayers,
    BotOnly,
}

pub struct RoundEngine {
    store: Arc<dyn KvStore>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    settlement: Arc<Settlement>,
    events: Arc<EventDispatcher>,
    timer: OnceCell<Arc<TimerService>>,
}

impl RoundEngine {
    pub fn new(
        store: Arc<dyn KvStore>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        settlement: Arc<Settlement>,
        events: Arc<EventDispatcher>,
    ) -> Self {
        Self {
            store,
            audit,
            clock,
            settlement,
            events,
            timer: OnceCell::new(),
        }
    }

    /// Bound to the timer service after both are constructed, breaking
    /// the construction-order cycle between the two.
    pub fn set_timer_service(&self, timer: Arc<TimerService>) {
        let _ = self.timer.set(timer);
    }

    pub async fn load(&self, match_id: Id) -> Result<Option<Match>, EngineError> {
        let raw = self.store.get(&match_key(match_id)).await.map_err(|e| EngineError::Internal(e.to_string()))?;
        match raw {
            Some(json) => {
                let m = serde_json::from_str(&json).map_err(|e| EngineError::Internal(e.to_string()))?;
                Ok(Some(m))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, m: &Match) -> Result<(), EngineError> {
        let ttl = ttl_for_status(m.status);
        let json = serde_json::to_string(m).map_err(|e| EngineError::Internal(e.to_string()))?;
        self.store
            .set_ex(&match_key(m.match_id), &json, ttl)
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        Ok(())
    }

    /// Called by the assembler at `t+5s` once the countdown elapses.
    /// Arms the first move-deadline timer and emits `match:start`.
    pub async fn begin_first_round(&self, match_id: Id) -> Result<(), EngineError> {
        let Some(mut m) = self.load(match_id).await? else {
            return Err(EngineError::NotFound(format!("match {match_id}")));
        };
        if m.status != MatchStatus::Ready {
            return Ok(());
        }

        let now = self.clock.now_ms();
        m.move_timer_started_ms = Some(now);
        m.move_deadline_ms = Some(now + MOVE_DEADLINE_MS);
        self.save(&m).await?;
        self.events.match_start(&m);

        if let Some(timer) = self.timer.get() {
            timer.arm_move_deadline(match_id, m.round, now + MOVE_DEADLINE_MS).await;
        }
        Ok(())
    }

    /// `cancelMatch(matchId, reason)`. No-op if already terminal; used
    /// directly by HTTP cancellation and by the orphan sweeper.
    pub async fn cancel_match(&self, match_id: Id, reason: &str) -> Result<u64, EngineError> {
        let Some(mut m) = self.load(match_id).await? else {
            return Ok(0);
        };
        if m.status.is_terminal() {
            return Ok(0);
        }
        let refunded = self.settlement.cancel(&mut m, reason).await?;
        self.save(&m).await?;
        self.events
            .match_cancelled(match_id, reason, "Match cancelled, funds returned.");
        Ok(refunded)
    }

    /// `submitMove(matchId, userId, choice)`.
    pub async fn submit_move(self: &Arc<Self>, match_id: Id, user_id: UserId, choice: Choice) -> Result<(), EngineError> {
        let Some(mut m) = self.load(match_id).await? else {
            return Err(EngineError::NotFound(format!("match {match_id}")));
        };

        if m.status.is_terminal() {
            return Err(EngineError::Precondition("AlreadyFinished".to_string()));
        }
        let player = PlayerId::User(user_id);
        if !m.player_ids.contains(&player) {
            return Err(EngineError::Precondition("NotAParticipant".to_string()));
        }
        if !m.alive_ids.contains(&player) {
            return Err(EngineError::Precondition("Eliminated".to_string()));
        }
        if m.moves.contains_key(&player) {
            return Err(EngineError::Precondition("AlreadyMoved".to_string()));
        }

        m.moves.insert(player.clone(), choice);
        m.status = MatchStatus::InProgress;
        self.audit.record(
            AuditEvent::new("MOVE_SUBMITTED")
                .with_match(match_id)
                .with_actor(user_id)
                .with_round(m.round)
                .with_payload(serde_json::json!({ "choice": choice })),
        );

        self.autofill_bot_moves(&mut m);

        if m.alive_real_players().any(|p| !m.moves.contains_key(p)) {
            self.save(&m).await?;
            self.events.match_update(&m);
            return Ok(());
        }

        let outcome = self.resolve_round(&mut m).await?;
        self.after_resolve(self, match_id, outcome);
        Ok(())
    }

    /// Fires `handleMoveTimeout` from the timer service. Verifies the
    /// `(round, deadline)` pair is still current before acting (I5).
    pub async fn handle_move_timeout(self: &Arc<Self>, match_id: Id, round: RoundNo, deadline_ms: i64) -> Result<(), EngineError> {
        let Some(mut m) = self.load(match_id).await? else {
            return Ok(());
        };
        if m.status.is_terminal() || m.round != round || m.move_deadline_ms != Some(deadline_ms) {
            return Ok(());
        }

        let missing_real: Vec<PlayerId> = m
            .alive_real_players()
            .filter(|p| !m.moves.contains_key(*p))
            .cloned()
            .collect();
        for player in &missing_real {
            let choice = Choice::random();
            m.moves.insert(player.clone(), choice);
            if let PlayerId::User(uid) = player {
                self.audit.record(
                    AuditEvent::new("MOVE_AUTO")
                        .with_match(match_id)
                        .with_actor(*uid)
                        .with_round(round)
                        .with_payload(serde_json::json!({ "reason": "TIMEOUT", "choice": choice })),
                );
            }
        }
        self.autofill_bot_moves(&mut m);

        let outcome = self.resolve_round(&mut m).await?;
        self.after_resolve(self, match_id, outcome);
        Ok(())
    }

    fn autofill_bot_moves(&self, m: &mut Match) {
        let unset_bots: Vec<PlayerId> = m
            .alive_ids
            .iter()
            .filter(|p| p.is_bot() && !m.moves.contains_key(*p))
            .cloned()
            .collect();
        for bot in unset_bots {
            m.moves.insert(bot, Choice::random());
        }
    }

    /// Resolve the current round in place, persist, and report what
    /// should happen next so the caller can arm a timer or kick off
    /// bot-only autoplay without this function recursing into itself.
    async fn resolve_round(&self, m: &mut Match) -> Result<ResolveOutcome, EngineError> {
        let round_no = m.round;
        let snapshot: std::collections::HashMap<PlayerId, Choice> = m
            .alive_ids
            .iter()
            .filter_map(|p| m.moves.get(p).map(|c| (p.clone(), *c)))
            .collect();

        let distinct: std::collections::HashSet<Choice> = snapshot.values().copied().collect();

        if distinct.len() == 1 || distinct.len() == 3 {
            let reason = if distinct.len() == 1 { TieReason::AllSame } else { TieReason::AllThree };
            m.last_round = Some(LastRound {
                outcome: RoundOutcome::Tie,
                reason: Some(reason),
                winning_move: None,
                winners: Vec::new(),
                losers: Vec::new(),
                round_no,
                moves: snapshot,
            });
        } else {
            let mut it = distinct.into_iter();
            let a = it.next().expect("exactly two distinct choices");
            let b = it.next().expect("exactly two distinct choices");
            let winning_move = if a.beats() == b { a } else { b };

            let winners: Vec<PlayerId> = m
                .alive_ids
                .iter()
                .filter(|p| snapshot.get(*p) == Some(&winning_move))
                .cloned()
                .collect();
            let losers: Vec<PlayerId> = m.alive_ids.iter().filter(|p| !winners.contains(p)).cloned().collect();

            m.eliminated_ids.extend(losers.iter().cloned());
            m.alive_ids = winners.clone();
            m.last_round = Some(LastRound {
                outcome: RoundOutcome::Elimination,
                reason: None,
                winning_move: Some(winning_move),
                winners,
                losers,
                round_no,
                moves: snapshot,
            });
        }

        self.audit.record(AuditEvent::new("ROUND_RESOLVED").with_match(m.match_id).with_round(round_no));

        if m.alive_ids.len() == 1 {
            m.status = MatchStatus::Finished;
            m.winner_id = m.alive_ids.first().cloned();
            m.finished_at = Some(self.clock.now());
            m.moves.clear();
            m.move_deadline_ms = None;
            m.move_timer_started_ms = None;

            self.settlement.settle(m).await?;
            self.audit.record(AuditEvent::new("MATCH_FINISHED").with_match(m.match_id));
            self.save(m).await?;
            self.events.match_update(m);
            return Ok(ResolveOutcome::Finished);
        }

        m.round += 1;
        m.moves.clear();
        m.move_deadline_ms = None;
        m.move_timer_started_ms = None;

        if m.alive_real_players().next().is_some() {
            let now = self.clock.now_ms();
            m.move_timer_started_ms = Some(now);
            m.move_deadline_ms = Some(now + MOVE_DEADLINE_MS);
            m.bot_match = false;
            self.save(m).await?;
            self.events.match_update(m);
            Ok(ResolveOutcome::WaitingOnRealPlayers)
        } else {
            m.bot_match = true;
            self.save(m).await?;
            self.events.match_update(m);
            Ok(ResolveOutcome::BotOnly)
        }
    }

    /// Arms the next timer or spawns bot-only autoplay based on what
    /// `resolve_round` just reported.
    fn after_resolve(&self, engine: &Arc<Self>, match_id: Id, outcome: ResolveOutcome) {
        match outcome {
            ResolveOutcome::Finished => {}
            ResolveOutcome::WaitingOnRealPlayers => {
                if let Some(timer) = self.timer.get() {
                    let timer = Arc::clone(timer);
                    tokio::spawn(async move {
                        // Re-read the freshly-saved deadline so we arm exactly what was persisted.
                        timer.arm_current_deadline(match_id).await;
                    });
                }
            }
            ResolveOutcome::BotOnly => {
                let engine = Arc::clone(engine);
                tokio::spawn(async move {
                    engine.run_bot_only_autoplay(match_id).await;
                });
            }
        }
    }

    /// Play rounds for the remaining bots every 1500ms until the match
    /// finishes or the iteration cap is hit.
    async fn run_bot_only_autoplay(self: Arc<Self>, match_id: Id) {
        for _ in 0..BOT_AUTOPLAY_MAX_ITERATIONS {
            tokio::time::sleep(std::time::Duration::from_millis(BOT_AUTOPLAY_INTERVAL_MS)).await;

            let Ok(Some(mut m)) = self.load(match_id).await else {
                return;
            };
            if m.status.is_terminal() {
                return;
            }

            self.autofill_bot_moves(&mut m);
            let Ok(outcome) = self.resolve_round(&mut m).await else {
                return;
            };
            self.events.match_round(match_id, m.round, m.alive_ids.len());

            match outcome {
                ResolveOutcome::Finished => return,
                ResolveOutcome::WaitingOnRealPlayers => return,
                ResolveOutcome::BotOnly => continue,
            }
        }
        tracing::warn!(%match_id, "bot-only autoplay hit its iteration cap without finishing");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::spawn_worker;
    use crate::clock::FakeClock;
    use crate::config::AppConfig;
    use crate::core_types::Id;
    use crate::fee::compute;
    use crate::match_engine::model::Mode;
    use crate::settlement::{InMemoryStatsRepo, Settlement};
    use crate::store::InMemoryStore;
    use crate::wallet::InMemoryWalletRepo;
    use crate::websocket::connection::ConnectionManager;
    use std::collections::HashMap;

    struct NullWriter;
    #[async_trait::async_trait]
    impl crate::audit::AuditWriter for NullWriter {
        async fn write(&self, _event: &AuditEvent) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn build_engine() -> (Arc<RoundEngine>, Arc<dyn KvStore>) {
        let store: Arc<dyn KvStore> = Arc::new(InMemoryStore::new());
        let audit = Arc::new(spawn_worker(NullWriter, 16));
        let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(0));
        let wallet = Arc::new(InMemoryWalletRepo::new());
        let stats = Arc::new(InMemoryStatsRepo::new());
        let config = Arc::new(AppConfig { house_user_id: None, ..AppConfig::from_env() });
        let settlement = Arc::new(Settlement::new(wallet, stats, audit.clone(), clock.clone(), config));
        let events = Arc::new(EventDispatcher::new(Arc::new(ConnectionManager::new())));

        let engine = Arc::new(RoundEngine::new(store.clone(), audit, clock, settlement, events));
        (engine, store)
    }

    fn seed_two_player_match(match_id: Id) -> Match {
        let sched = compute(100, 2);
        let players = vec![PlayerId::User(1), PlayerId::User(2)];
        let mut m = Match::new(
            match_id,
            2,
            100,
            sched,
            players,
            HashMap::new(),
            HashMap::new(),
            Mode::Real,
            chrono::DateTime::from_timestamp(0, 0).unwrap(),
        );
        m.status = MatchStatus::InProgress;
        m
    }

    #[tokio::test]
    async fn submit_move_rejects_non_participant() {
        let (engine, store) = build_engine();
        let match_id = Id::new();
        let m = seed_two_player_match(match_id);
        store
            .set_ex(&match_key(match_id), &serde_json::to_string(&m).unwrap(), 600)
            .await
            .unwrap();

        let err = engine.submit_move(match_id, 999, Choice::Rock).await.unwrap_err();
        assert_eq!(err, EngineError::Precondition("NotAParticipant".to_string()));
    }

    #[tokio::test]
    async fn submit_move_twice_is_conflict() {
        let (engine, store) = build_engine();
        let match_id = Id::new();
        let m = seed_two_player_match(match_id);
        store
            .set_ex(&match_key(match_id), &serde_json::to_string(&m).unwrap(), 600)
            .await
            .unwrap();

        engine.submit_move(match_id, 1, Choice::Rock).await.unwrap();
        let err = engine.submit_move(match_id, 1, Choice::Paper).await.unwrap_err();
        assert_eq!(err, EngineError::Precondition("AlreadyMoved".to_string()));
    }

    #[tokio::test]
    async fn elimination_round_finishes_match() {
        let (engine, store) = build_engine();
        let match_id = Id::new();
        let m = seed_two_player_match(match_id);
        store
            .set_ex(&match_key(match_id), &serde_json::to_string(&m).unwrap(), 600)
            .await
            .unwrap();

        engine.submit_move(match_id, 1, Choice::Rock).await.unwrap();
        engine.submit_move(match_id, 2, Choice::Scissors).await.unwrap();

        let updated = engine.load(match_id).await.unwrap().unwrap();
        assert_eq!(updated.status, MatchStatus::Finished);
        assert_eq!(updated.winner_id, Some(PlayerId::User(1)));
        assert!(updated.settled);
    }

    #[tokio::test]
    async fn tie_round_advances_without_eliminating() {
        let (engine, store) = build_engine();
        let match_id = Id::new();
        let m = seed_two_player_match(match_id);
        store
            .set_ex(&match_key(match_id), &serde_json::to_string(&m).unwrap(), 600)
            .await
            .unwrap();

        engine.submit_move(match_id, 1, Choice::Rock).await.unwrap();
        engine.submit_move(match_id, 2, Choice::Rock).await.unwrap();

        let updated = engine.load(match_id).await.unwrap().unwrap();
        assert_eq!(updated.round, 2);
        assert_eq!(updated.alive_ids.len(), 2);
        assert!(updated.moves.is_empty());
        assert_eq!(
            updated.last_round.as_ref().map(|lr| lr.outcome),
            Some(RoundOutcome::Tie)
        );
    }
}
