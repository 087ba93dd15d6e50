//! Timer service: per-match move-deadline one-shots, the queue-timeout
//! ticker, and the orphan-match sweeper.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::core_types::{Id, RoundNo};
use crate::match_engine::RoundEngine;
use crate::matchmaking::MatchAssembler;
use crate::store::KvStore;

const QUEUE_TICK_INTERVAL: Duration = Duration::from_secs(1);
const ORPHAN_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
const ORPHAN_MAX_AGE_SECS: i64 = 10 * 60;

/// A flag checked cooperatively by every recurring task: scheduled
/// callbacks exit immediately once set, in-flight handlers finish
/// normally, and new admissions are rejected elsewhere.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    flag: AtomicBool,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

pub struct TimerService {
    store: Arc<dyn KvStore>,
    round_engine: Arc<RoundEngine>,
    assembler: Arc<MatchAssembler>,
    clock: Arc<dyn Clock>,
    shutdown: Arc<ShutdownSignal>,
}

impl TimerService {
    pub fn new(
        store: Arc<dyn KvStore>,
        round_engine: Arc<RoundEngine>,
        assembler: Arc<MatchAssembler>,
        clock: Arc<dyn Clock>,
        shutdown: Arc<ShutdownSignal>,
    ) -> Self {
        Self { store, round_engine, assembler, clock, shutdown }
    }

    /// Arm a single move-deadline timer. Fires exactly once; on firing
    /// it hands `(round, deadline_ms)` back to the engine, which
    /// verifies both are still current before acting (I5).
    pub async fn arm_move_deadline(self: &Arc<Self>, match_id: Id, round: RoundNo, deadline_ms: i64) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let now = this.clock.now_ms();
            let wait_ms = (deadline_ms - now).max(0) as u64;
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;

            if this.shutdown.is_shutdown_requested() {
                return;
            }
            if let Err(e) = this.round_engine.handle_move_timeout(match_id, round, deadline_ms).await {
                tracing::warn!(%match_id, error = %e, "move timeout handling failed");
            }
        });
    }

    /// Re-reads the match's currently-persisted deadline and arms a
    /// timer for it. Used after a round resolves, so the armed timer
    /// always matches what `resolve_round` just wrote.
    pub async fn arm_current_deadline(self: &Arc<Self>, match_id: Id) {
        match self.round_engine.load(match_id).await {
            Ok(Some(m)) => {
                if let Some(deadline) = m.move_deadline_ms {
                    self.arm_move_deadline(match_id, m.round, deadline).await;
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(%match_id, error = %e, "failed to re-arm move deadline"),
        }
    }

    /// Spawns the two recurring background tasks. Per-match deadlines
    /// are armed individually via [`Self::arm_move_deadline`] and are
    /// not part of this set.
    pub fn spawn_recurring(self: &Arc<Self>) {
        self.spawn_queue_ticker();
        self.spawn_orphan_sweeper();
    }

    fn spawn_queue_ticker(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(QUEUE_TICK_INTERVAL);
            loop {
                ticker.tick().await;
                if this.shutdown.is_shutdown_requested() {
                    return;
                }
                if let Err(e) = this.assembler.tick_queues().await {
                    tracing::warn!(error = %e, "queue-timeout tick failed");
                }
            }
        });
    }

    fn spawn_orphan_sweeper(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.sweep_orphans().await;
            let mut ticker = tokio::time::interval(ORPHAN_SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                if this.shutdown.is_shutdown_requested() {
                    return;
                }
                this.sweep_orphans().await;
            }
        });
    }

    async fn sweep_orphans(&self) {
        let keys = match self.store.scan_keys("match:*").await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(error = %e, "orphan sweep: failed to scan match keys");
                return;
            }
        };

        for key in keys {
            let Some(id_str) = key.strip_prefix("match:") else { continue };
            let Ok(match_id) = id_str.parse::<Id>() else { continue };

            let Ok(Some(m)) = self.round_engine.load(match_id).await else { continue };
            if m.status.is_terminal() {
                continue;
            }
            let age_secs = (self.clock.now() - m.created_at).num_seconds();
            if age_secs >= ORPHAN_MAX_AGE_SECS {
                if let Err(e) = self.round_engine.cancel_match(match_id, "timeout").await {
                    tracing::warn!(%match_id, error = %e, "orphan sweep: cancel failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_signal_starts_clear() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_shutdown_requested());
        signal.request_shutdown();
        assert!(signal.is_shutdown_requested());
    }
}
