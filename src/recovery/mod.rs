//! Recovery / active state: lets a reconnecting client learn what it
//! was doing, and cleans up matches the reconnect reveals as orphaned.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::core_types::{UserId, PARTY_SIZES, STAKES};
use crate::error::EngineError;
use crate::match_engine::model::{Match, Mode, PlayerId};
use crate::match_engine::RoundEngine;
use crate::matchmaking::ticket::{ticket_key, Ticket};
use crate::matchmaking::QueueManager;
use crate::store::KvStore;
use crate::wallet::WalletRepo;

const FORCE_ASSEMBLE_AGE_SECS: i64 = 20;
const ORPHAN_MAX_AGE_SECS: i64 = 10 * 60;

/// `getUserActiveState(userId)` result.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ActiveState {
    InQueue {
        in_queue: bool,
        queue_time: i64,
        players_found: usize,
        total_needed: u8,
        seconds_left: i64,
    },
    InMatch {
        in_queue: bool,
        active_match: Box<Match>,
    },
    Idle {
        in_queue: bool,
    },
}

pub struct Recovery {
    store: Arc<dyn KvStore>,
    queue: Arc<QueueManager>,
    round_engine: Arc<RoundEngine>,
    wallet: Arc<dyn WalletRepo>,
}

impl Recovery {
    pub fn new(
        store: Arc<dyn KvStore>,
        queue: Arc<QueueManager>,
        round_engine: Arc<RoundEngine>,
        wallet: Arc<dyn WalletRepo>,
    ) -> Self {
        Self { store, queue, round_engine, wallet }
    }

    /// Scans every queue, then every non-terminal match, for `user_id`.
    /// A match whose status is `FINISHED` or `CANCELLED` is ignored
    /// even if it still appears in the store.
    pub async fn get_user_active_state(&self, user_id: UserId) -> Result<ActiveState, EngineError> {
        for party_size in PARTY_SIZES {
            for stake in STAKES {
                for id in self.queue.peek_all(party_size, stake).await? {
                    let Ok(ticket_id) = id.parse() else { continue };
                    let Some(raw) = self.store.get(&ticket_key(ticket_id)).await.map_err(to_internal)? else {
                        continue;
                    };
                    let ticket: Ticket = serde_json::from_str(&raw).map_err(to_internal)?;
                    if ticket.user_id != user_id {
                        continue;
                    }

                    let queue_time = self.queue.age_seconds(party_size, stake).await?;
                    let players_found = self.queue.length(party_size, stake).await?;
                    let seconds_left = (FORCE_ASSEMBLE_AGE_SECS - queue_time).max(0);
                    return Ok(ActiveState::InQueue {
                        in_queue: true,
                        queue_time,
                        players_found,
                        total_needed: party_size,
                        seconds_left,
                    });
                }
            }
        }

        let match_keys = self.store.scan_keys("match:*").await.map_err(to_internal)?;
        for key in match_keys {
            let Some(raw) = self.store.get(&key).await.map_err(to_internal)? else { continue };
            let Ok(m) = serde_json::from_str::<Match>(&raw) else { continue };
            if m.status.is_terminal() {
                continue;
            }
            if m.player_ids.contains(&PlayerId::User(user_id)) {
                return Ok(ActiveState::InMatch { in_queue: false, active_match: Box::new(m) });
            }
        }

        Ok(ActiveState::Idle { in_queue: false })
    }

    /// `checkAndCleanupUserMatches(userId)`: cancels the user's orphan
    /// matches older than `max_age_secs` (default 10 min) and reports
    /// how many were cancelled and how much was refunded in total.
    pub async fn check_and_cleanup_user_matches(
        &self,
        user_id: UserId,
        max_age_secs: Option<i64>,
    ) -> Result<CleanupResult, EngineError> {
        let threshold = max_age_secs.unwrap_or(ORPHAN_MAX_AGE_SECS);
        let match_keys = self.store.scan_keys("match:*").await.map_err(to_internal)?;
        let mut result = CleanupResult::default();

        for key in match_keys {
            let Some(id_str) = key.strip_prefix("match:") else { continue };
            let Ok(match_id) = id_str.parse() else { continue };

            let Some(m) = self.round_engine.load(match_id).await? else { continue };
            if m.status.is_terminal() || !m.player_ids.contains(&PlayerId::User(user_id)) {
                continue;
            }

            let age_secs = (chrono::Utc::now() - m.created_at).num_seconds();
            if age_secs > threshold {
                result.refunded += self.round_engine.cancel_match(match_id, "orphaned").await?;
                result.cleaned += 1;
            }
        }
        Ok(result)
    }

    /// `GET /wallet/reconcile`: compares the stored frozen balance
    /// against the sum of stakes this user has committed to its
    /// currently active REAL-mode matches. A PRACTICE match never
    /// freezes a balance, so it contributes nothing to the expected
    /// total.
    pub async fn reconcile_wallet(&self, user_id: UserId) -> Result<Reconciliation, EngineError> {
        let match_keys = self.store.scan_keys("match:*").await.map_err(to_internal)?;
        let mut expected_frozen: i64 = 0;

        for key in match_keys {
            let Some(raw) = self.store.get(&key).await.map_err(to_internal)? else { continue };
            let Ok(m) = serde_json::from_str::<Match>(&raw) else { continue };
            if m.status.is_terminal() || m.mode != Mode::Real {
                continue;
            }
            if m.player_ids.contains(&PlayerId::User(user_id)) {
                expected_frozen += m.stake as i64;
            }
        }

        let wallet = self.wallet.get(user_id).await?;
        Ok(Reconciliation {
            balance_avail: wallet.balance_avail,
            balance_frozen: wallet.balance_frozen,
            expected_frozen,
            drift: wallet.balance_frozen - expected_frozen,
        })
    }
}

/// `POST /matchmaking/cleanup-orphaned` result.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema)]
pub struct CleanupResult {
    pub cleaned: u64,
    pub refunded: u64,
}

/// `GET /wallet/reconcile` result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct Reconciliation {
    pub balance_avail: i64,
    pub balance_frozen: i64,
    pub expected_frozen: i64,
    pub drift: i64,
}

fn to_internal(e: anyhow::Error) -> EngineError {
    EngineError::Internal(e.to_string())
}
