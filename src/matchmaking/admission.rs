//! Admission: validates requests, enforces single active engagement
//! per user, and creates tickets.

use std::sync::Arc;

use crate::clock::Clock;
use crate::core_types::{is_valid_party_size, is_valid_stake, Id, PartySize, Stake, UserId, PARTY_SIZES, STAKES};
use crate::error::EngineError;
use crate::match_engine::model::PlayerId;
use crate::store::{DistributedLock, KvStore};
use crate::wallet::WalletRepo;

use super::assembler::MatchAssembler;
use super::queue::QueueManager;
use super::ticket::{ticket_key, Ticket, TICKET_TTL_SECS};

const ENGAGEMENT_LOCK_TTL_SECS: u64 = 5;

/// Result of `quickPlay`: the three non-error outcomes a caller can
/// land in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuickPlayOutcome {
    Queued { ticket_id: Id },
    AlreadyInQueue { ticket_id: Id },
    AlreadyInMatch { match_id: Id },
}

pub struct Admission {
    store: Arc<dyn KvStore>,
    lock: DistributedLock,
    wallet: Arc<dyn WalletRepo>,
    queue: Arc<QueueManager>,
    assembler: Arc<MatchAssembler>,
    clock: Arc<dyn Clock>,
}

impl Admission {
    pub fn new(
        store: Arc<dyn KvStore>,
        wallet: Arc<dyn WalletRepo>,
        queue: Arc<QueueManager>,
        assembler: Arc<MatchAssembler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let lock = DistributedLock::new(store.clone());
        Self { store, lock, wallet, queue, assembler, clock }
    }

    /// `quickPlay(userId, partySize, stake, displayName?)`.
    pub async fn quick_play(
        self: &Arc<Self>,
        user_id: UserId,
        party_size: PartySize,
        stake: Stake,
        display_name: Option<String>,
    ) -> Result<QuickPlayOutcome, EngineError> {
        if !is_valid_party_size(party_size) {
            return Err(EngineError::BadInput(format!("party_size {party_size} not in 2..=5")));
        }
        if !is_valid_stake(stake) {
            return Err(EngineError::BadInput(format!("stake {stake} is not an allowed denomination")));
        }

        let wallet = self.wallet.get(user_id).await?;
        if wallet.balance_avail < stake as i64 {
            return Err(EngineError::InsufficientBalance);
        }

        let lock_key = format!("engagementLock:{user_id}");
        let guard = self
            .lock
            .acquire(&lock_key, ENGAGEMENT_LOCK_TTL_SECS)
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        let Some(guard) = guard else {
            return Err(EngineError::Conflict("DuplicateRequest".to_string()));
        };

        let result = self.admit_under_lock(user_id, party_size, stake, display_name).await;

        if let Err(e) = guard.release().await {
            tracing::warn!(error = %e, "failed to release engagement lock");
        }
        result
    }

    async fn admit_under_lock(
        &self,
        user_id: UserId,
        party_size: PartySize,
        stake: Stake,
        display_name: Option<String>,
    ) -> Result<QuickPlayOutcome, EngineError> {
        if let Some(outcome) = self.find_existing_engagement(user_id).await? {
            return Ok(outcome);
        }

        let ticket_id = Id::new();
        let ticket = Ticket {
            ticket_id,
            user_id,
            party_size,
            stake,
            created_at: self.clock.now(),
            display_name,
        };
        let json = serde_json::to_string(&ticket).map_err(|e| EngineError::Internal(e.to_string()))?;
        self.store
            .set_ex(&ticket_key(ticket_id), &json, TICKET_TTL_SECS)
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        self.queue.push(party_size, stake, &ticket_id.to_string()).await?;

        // Non-blocking hint: don't make the caller wait on assembly.
        let assembler = Arc::clone(&self.assembler);
        tokio::spawn(async move {
            if let Err(e) = assembler.try_assemble(party_size, stake, false).await {
                tracing::warn!(error = %e, "assembler hint failed");
            }
        });

        Ok(QuickPlayOutcome::Queued { ticket_id })
    }

    async fn find_existing_engagement(&self, user_id: UserId) -> Result<Option<QuickPlayOutcome>, EngineError> {
        for party_size in PARTY_SIZES {
            for stake in STAKES {
                for id in self.queue.peek_all(party_size, stake).await? {
                    let Ok(parsed_id) = id.parse() else { continue };
                    let Some(raw) = self
                        .store
                        .get(&ticket_key(parsed_id))
                        .await
                        .map_err(|e| EngineError::Internal(e.to_string()))?
                    else {
                        continue;
                    };
                    let ticket: Ticket = serde_json::from_str(&raw).map_err(|e| EngineError::Internal(e.to_string()))?;
                    if ticket.user_id == user_id {
                        return Ok(Some(QuickPlayOutcome::AlreadyInQueue { ticket_id: ticket.ticket_id }));
                    }
                }
            }
        }

        let match_keys = self
            .store
            .scan_keys("match:*")
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        for key in match_keys {
            let Some(raw) = self.store.get(&key).await.map_err(|e| EngineError::Internal(e.to_string()))? else {
                continue;
            };
            let m: crate::match_engine::model::Match = match serde_json::from_str(&raw) {
                Ok(m) => m,
                Err(_) => continue,
            };
            if m.status.is_terminal() {
                continue;
            }
            if m.player_ids.contains(&PlayerId::User(user_id)) {
                return Ok(Some(QuickPlayOutcome::AlreadyInMatch { match_id: m.match_id }));
            }
        }
        Ok(None)
    }
}
