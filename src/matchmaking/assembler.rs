//! Match assembler: picks tickets into a match under race-free locks,
//! freezes stakes, and allocates bot fillers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::audit::{AuditEvent, AuditSink};
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::core_types::{Id, PartySize, Stake, PARTY_SIZES, STAKES};
use crate::error::EngineError;
use crate::events::EventDispatcher;
use crate::fee::{self, FeeSchedule};
use crate::match_engine::model::{match_key, ttl_for_status, Match, Mode, PlayerId};
use crate::match_engine::RoundEngine;
use crate::store::{DistributedLock, KvStore};
use crate::wallet::WalletRepo;

use super::bots::fill_bots;
use super::queue::QueueManager;
use super::ticket::{ticket_key, Ticket};

const QUEUE_LOCK_TTL_SECS: u64 = 5;
const START_LOCK_TTL_SECS: u64 = 10;
const STALE_QUEUE_AGE_SECS: i64 = 3600;
const FORCE_ASSEMBLE_AGE_SECS: i64 = 20;
const COUNTDOWN_SECS: u32 = 5;

pub struct MatchAssembler {
    store: Arc<dyn KvStore>,
    lock: DistributedLock,
    wallet: Arc<dyn WalletRepo>,
    queue: Arc<QueueManager>,
    round_engine: Arc<RoundEngine>,
    events: Arc<EventDispatcher>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    config: Arc<AppConfig>,
}

impl MatchAssembler {
    pub fn new(
        store: Arc<dyn KvStore>,
        wallet: Arc<dyn WalletRepo>,
        queue: Arc<QueueManager>,
        round_engine: Arc<RoundEngine>,
        events: Arc<EventDispatcher>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        config: Arc<AppConfig>,
    ) -> Self {
        let lock = DistributedLock::new(store.clone());
        Self { store, lock, wallet, queue, round_engine, events, audit, clock, config }
    }

    /// `tryAssemble(partySize, stake, force?)`. Returns the new match's
    /// id, or `None` if nothing was assembled this call.
    pub async fn try_assemble(&self, party_size: PartySize, stake: Stake, force: bool) -> Result<Option<Id>, EngineError> {
        let lock_key = format!("queueLock:{party_size}:{stake}");
        let Some(guard) = self
            .lock
            .acquire(&lock_key, QUEUE_LOCK_TTL_SECS)
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?
        else {
            return Ok(None);
        };

        let result = self.assemble_under_lock(party_size, stake, force).await;

        if let Err(e) = guard.release().await {
            tracing::warn!(error = %e, "failed to release queue lock");
        }
        result
    }

    async fn assemble_under_lock(&self, party_size: PartySize, stake: Stake, force: bool) -> Result<Option<Id>, EngineError> {
        self.queue.clean_expired(party_size, stake).await?;

        let n = self.queue.length(party_size, stake).await?;
        if n == 0 {
            self.queue.clear_started_at(party_size, stake).await?;
            return Ok(None);
        }

        let mut elapsed = self.queue.age_seconds(party_size, stake).await?;
        if elapsed > STALE_QUEUE_AGE_SECS {
            self.queue.reset_started_at(party_size, stake).await?;
            elapsed = 0;
        }

        if !(force || n >= party_size as usize || elapsed >= FORCE_ASSEMBLE_AGE_SECS) {
            return Ok(None);
        }
        if n < 2 && !force {
            return Ok(None);
        }

        let popped = self.queue.pop_head(party_size, stake, n.min(party_size as usize)).await?;

        let mut seen_users = std::collections::HashSet::new();
        let mut valid: Vec<(String, Ticket)> = Vec::new();
        for id in popped {
            let Ok(ticket_ulid) = id.parse() else { continue };
            let Some(raw) = self
                .store
                .get(&ticket_key(ticket_ulid))
                .await
                .map_err(|e| EngineError::Internal(e.to_string()))?
            else {
                continue; // stale: record already expired
            };
            let Ok(ticket) = serde_json::from_str::<Ticket>(&raw) else { continue };
            if !seen_users.insert(ticket.user_id) {
                continue; // duplicate user: retain only the first
            }
            valid.push((id, ticket));
        }

        if valid.len() < 2 && !force {
            let ids: Vec<String> = valid.into_iter().map(|(id, _)| id).collect();
            self.queue.push_back_head(party_size, stake, &ids).await?;
            return Ok(None);
        }

        let match_id = Id::new();
        let bot_count = party_size.saturating_sub(valid.len() as u8);

        let (mode, fee_schedule, frozen_users) = self.freeze_stakes(match_id, stake, party_size, bot_count, &valid).await?;

        // Tickets are consumed regardless of whether their freeze
        // succeeded; a failed freeze discards the ticket rather than
        // requeueing it.
        for (_, ticket) in &valid {
            self.store
                .del(&ticket_key(ticket.ticket_id))
                .await
                .map_err(|e| EngineError::Internal(e.to_string()))?;
        }

        if frozen_users.is_empty() && !force {
            return Ok(None);
        }

        let mut player_ids: Vec<PlayerId> = Vec::new();
        let mut player_names: HashMap<PlayerId, String> = HashMap::new();
        for (user_id, display_name) in &frozen_users {
            let pid = PlayerId::User(*user_id);
            if let Some(name) = display_name {
                player_names.insert(pid.clone(), name.clone());
            }
            player_ids.push(pid);
        }

        let actual_bot_count = party_size.saturating_sub(player_ids.len() as u8);
        let mut bot_names: HashMap<PlayerId, String> = HashMap::new();
        for (pid, label) in fill_bots(actual_bot_count) {
            bot_names.insert(pid.clone(), label);
            player_ids.push(pid);
        }

        // A PRACTICE match never carries a real stake, win or lose.
        let match_stake = if mode == Mode::Practice { 0 } else { stake };

        let m = Match::new(
            match_id,
            party_size,
            match_stake,
            fee_schedule,
            player_ids,
            player_names,
            bot_names,
            mode,
            self.clock.now(),
        );

        let json = serde_json::to_string(&m).map_err(|e| EngineError::Internal(e.to_string()))?;
        self.store
            .set_ex(&match_key(match_id), &json, ttl_for_status(m.status))
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?;

        self.queue.clear_started_at(party_size, stake).await?;
        self.audit.record(AuditEvent::new("MATCH_CREATED").with_match(match_id));

        for user_id in frozen_users.iter().map(|(uid, _)| *uid) {
            self.events.match_ready(user_id, match_id);
            self.events.match_found(user_id, match_id, COUNTDOWN_SECS);
        }

        self.spawn_start_sequence(match_id);

        Ok(Some(match_id))
    }

    /// Decide REAL vs. PRACTICE for this match, then freeze the
    /// confirmed real players' stakes (and the house's bot-covering
    /// stake, if any). Returns the mode, the fee schedule, and the
    /// users whose freeze actually succeeded.
    async fn freeze_stakes(
        &self,
        match_id: Id,
        stake: Stake,
        party_size: PartySize,
        bot_count: u8,
        valid: &[(String, Ticket)],
    ) -> Result<(Mode, FeeSchedule, Vec<(crate::core_types::UserId, Option<String>)>), EngineError> {
        if bot_count == 0 || stake == 0 {
            let frozen = self.freeze_real_players(stake, valid).await?;
            return Ok((Mode::Real, fee::compute(stake, party_size), frozen));
        }

        let house_stake = stake * bot_count as u64;
        let house_can_cover = match self.config.house_user_id {
            Some(house_id) => self
                .wallet
                .get(house_id)
                .await
                .map(|w| w.balance_avail >= house_stake as i64)
                .unwrap_or(false),
            None => false,
        };

        if !house_can_cover {
            // Practice-mode fallback: no wallet mutations at all.
            let names = valid.iter().map(|(_, t)| (t.user_id, t.display_name.clone())).collect();
            return Ok((Mode::Practice, FeeSchedule { pot: 0, fee: 0, payout: 0 }, names));
        }

        let house_id = self.config.house_user_id.expect("checked above");
        {
            let mut tx = self.wallet.begin().await?;
            let house_wallet = tx.get_for_update(house_id).await?;
            tx.set_balances(house_id, house_wallet.balance_avail - house_stake as i64, house_wallet.balance_frozen + house_stake as i64)
                .await?;
            tx.commit().await?;
            self.audit.record(
                AuditEvent::new("HOUSE_STAKE_FROZEN")
                    .with_match(match_id)
                    .with_payload(serde_json::json!({ "amount": house_stake })),
            );
        }

        let frozen = self.freeze_real_players(stake, valid).await?;
        Ok((Mode::Real, fee::compute(stake, party_size), frozen))
    }

    /// Freeze each ticket-holder's stake in its own small transaction,
    /// dropping (not requeueing) any user whose balance is no longer
    /// sufficient.
    async fn freeze_real_players(
        &self,
        stake: Stake,
        valid: &[(String, Ticket)],
    ) -> Result<Vec<(crate::core_types::UserId, Option<String>)>, EngineError> {
        if stake == 0 {
            return Ok(valid.iter().map(|(_, t)| (t.user_id, t.display_name.clone())).collect());
        }

        let mut frozen = Vec::new();
        for (_, ticket) in valid {
            let mut tx = self.wallet.begin().await?;
            let wallet = tx.get_for_update(ticket.user_id).await?;
            if wallet.balance_avail < stake as i64 {
                tx.rollback().await?;
                continue;
            }
            tx.set_balances(ticket.user_id, wallet.balance_avail - stake as i64, wallet.balance_frozen + stake as i64)
                .await?;
            tx.commit().await?;
            frozen.push((ticket.user_id, ticket.display_name.clone()));
        }
        Ok(frozen)
    }

    /// Guards the one-shot countdown + first-round kickoff with
    /// `startLock:<matchId>` so duplicate schedules are harmless.
    fn spawn_start_sequence(&self, match_id: Id) {
        let lock = DistributedLock::new(self.store.clone());
        let events = Arc::clone(&self.events);
        let round_engine = Arc::clone(&self.round_engine);

        tokio::spawn(async move {
            let lock_key = format!("startLock:{match_id}");
            let Ok(Some(_guard)) = lock.acquire(&lock_key, START_LOCK_TTL_SECS).await else {
                return;
            };

            for remaining in (1..=COUNTDOWN_SECS).rev() {
                tokio::time::sleep(Duration::from_secs(1)).await;
                events.match_countdown(match_id, remaining);
            }

            if let Err(e) = round_engine.begin_first_round(match_id).await {
                tracing::warn!(%match_id, error = %e, "failed to begin first round");
            }
        });
    }

    /// Queue-timeout ticker: force-assemble any queue that has waited
    /// at least 20s with at least one ticket.
    pub async fn tick_queues(&self) -> Result<(), EngineError> {
        for party_size in PARTY_SIZES {
            for stake in STAKES {
                let n = self.queue.length(party_size, stake).await?;
                if n == 0 {
                    continue;
                }
                let elapsed = self.queue.age_seconds(party_size, stake).await?;
                if elapsed >= FORCE_ASSEMBLE_AGE_SECS {
                    self.try_assemble(party_size, stake, true).await?;
                }
            }
        }
        Ok(())
    }
}
