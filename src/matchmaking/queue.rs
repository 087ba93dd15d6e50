//! Queue manager: per-`(partySize,stake)` FIFOs, expired-ticket sweep,
//! and `queueStartedAt` age tracking.

use std::sync::Arc;

use crate::clock::Clock;
use crate::core_types::{PartySize, Stake};
use crate::error::EngineError;
use crate::store::KvStore;

use super::ticket::ticket_key;

/// `queueStartedAt` is kept as a plain KV scalar, not a list member, so
/// it survives independently of which tickets are currently queued.
/// Generous TTL; it is cleared explicitly when the queue empties, this
/// is only a backstop against leaked keys if that never happens.
const QUEUE_TIME_TTL_SECS: u64 = 24 * 3600;

pub struct QueueManager {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
}

impl QueueManager {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn queue_key(party_size: PartySize, stake: Stake) -> String {
        format!("queue:{party_size}:{stake}")
    }

    pub fn queue_time_key(party_size: PartySize, stake: Stake) -> String {
        format!("queue:time:{party_size}:{stake}")
    }

    /// Push a ticket id onto the tail, setting `queueStartedAt` if this
    /// is the first ticket in an empty queue.
    pub async fn push(&self, party_size: PartySize, stake: Stake, ticket_id: &str) -> Result<(), EngineError> {
        let key = Self::queue_key(party_size, stake);
        self.store.rpush(&key, ticket_id).await.map_err(to_internal)?;
        let time_key = Self::queue_time_key(party_size, stake);
        self.store
            .set_nx_ex(&time_key, &self.clock.now_ms().to_string(), QUEUE_TIME_TTL_SECS)
            .await
            .map_err(to_internal)?;
        Ok(())
    }

    /// `cleanExpired(queueKey)`: drop any ticket id whose ticket record
    /// no longer exists. Clears `queueStartedAt` if the queue empties.
    pub async fn clean_expired(&self, party_size: PartySize, stake: Stake) -> Result<(), EngineError> {
        let key = Self::queue_key(party_size, stake);
        let ids = self.store.lrange_all(&key).await.map_err(to_internal)?;

        for id in ids {
            let exists = self
                .store
                .exists(&ticket_key(id.parse().map_err(|_| EngineError::Internal("bad ticket id in queue".into()))?))
                .await
                .map_err(to_internal)?;
            if !exists {
                self.store.lrem(&key, &id).await.map_err(to_internal)?;
            }
        }

        if self.store.llen(&key).await.map_err(to_internal)? == 0 {
            self.store
                .del(&Self::queue_time_key(party_size, stake))
                .await
                .map_err(to_internal)?;
        }
        Ok(())
    }

    /// Current length, after a sweep.
    pub async fn length(&self, party_size: PartySize, stake: Stake) -> Result<usize, EngineError> {
        self.clean_expired(party_size, stake).await?;
        self.store
            .llen(&Self::queue_key(party_size, stake))
            .await
            .map_err(to_internal)
    }

    /// `now - queueStartedAt`, or 0 if the queue has no recorded start.
    pub async fn age_seconds(&self, party_size: PartySize, stake: Stake) -> Result<i64, EngineError> {
        let raw = self
            .store
            .get(&Self::queue_time_key(party_size, stake))
            .await
            .map_err(to_internal)?;
        match raw.and_then(|s| s.parse::<i64>().ok()) {
            Some(started_ms) => Ok(((self.clock.now_ms() - started_ms).max(0)) / 1000),
            None => Ok(0),
        }
    }

    pub async fn clear_started_at(&self, party_size: PartySize, stake: Stake) -> Result<(), EngineError> {
        self.store
            .del(&Self::queue_time_key(party_size, stake))
            .await
            .map_err(to_internal)
    }

    pub async fn reset_started_at(&self, party_size: PartySize, stake: Stake) -> Result<(), EngineError> {
        let time_key = Self::queue_time_key(party_size, stake);
        self.store.del(&time_key).await.map_err(to_internal)?;
        self.store
            .set_ex(&time_key, &self.clock.now_ms().to_string(), QUEUE_TIME_TTL_SECS)
            .await
            .map_err(to_internal)
    }

    /// Pop up to `count` ticket ids from the head.
    pub async fn pop_head(&self, party_size: PartySize, stake: Stake, count: usize) -> Result<Vec<String>, EngineError> {
        self.store
            .lpop(&Self::queue_key(party_size, stake), count)
            .await
            .map_err(to_internal)
    }

    /// Push ids back onto the head, preserving their relative order
    /// (used when an assembly attempt aborts and must restore FIFO
    /// position for the tickets it popped but didn't consume).
    pub async fn push_back_head(&self, party_size: PartySize, stake: Stake, ids: &[String]) -> Result<(), EngineError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.store
            .lpush_many(&Self::queue_key(party_size, stake), ids)
            .await
            .map_err(to_internal)
    }

    /// All ticket ids currently queued for `(partySize,stake)`.
    pub async fn peek_all(&self, party_size: PartySize, stake: Stake) -> Result<Vec<String>, EngineError> {
        self.store
            .lrange_all(&Self::queue_key(party_size, stake))
            .await
            .map_err(to_internal)
    }
}

fn to_internal(e: anyhow::Error) -> EngineError {
    EngineError::Internal(e.to_string())
}
