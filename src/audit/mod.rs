//! Append-only audit event recorder.
//!
//! Fire-and-forget from the caller's perspective, backed by a bounded
//! `tokio::sync::mpsc` worker with retry/backoff — an explicit bounded
//! background worker rather than a spawned fire-and-forget coroutine
//! per event.

pub mod pg;

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::core_types::{Id, RoundNo, UserId};

pub use pg::PgAuditSink;

/// Maximum delivery attempts before an event is logged and dropped.
pub const MAX_ATTEMPTS: u32 = 3;

/// Backoff cap between retries.
pub const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// A single append-only audit record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event_type: &'static str,
    pub match_id: Option<Id>,
    pub actor_id: Option<UserId>,
    pub round_no: Option<RoundNo>,
    pub payload: Value,
}

impl AuditEvent {
    pub fn new(event_type: &'static str) -> Self {
        Self {
            event_type,
            match_id: None,
            actor_id: None,
            round_no: None,
            payload: Value::Null,
        }
    }

    pub fn with_match(mut self, match_id: Id) -> Self {
        self.match_id = Some(match_id);
        self
    }

    pub fn with_actor(mut self, actor_id: UserId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn with_round(mut self, round_no: RoundNo) -> Self {
        self.round_no = Some(round_no);
        self
    }

    pub fn with_payload(mut self, payload: impl Serialize) -> Self {
        self.payload = serde_json::to_value(payload).unwrap_or(Value::Null);
        self
    }
}

/// Insertion API for the audit sink. Writers never block on storage —
/// `record` only enqueues; delivery happens on the background worker.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// A channel-backed handle handed to callers; the actual write worker
/// is spawned separately by [`spawn_worker`].
#[derive(Clone)]
pub struct AuditHandle {
    tx: mpsc::Sender<AuditEvent>,
}

impl AuditSink for AuditHandle {
    fn record(&self, event: AuditEvent) {
        if let Err(e) = self.tx.try_send(event) {
            tracing::warn!(error = %e, "audit queue full or closed, dropping event");
        }
    }
}

/// The underlying persistence operation an audit worker performs.
#[async_trait::async_trait]
pub trait AuditWriter: Send + Sync {
    async fn write(&self, event: &AuditEvent) -> anyhow::Result<()>;
}

/// Spawn the bounded background worker. Returns a cheaply-cloneable
/// handle writers use to enqueue events.
pub fn spawn_worker(writer: impl AuditWriter + 'static, queue_capacity: usize) -> AuditHandle {
    let (tx, mut rx) = mpsc::channel::<AuditEvent>(queue_capacity);

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let mut attempt = 0u32;
            loop {
                attempt += 1;
                match writer.write(&event).await {
                    Ok(()) => break,
                    Err(e) if attempt >= MAX_ATTEMPTS => {
                        tracing::error!(
                            event_type = event.event_type,
                            attempt,
                            error = %e,
                            "audit write failed after max attempts, dropping event"
                        );
                        break;
                    }
                    Err(e) => {
                        let backoff = Duration::from_millis(200 * 2u64.pow(attempt))
                            .min(MAX_BACKOFF);
                        tracing::warn!(
                            event_type = event.event_type,
                            attempt,
                            error = %e,
                            backoff_ms = backoff.as_millis() as u64,
                            "audit write failed, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }
    });

    AuditHandle { tx }
}
