//! PostgreSQL-backed [`AuditWriter`].

use sqlx::PgPool;

use super::{AuditEvent, AuditWriter};

pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AuditWriter for PgAuditSink {
    async fn write(&self, event: &AuditEvent) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO audit_events_tb (event_type, match_id, actor_id, round_no, payload, created_at)
             VALUES ($1, $2, $3, $4, $5, now())",
        )
        .bind(event.event_type)
        .bind(event.match_id.map(|id| id.to_string()))
        .bind(event.actor_id.map(|id| id as i64))
        .bind(event.round_no.map(|r| r as i32))
        .bind(&event.payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
