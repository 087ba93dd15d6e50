//! Matchmaking ticket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core_types::{Id, PartySize, Stake, UserId};

/// TTL (seconds) for a queued ticket.
pub const TICKET_TTL_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: Id,
    pub user_id: UserId,
    pub party_size: PartySize,
    pub stake: Stake,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// KV key for a ticket record.
pub fn ticket_key(ticket_id: Id) -> String {
    format!("ticket:{ticket_id}")
}
