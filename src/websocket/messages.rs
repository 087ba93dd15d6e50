//! Outgoing and incoming WebSocket frame types.
//!
//! Tagged sum types rather than dynamic JSON: illegal frames are a
//! compile error, not a runtime throw.

use serde::{Deserialize, Serialize};

use crate::core_types::{Choice, Id, UserId};
use crate::match_engine::model::Match;

/// Server -> client frames. `#[serde(tag = "type", content = "data")]`
/// renders as `{"type": "match:ready", "data": {...}}` on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    #[serde(rename = "connected")]
    Connected { user_id: UserId },

    #[serde(rename = "queue:sync")]
    QueueSync {
        players_found: u32,
        total_needed: u32,
        seconds_left: u32,
        elapsed: u32,
    },

    #[serde(rename = "queue:waiting")]
    QueueWaiting { seconds: u32, players_found: u32 },

    #[serde(rename = "match:ready")]
    MatchReady { match_id: Id },

    #[serde(rename = "match:found")]
    MatchFound {
        match_id: Id,
        countdown: u32,
        mode: &'static str,
    },

    #[serde(rename = "match:countdown")]
    MatchCountdown { seconds: u32 },

    #[serde(rename = "match:start")]
    MatchStart { snapshot: Box<Match> },

    #[serde(rename = "match:update")]
    MatchUpdate { snapshot: Box<Match> },

    #[serde(rename = "match:round")]
    MatchRound { round: u32, alive_count: usize },

    #[serde(rename = "match:timer")]
    MatchTimer {
        #[serde(rename = "type")]
        timer_type: &'static str,
        deadline: i64,
        seconds_left: i64,
        round: u32,
    },

    #[serde(rename = "match:cancelled")]
    MatchCancelled {
        match_id: Id,
        reason: String,
        message: String,
    },

    #[serde(rename = "chat:message")]
    ChatMessage { from: UserId, text: String },

    #[serde(rename = "chat:game")]
    ChatGame { match_id: Id, from: UserId, text: String },

    #[serde(rename = "chat:global")]
    ChatGlobal { from: UserId, text: String },

    #[serde(rename = "subscribed")]
    Subscribed { topics: Vec<String> },

    #[serde(rename = "unsubscribed")]
    Unsubscribed { topics: Vec<String> },

    #[serde(rename = "pong")]
    Pong,

    #[serde(rename = "error")]
    Error { code: i32, message: String },
}

/// Room every connection is auto-subscribed to on connect, matching
/// [`crate::events::EventDispatcher::chat_global`]'s broadcast target.
pub const GLOBAL_CHAT_ROOM: &str = "chat:global";

/// Client -> server frames.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum WsCommand {
    #[serde(rename = "quickplay")]
    QuickPlay { players_count: u8, stake_vp: u64 },

    #[serde(rename = "move")]
    Move { match_id: Id, #[serde(rename = "move")] choice: Choice },

    #[serde(rename = "match:get")]
    MatchGet { match_id: Id },

    #[serde(rename = "match:join")]
    MatchJoin { match_id: Id },

    #[serde(rename = "subscribe")]
    Subscribe { args: Vec<String> },

    #[serde(rename = "unsubscribe")]
    Unsubscribe { args: Vec<String> },

    #[serde(rename = "chat:message")]
    ChatMessage { text: String },

    #[serde(rename = "chat:game")]
    ChatGame { match_id: Id, text: String },

    #[serde(rename = "chat:global")]
    ChatGlobal { text: String },
}

/// KV/room naming helper: `match:<matchId>`.
pub fn match_room(match_id: Id) -> String {
    format!("match:{match_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connected_frame_has_expected_shape() {
        let msg = WsMessage::Connected { user_id: 7 };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "connected");
        assert_eq!(json["data"]["user_id"], 7);
    }

    #[test]
    fn quickplay_command_parses() {
        let raw = r#"{"type":"quickplay","data":{"players_count":2,"stake_vp":100}}"#;
        let cmd: WsCommand = serde_json::from_str(raw).unwrap();
        matches!(cmd, WsCommand::QuickPlay { players_count: 2, stake_vp: 100 });
    }
}
