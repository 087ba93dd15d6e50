//! Event dispatcher: translates internal state transitions into
//! outgoing WebSocket frames, routed to the `match:<id>` room or a
//! specific user.

use std::sync::Arc;

use crate::core_types::{Id, RoundNo, UserId};
use crate::match_engine::model::Match;
use crate::websocket::connection::ConnectionManager;
use crate::websocket::messages::{match_room, WsMessage};

/// Thin wrapper around the connection manager with one method per
/// outgoing event, so callers never construct `WsMessage` variants or
/// room names themselves.
pub struct EventDispatcher {
    connections: Arc<ConnectionManager>,
}

impl EventDispatcher {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }

    pub fn match_ready(&self, user_id: UserId, match_id: Id) {
        self.connections.send_to_user(user_id, WsMessage::MatchReady { match_id });
    }

    pub fn match_found(&self, user_id: UserId, match_id: Id, countdown: u32) {
        self.connections
            .send_to_user(user_id, WsMessage::MatchFound { match_id, countdown, mode: "PVP" });
    }

    pub fn match_countdown(&self, match_id: Id, seconds: u32) {
        self.connections
            .send_to_room(&match_room(match_id), WsMessage::MatchCountdown { seconds });
    }

    pub fn match_start(&self, m: &Match) {
        self.connections.send_to_room(
            &match_room(m.match_id),
            WsMessage::MatchStart { snapshot: Box::new(m.clone()) },
        );
    }

    pub fn match_update(&self, m: &Match) {
        self.connections.send_to_room(
            &match_room(m.match_id),
            WsMessage::MatchUpdate { snapshot: Box::new(m.clone()) },
        );
    }

    pub fn match_round(&self, match_id: Id, round: RoundNo, alive_count: usize) {
        self.connections
            .send_to_room(&match_room(match_id), WsMessage::MatchRound { round, alive_count });
    }

    pub fn match_timer(&self, match_id: Id, timer_type: &'static str, deadline: i64, seconds_left: i64, round: RoundNo) {
        self.connections.send_to_room(
            &match_room(match_id),
            WsMessage::MatchTimer { timer_type, deadline, seconds_left, round },
        );
    }

    pub fn match_cancelled(&self, match_id: Id, reason: &str, message: &str) {
        self.connections.send_to_room(
            &match_room(match_id),
            WsMessage::MatchCancelled {
                match_id,
                reason: reason.to_string(),
                message: message.to_string(),
            },
        );
    }

    pub fn queue_sync(&self, user_id: UserId, players_found: u32, total_needed: u32, seconds_left: u32, elapsed: u32) {
        self.connections.send_to_user(
            user_id,
            WsMessage::QueueSync { players_found, total_needed, seconds_left, elapsed },
        );
    }

    pub fn queue_waiting(&self, user_id: UserId, seconds: u32, players_found: u32) {
        self.connections
            .send_to_user(user_id, WsMessage::QueueWaiting { seconds, players_found });
    }

    pub fn chat_game(&self, match_id: Id, from: UserId, text: String) {
        self.connections
            .send_to_room(&match_room(match_id), WsMessage::ChatGame { match_id, from, text });
    }

    pub fn chat_global(&self, from: UserId, text: String) {
        self.connections
            .send_to_room("chat:global", WsMessage::ChatGlobal { from, text });
    }
}
