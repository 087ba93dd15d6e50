//! WebSocket connection manager
//!
//! Manages active WebSocket connections using DashMap for concurrent
//! access. Supports multiple connections per user, and per-topic rooms
//! (`match:<id>`) so the event dispatcher can broadcast to every
//! subscriber of a match without tracking user ids itself.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

use super::messages::WsMessage;
use crate::core_types::UserId;

/// WebSocket sender channel type.
pub type WsSender = mpsc::UnboundedSender<WsMessage>;

/// Unique connection identifier.
pub type ConnectionId = u64;

struct Connection {
    user_id: UserId,
    sender: WsSender,
}

/// WebSocket connection manager.
///
/// Thread-safe connection registry that maps user_id to their active
/// WebSocket connections, plus a room index for topic subscriptions.
/// Uses DashMap for lock-free concurrent access.
pub struct ConnectionManager {
    connections: DashMap<ConnectionId, Connection>,
    by_user: DashMap<UserId, Vec<ConnectionId>>,
    rooms: DashMap<String, HashSet<ConnectionId>>,
    next_conn_id: AtomicU64,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            by_user: DashMap::new(),
            rooms: DashMap::new(),
            next_conn_id: AtomicU64::new(1),
        }
    }

    /// Add a new WebSocket connection for a user. Returns the unique
    /// connection ID. Supports multiple connections per user (mobile +
    /// web).
    pub fn add_connection(&self, user_id: UserId, tx: WsSender) -> ConnectionId {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);

        self.connections.insert(conn_id, Connection { user_id, sender: tx });
        self.by_user.entry(user_id).or_default().push(conn_id);

        tracing::info!(user_id, conn_id, "WebSocket connection added");
        conn_id
    }

    /// Remove a connection, cleaning up its user index entry and any
    /// room memberships.
    pub fn remove_connection(&self, conn_id: ConnectionId) {
        let Some((_, conn)) = self.connections.remove(&conn_id) else {
            return;
        };

        if let Some(mut ids) = self.by_user.get_mut(&conn.user_id) {
            ids.retain(|id| *id != conn_id);
            if ids.is_empty() {
                drop(ids);
                self.by_user.remove(&conn.user_id);
            }
        }

        for mut room in self.rooms.iter_mut() {
            room.remove(&conn_id);
        }
        self.rooms.retain(|_, members| !members.is_empty());

        tracing::info!(user_id = conn.user_id, conn_id, "WebSocket connection removed");
    }

    /// Subscribe a connection to a topic room (e.g. `match:<id>`).
    pub fn subscribe(&self, conn_id: ConnectionId, topic: String) {
        self.rooms.entry(topic).or_default().insert(conn_id);
    }

    /// Unsubscribe a connection from a topic room.
    pub fn unsubscribe(&self, conn_id: ConnectionId, topic: &str) {
        if let Some(mut members) = self.rooms.get_mut(topic) {
            members.remove(&conn_id);
        }
    }

    /// Send a message to every active connection of a specific user.
    pub fn send_to_user(&self, user_id: UserId, message: WsMessage) {
        if let Some(ids) = self.by_user.get(&user_id) {
            for conn_id in ids.iter() {
                if let Some(conn) = self.connections.get(conn_id)
                    && conn.sender.send(message.clone()).is_err()
                {
                    tracing::warn!(user_id, conn_id, "failed to send - client disconnected");
                }
            }
        }
    }

    /// Broadcast a message to every connection subscribed to `topic`.
    pub fn send_to_room(&self, topic: &str, message: WsMessage) {
        if let Some(members) = self.rooms.get(topic) {
            for conn_id in members.iter() {
                if let Some(conn) = self.connections.get(conn_id)
                    && conn.sender.send(message.clone()).is_err()
                {
                    tracing::warn!(conn_id, topic, "failed to send to room member");
                }
            }
        }
    }

    /// Get connection statistics: (number of users, total connections).
    pub fn stats(&self) -> (usize, usize) {
        (self.by_user.len(), self.connections.len())
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_remove_connection() {
        let manager = ConnectionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let conn_id = manager.add_connection(1001, tx);
        assert_eq!(manager.stats(), (1, 1));

        manager.remove_connection(conn_id);
        assert_eq!(manager.stats(), (0, 0));
    }

    #[test]
    fn multiple_connections_per_user() {
        let manager = ConnectionManager::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        let conn_id1 = manager.add_connection(1001, tx1);
        let _conn_id2 = manager.add_connection(1001, tx2);
        assert_eq!(manager.stats(), (1, 2));

        manager.remove_connection(conn_id1);
        assert_eq!(manager.stats(), (1, 1));
    }

    #[test]
    fn room_broadcast_reaches_subscribers_only() {
        let manager = ConnectionManager::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();

        let conn1 = manager.add_connection(1, tx1);
        let _conn2 = manager.add_connection(2, tx2);

        manager.subscribe(conn1, "match:abc".to_string());
        manager.send_to_room("match:abc", WsMessage::MatchCountdown { seconds: 5 });

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn unsubscribe_stops_future_broadcasts() {
        let manager = ConnectionManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = manager.add_connection(1, tx);

        manager.subscribe(conn, "match:abc".to_string());
        manager.unsubscribe(conn, "match:abc");
        manager.send_to_room("match:abc", WsMessage::MatchCountdown { seconds: 5 });

        assert!(rx.try_recv().is_err());
    }
}
