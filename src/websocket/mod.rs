//! WebSocket transport: connection registry, wire frames, and the
//! upgrade handler that authenticates a socket via bearer JWT and
//! forwards client commands into the matchmaking/round engine.

pub mod connection;
pub mod handler;
pub mod messages;

pub use connection::{ConnectionId, ConnectionManager};
pub use handler::ws_handler;
pub use messages::{WsCommand, WsMessage};
