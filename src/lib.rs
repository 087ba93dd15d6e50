//! clash_arena - Real-time matchmaking and round-resolution engine
//!
//! A matchmaker and round-resolver for an elimination-style
//! rock/paper/scissors game played for virtual currency. Players queue
//! by party size and stake; the engine assembles matches, runs an
//! elimination tournament across rounds with move timers and bot
//! fallback, and settles stakes, fees, and payouts against wallets.
//!
//! # Modules
//!
//! - [`core_types`] - Shared ids, enums, and value types
//! - [`clock`] - Wall-clock abstraction for testable timers
//! - [`config`] - Environment-driven application configuration
//! - [`error`] - Domain error kinds shared across the engine
//! - [`db`] - PostgreSQL connection pool (wallet/stats/audit store)
//! - [`store`] - KV/coordination store abstraction (queues, tickets, locks)
//! - [`wallet`] - Transactional wallet repository
//! - [`audit`] - Append-only audit event sink
//! - [`matchmaking`] - Admission, queue manager, match assembler, bots
//! - [`match_engine`] - Per-match round state machine
//! - [`timers`] - Move-deadline, queue-timeout, and orphan-sweep timers
//! - [`settlement`] - Stake consumption, payout, and refund logic
//! - [`events`] - Event dispatcher over the websocket connection manager
//! - [`recovery`] - Active-state reconstruction and orphan cleanup
//! - [`websocket`] - WebSocket connection manager and frame handling
//! - [`user_auth`] - Guest sign-in and JWT verification
//! - [`gateway`] - HTTP/WebSocket server, routing, and DTOs
//! - [`fee`] - Pot/fee/payout arithmetic

pub mod core_types;

pub mod clock;
pub mod config;
pub mod error;
pub mod fee;
pub mod logging;

pub mod db;
pub mod store;

pub mod audit;
pub mod wallet;

pub mod match_engine;
pub mod matchmaking;
pub mod settlement;
pub mod timers;

pub mod events;
pub mod recovery;

pub mod user_auth;
pub mod websocket;

pub mod gateway;

pub use core_types::{Choice, Id, PartySize, Stake, UserId};
pub use error::EngineError;
