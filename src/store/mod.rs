//! KV/coordination store abstraction.
//!
//! Backs queues, tickets, live match snapshots, and distributed locks.
//! Defined as a trait, repository-style rather than an ORM graph, so
//! the engine's tests can run against an in-memory double instead of a
//! live Redis instance.

pub mod lock;
pub mod memory;
pub mod redis_store;

pub use lock::{DistributedLock, LockGuard};
pub use memory::InMemoryStore;
pub use redis_store::RedisStore;

use async_trait::async_trait;

/// String/list operations the engine needs from the coordination store.
///
/// Every method maps directly onto a single Redis primitive so the
/// `RedisStore` implementation is a thin pass-through; see individual
/// method docs for the mapping.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// `GET key`.
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// `SET key value EX ttl_secs`.
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()>;

    /// `SET key value EX ttl_secs NX`. Returns `true` if the key was set.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<bool>;

    /// `DEL key`.
    async fn del(&self, key: &str) -> anyhow::Result<()>;

    /// `EXISTS key`.
    async fn exists(&self, key: &str) -> anyhow::Result<bool>;

    /// `RPUSH key value`.
    async fn rpush(&self, key: &str, value: &str) -> anyhow::Result<()>;

    /// `LPOP key count`. Returns up to `count` elements from the head.
    async fn lpop(&self, key: &str, count: usize) -> anyhow::Result<Vec<String>>;

    /// Push `values` back onto the head of the list, preserving order
    /// (used to restore tickets an aborted assembly attempt popped).
    async fn lpush_many(&self, key: &str, values: &[String]) -> anyhow::Result<()>;

    /// `LRANGE key 0 -1`.
    async fn lrange_all(&self, key: &str) -> anyhow::Result<Vec<String>>;

    /// `LREM key 0 value`.
    async fn lrem(&self, key: &str, value: &str) -> anyhow::Result<()>;

    /// `LLEN key`.
    async fn llen(&self, key: &str) -> anyhow::Result<usize>;

    /// `KEYS pattern` (or a `SCAN`-based equivalent).
    async fn scan_keys(&self, pattern: &str) -> anyhow::Result<Vec<String>>;

    /// Compare-and-delete: delete `key` only if its value equals `token`.
    /// Implemented as a single Lua script so the check-then-delete is
    /// atomic (used to release locks only if still owned by the caller).
    async fn cas_delete(&self, key: &str, token: &str) -> anyhow::Result<bool>;
}
