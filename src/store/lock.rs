//! Distributed advisory locks over the KV store.
//!
//! Used for `engagementLock:<userId>`, `queueLock:<partySize>:<stake>`,
//! `startLock:<matchId>`, and `timerLock:<matchId>:<round>`. Every
//! lock is `SET key token EX ttl NX` to acquire and a scripted
//! compare-and-delete to release, so a lock can never be released by a
//! holder that no longer owns it (e.g. after TTL expiry and re-acquisition
//! by another node).

use std::sync::Arc;

use super::KvStore;

pub struct DistributedLock {
    store: Arc<dyn KvStore>,
}

impl DistributedLock {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Attempt to acquire `key` for `ttl_secs`. Returns `None` if the
    /// lock is already held by someone else.
    pub async fn acquire(&self, key: &str, ttl_secs: u64) -> anyhow::Result<Option<LockGuard>> {
        let token = crate::core_types::Id::new().to_string();
        if self.store.set_nx_ex(key, &token, ttl_secs).await? {
            Ok(Some(LockGuard {
                store: self.store.clone(),
                key: key.to_string(),
                token,
            }))
        } else {
            Ok(None)
        }
    }
}

/// A held lock. Dropping this without calling [`LockGuard::release`]
/// is safe — the TTL self-heals — but callers should release promptly
/// once their critical section ends: locks are never held across I/O
/// waits for client input.
#[must_use]
pub struct LockGuard {
    store: Arc<dyn KvStore>,
    key: String,
    token: String,
}

impl LockGuard {
    /// Release the lock, but only if it still carries this guard's
    /// token (i.e. it was not lost to TTL expiry and re-acquired by
    /// another node in the meantime).
    pub async fn release(self) -> anyhow::Result<bool> {
        self.store.cas_delete(&self.key, &self.token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn second_acquire_fails_while_held() {
        let store: Arc<dyn KvStore> = Arc::new(InMemoryStore::new());
        let lock = DistributedLock::new(store);

        let guard = lock.acquire("engagementLock:1", 5).await.unwrap();
        assert!(guard.is_some());

        let second = lock.acquire("engagementLock:1", 5).await.unwrap();
        assert!(second.is_none());

        assert!(guard.unwrap().release().await.unwrap());

        let third = lock.acquire("engagementLock:1", 5).await.unwrap();
        assert!(third.is_some());
    }
}
