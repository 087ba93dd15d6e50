//! Redis-backed implementation of [`KvStore`].

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::KvStore;

/// Lua script for atomic compare-and-delete, used to release locks
/// only if they are still owned by the caller's token.
const CAS_DELETE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to `redis_url` and build a reusable, auto-reconnecting
    /// connection manager.
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!("Redis coordination store connected");
        Ok(Self { conn })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.conn().get(key).await?)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()> {
        let _: () = self.conn().set_ex(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<bool> {
        let opts = redis::SetOptions::default()
            .with_expiration(redis::SetExpiry::EX(ttl_secs))
            .conditional_set(redis::ExistenceCheck::NX);
        let result: Option<String> = self.conn().set_options(key, value, opts).await?;
        Ok(result.is_some())
    }

    async fn del(&self, key: &str) -> anyhow::Result<()> {
        let _: () = self.conn().del(key).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.conn().exists(key).await?)
    }

    async fn rpush(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let _: () = self.conn().rpush(key, value).await?;
        Ok(())
    }

    async fn lpop(&self, key: &str, count: usize) -> anyhow::Result<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let values: Vec<String> = self
            .conn()
            .lpop(key, std::num::NonZeroUsize::new(count))
            .await?;
        Ok(values)
    }

    async fn lpush_many(&self, key: &str, values: &[String]) -> anyhow::Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        // Push in reverse so the final list order matches `values`
        // (LPUSH prepends each argument, reversing single-shot order).
        let mut reversed = values.to_vec();
        reversed.reverse();
        let _: () = self.conn().lpush(key, reversed).await?;
        Ok(())
    }

    async fn lrange_all(&self, key: &str) -> anyhow::Result<Vec<String>> {
        Ok(self.conn().lrange(key, 0, -1).await?)
    }

    async fn lrem(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let _: () = self.conn().lrem(key, 0, value).await?;
        Ok(())
    }

    async fn llen(&self, key: &str) -> anyhow::Result<usize> {
        Ok(self.conn().llen(key).await?)
    }

    async fn scan_keys(&self, pattern: &str) -> anyhow::Result<Vec<String>> {
        let mut conn = self.conn();
        let mut keys = Vec::new();
        let mut iter: redis::AsyncIter<'_, String> = conn.scan_match(pattern).await?;
        use futures::StreamExt;
        while let Some(key) = iter.next().await {
            keys.push(key);
        }
        Ok(keys)
    }

    async fn cas_delete(&self, key: &str, token: &str) -> anyhow::Result<bool> {
        let script = redis::Script::new(CAS_DELETE_SCRIPT);
        let result: i32 = script
            .key(key)
            .arg(token)
            .invoke_async(&mut self.conn())
            .await?;
        Ok(result == 1)
    }
}
