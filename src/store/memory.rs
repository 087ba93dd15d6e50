//! In-memory [`KvStore`] double, used by engine tests so round
//! resolution and settlement logic can be verified without a live
//! Redis instance.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::KvStore;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

#[derive(Default)]
pub struct InMemoryStore {
    strings: Mutex<std::collections::HashMap<String, Entry>>,
    lists: Mutex<std::collections::HashMap<String, VecDeque<String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_live(entry: &Entry) -> bool {
        entry.expires_at.map(|t| t > Instant::now()).unwrap_or(true)
    }
}

#[async_trait]
impl KvStore for InMemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut strings = self.strings.lock().unwrap();
        match strings.get(key) {
            Some(entry) if Self::is_live(entry) => Ok(Some(entry.value.clone())),
            Some(_) => {
                strings.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()> {
        self.strings.lock().unwrap().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<bool> {
        let mut strings = self.strings.lock().unwrap();
        if let Some(entry) = strings.get(key)
            && Self::is_live(entry)
        {
            return Ok(false);
        }
        strings.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(true)
    }

    async fn del(&self, key: &str) -> anyhow::Result<()> {
        self.strings.lock().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn rpush(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.lists
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(value.to_string());
        Ok(())
    }

    async fn lpop(&self, key: &str, count: usize) -> anyhow::Result<Vec<String>> {
        let mut lists = self.lists.lock().unwrap();
        let Some(list) = lists.get_mut(key) else {
            return Ok(Vec::new());
        };
        let mut popped = Vec::new();
        for _ in 0..count {
            match list.pop_front() {
                Some(v) => popped.push(v),
                None => break,
            }
        }
        Ok(popped)
    }

    async fn lpush_many(&self, key: &str, values: &[String]) -> anyhow::Result<()> {
        let mut lists = self.lists.lock().unwrap();
        let list = lists.entry(key.to_string()).or_default();
        for value in values.iter().rev() {
            list.push_front(value.clone());
        }
        Ok(())
    }

    async fn lrange_all(&self, key: &str) -> anyhow::Result<Vec<String>> {
        Ok(self
            .lists
            .lock()
            .unwrap()
            .get(key)
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn lrem(&self, key: &str, value: &str) -> anyhow::Result<()> {
        if let Some(list) = self.lists.lock().unwrap().get_mut(key) {
            list.retain(|v| v != value);
        }
        Ok(())
    }

    async fn llen(&self, key: &str) -> anyhow::Result<usize> {
        Ok(self.lists.lock().unwrap().get(key).map(|l| l.len()).unwrap_or(0))
    }

    async fn scan_keys(&self, pattern: &str) -> anyhow::Result<Vec<String>> {
        let prefix = pattern.trim_end_matches('*');
        let strings = self.strings.lock().unwrap();
        Ok(strings
            .iter()
            .filter(|(k, v)| k.starts_with(prefix) && Self::is_live(v))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn cas_delete(&self, key: &str, token: &str) -> anyhow::Result<bool> {
        let mut strings = self.strings.lock().unwrap();
        if strings.get(key).map(|e| e.value == token).unwrap_or(false) {
            strings.remove(key);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_nx_ex_rejects_when_already_set() {
        let store = InMemoryStore::new();
        assert!(store.set_nx_ex("k", "v1", 5).await.unwrap());
        assert!(!store.set_nx_ex("k", "v2", 5).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("v1".to_string()));
    }

    #[tokio::test]
    async fn list_fifo_order_preserved() {
        let store = InMemoryStore::new();
        store.rpush("q", "a").await.unwrap();
        store.rpush("q", "b").await.unwrap();
        store.rpush("q", "c").await.unwrap();
        assert_eq!(store.lpop("q", 2).await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.lrange_all("q").await.unwrap(), vec!["c"]);
    }

    #[tokio::test]
    async fn cas_delete_only_when_token_matches() {
        let store = InMemoryStore::new();
        store.set_ex("lock", "token-1", 5).await.unwrap();
        assert!(!store.cas_delete("lock", "token-2").await.unwrap());
        assert!(store.cas_delete("lock", "token-1").await.unwrap());
        assert!(!store.exists("lock").await.unwrap());
    }
}
