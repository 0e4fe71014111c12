//! Deterministic in-process [`zimlex_core::CacheStore`] backed by
//! [`dashmap::DashMap`], matching the teacher's pattern of giving every
//! store trait both a production adapter and a `DashMap`-backed fake
//! behind the same trait. With no real KV backend in the workspace
//! dependency table (§6.1's "safe disabled mode"), this adapter *is* the
//! default production wiring when no external cache endpoint is
//! configured, and doubles as the test fake.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use zimlex_core::Result;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

/// An in-memory key-value store with TTL and set semantics.
#[derive(Default)]
pub struct InMemoryCacheStore {
    values: DashMap<String, Entry>,
    sets: DashMap<String, Vec<String>>,
    counters: DashMap<String, i64>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_live(entry: &Entry) -> bool {
        entry.expires_at.map(|at| Instant::now() < at).unwrap_or(true)
    }
}

#[async_trait]
impl zimlex_core::CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.values.get(key) {
            Some(entry) if Self::is_live(&entry) => Ok(Some(entry.value.clone())),
            Some(_) => {
                self.values.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.values.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let mut counter = self.counters.entry(key.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn set_add(&self, set_key: &str, member: String) -> Result<()> {
        let mut members = self.sets.entry(set_key.to_string()).or_default();
        if !members.contains(&member) {
            members.push(member);
        }
        Ok(())
    }

    async fn set_members(&self, set_key: &str) -> Result<Vec<String>> {
        Ok(self
            .sets
            .get(set_key)
            .map(|m| m.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zimlex_core::CacheStore;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = InMemoryCacheStore::new();
        store
            .set_with_ttl("k", "v".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn expired_entry_is_treated_as_miss() {
        let store = InMemoryCacheStore::new();
        store
            .set_with_ttl("k", "v".to_string(), Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn incr_is_monotonic() {
        let store = InMemoryCacheStore::new();
        assert_eq!(store.incr("hits").await.unwrap(), 1);
        assert_eq!(store.incr("hits").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn set_add_is_idempotent() {
        let store = InMemoryCacheStore::new();
        store.set_add("s", "a".to_string()).await.unwrap();
        store.set_add("s", "a".to_string()).await.unwrap();
        assert_eq!(store.set_members("s").await.unwrap(), vec!["a".to_string()]);
    }
}
