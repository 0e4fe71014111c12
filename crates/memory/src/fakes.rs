//! Deterministic in-process fakes for [`zimlex_core::ShortTermStore`] and
//! [`zimlex_core::ProfileStore`], mirroring the cache crate's
//! `InMemoryCacheStore`: a `DashMap`-backed adapter that satisfies the same
//! trait a production Redis/document-store adapter would, usable both as
//! the default no-backend-configured wiring and as the shared test fake.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Mutex;
use std::time::Duration;
use zimlex_core::{ProfileStore, Result, ShortTermStore};

#[derive(Default)]
pub struct FakeShortTermStore {
    lists: DashMap<String, Mutex<Vec<String>>>,
}

#[async_trait]
impl ShortTermStore for FakeShortTermStore {
    async fn push_front(&self, key: &str, value: String) -> Result<()> {
        self.lists
            .entry(key.to_string())
            .or_default()
            .lock()
            .unwrap()
            .insert(0, value);
        Ok(())
    }

    async fn trim(&self, key: &str, max_len: usize) -> Result<()> {
        if let Some(list) = self.lists.get(key) {
            list.lock().unwrap().truncate(max_len);
        }
        Ok(())
    }

    async fn range(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        let Some(list) = self.lists.get(key) else {
            return Ok(Vec::new());
        };
        let guard = list.lock().unwrap();
        if guard.is_empty() {
            return Ok(Vec::new());
        }
        let len = guard.len() as isize;
        let start = start.max(0) as usize;
        let stop = if stop < 0 { len + stop } else { stop };
        let stop = stop.clamp(0, len - 1) as usize;
        if start > stop {
            return Ok(Vec::new());
        }
        Ok(guard[start..=stop].to_vec())
    }

    async fn set_ttl(&self, _key: &str, _ttl: Duration) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeProfileStore {
    docs: DashMap<String, String>,
}

#[async_trait]
impl ProfileStore for FakeProfileStore {
    async fn get_document(&self, key: &str) -> Result<Option<String>> {
        Ok(self.docs.get(key).map(|v| v.clone()))
    }

    async fn put_document(&self, key: &str, value: String) -> Result<()> {
        self.docs.insert(key.to_string(), value);
        Ok(())
    }
}
