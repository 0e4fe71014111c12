//! Stateful external collaborators: the semantic cache's backing
//! key-value store, the short-term (session) store, and the long-term
//! profile store. These are distinct from the per-request, in-memory
//! `parent_doc_cache` on `AgentState` — they are process-wide, persistent,
//! and shared across requests.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Key-value store with TTL and set operations for the semantic index; must
/// support atomic increment for hit counts (§6).
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<()>;
    async fn incr(&self, key: &str) -> Result<i64>;
    async fn set_add(&self, set_key: &str, member: String) -> Result<()>;
    async fn set_members(&self, set_key: &str) -> Result<Vec<String>>;
}

/// List-semantics store supporting left-push, list-trim, list-range, and
/// per-key TTL (§6), backing short-term conversation memory.
#[async_trait]
pub trait ShortTermStore: Send + Sync + 'static {
    async fn push_front(&self, key: &str, value: String) -> Result<()>;
    async fn trim(&self, key: &str, max_len: usize) -> Result<()>;
    async fn range(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>>;
    async fn set_ttl(&self, key: &str, ttl: Duration) -> Result<()>;
}

/// Document store supporting atomic-increment and array-union updates
/// (§6), backing the long-term user profile.
#[async_trait]
pub trait ProfileStore: Send + Sync + 'static {
    async fn get_document(&self, key: &str) -> Result<Option<String>>;
    async fn put_document(&self, key: &str, value: String) -> Result<()>;
}
