//! The four-layer semantic cache itself (spec §4.10).

use crate::normalize::{embedding_key, exact_key, exact_meta_key, intent_key, semantic_index_key};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use zimlex_core::CacheStore;

/// The full cached response payload plus its metadata record. `payload` is
/// kept as opaque JSON so this crate never needs to depend on the
/// orchestrator's response type — it only round-trips whatever the caller
/// hands it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub payload: serde_json::Value,
    pub cached_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheMeta {
    query: String,
    embedding: Vec<f32>,
    hit_count: i64,
}

/// Cached intent-classification result (spec §4.2, sub-cache).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentCacheEntry {
    pub payload: serde_json::Value,
}

/// Outcome of a cache lookup, distinguishing which layer produced the hit
/// (exact vs. similarity) since only the exact layer is a guaranteed
/// byte-identical round trip (§8's idempotence law).
#[derive(Debug, Clone)]
pub enum CacheLookup {
    Miss,
    Exact(CacheEntry),
    Similar(CacheEntry, f32),
}

pub struct SemanticCache {
    store: Arc<dyn CacheStore>,
    similarity_threshold: f32,
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl SemanticCache {
    pub fn new(store: Arc<dyn CacheStore>, similarity_threshold: f32) -> Self {
        Self {
            store,
            similarity_threshold,
        }
    }

    /// Layer 1 + 2: exact match, then embedding similarity (spec §4.10).
    /// `query_embedding` is supplied by the caller, which should have
    /// already consulted [`Self::get_embedding`] / [`Self::put_embedding`].
    pub async fn lookup(
        &self,
        raw_query: &str,
        normalized_query: &str,
        user_type: &str,
        query_embedding: Option<&[f32]>,
    ) -> CacheLookup {
        let _ = raw_query;
        let key = exact_key(user_type, normalized_query);
        match self.store.get(&key).await {
            Ok(Some(raw)) => {
                if let Ok(entry) = serde_json::from_str::<CacheEntry>(&raw) {
                    return CacheLookup::Exact(entry);
                }
                tracing::warn!(key, "cache entry failed to deserialize, treating as miss");
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(%err, "cache exact-match lookup failed, degrading to miss");
            }
        }

        let Some(embedding) = query_embedding else {
            return CacheLookup::Miss;
        };
        self.lookup_similar(user_type, embedding).await
    }

    async fn lookup_similar(&self, user_type: &str, query_embedding: &[f32]) -> CacheLookup {
        let index_key = semantic_index_key(user_type);
        let members = match self.store.set_members(&index_key).await {
            Ok(members) => members,
            Err(err) => {
                tracing::warn!(%err, "semantic index lookup failed, degrading to miss");
                return CacheLookup::Miss;
            }
        };

        let mut best: Option<(String, CacheMeta, f32)> = None;
        for exact_cache_key in members {
            let meta_key = format!("{}:meta", exact_cache_key);
            let Ok(Some(raw_meta)) = self.store.get(&meta_key).await else {
                continue;
            };
            let Ok(meta) = serde_json::from_str::<CacheMeta>(&raw_meta) else {
                continue;
            };
            let similarity = cosine_similarity(query_embedding, &meta.embedding);
            if similarity < self.similarity_threshold {
                continue;
            }
            if best.as_ref().map(|(_, _, s)| similarity > *s).unwrap_or(true) {
                best = Some((exact_cache_key, meta, similarity));
            }
        }

        let Some((exact_cache_key, _meta, similarity)) = best else {
            return CacheLookup::Miss;
        };

        let Ok(Some(raw_entry)) = self.store.get(&exact_cache_key).await else {
            return CacheLookup::Miss;
        };
        let Ok(entry) = serde_json::from_str::<CacheEntry>(&raw_entry) else {
            return CacheLookup::Miss;
        };

        let hit_key = format!("{}:meta:hits", exact_cache_key);
        if let Err(err) = self.store.incr(&hit_key).await {
            tracing::warn!(%err, "failed to record cache hit count");
        }

        CacheLookup::Similar(entry, similarity)
    }

    /// Populate the exact entry, the embedding metadata, and the semantic
    /// index (spec §4.10 "on cache write").
    pub async fn store(
        &self,
        normalized_query: &str,
        raw_query: &str,
        user_type: &str,
        payload: serde_json::Value,
        embedding: Vec<f32>,
        ttl: Duration,
    ) {
        let key = exact_key(user_type, normalized_query);
        let entry = CacheEntry {
            payload,
            cached_at: Utc::now(),
        };
        let Ok(serialized) = serde_json::to_string(&entry) else {
            tracing::warn!("failed to serialize cache entry, skipping write");
            return;
        };
        if let Err(err) = self.store.set_with_ttl(&key, serialized, ttl).await {
            tracing::warn!(%err, "cache write failed, treating as best-effort no-op");
            return;
        }

        let meta = CacheMeta {
            query: raw_query.to_string(),
            embedding,
            hit_count: 0,
        };
        if let Ok(serialized_meta) = serde_json::to_string(&meta) {
            let meta_key = exact_meta_key(user_type, normalized_query);
            let _ = self.store.set_with_ttl(&meta_key, serialized_meta, ttl).await;
        }

        let index_key = semantic_index_key(user_type);
        let _ = self.store.set_add(&index_key, key).await;
    }

    /// Layer 3: intent sub-cache, keyed by `md5(query_lower)`, TTL 2h.
    pub async fn get_intent(&self, query_lower: &str) -> Option<serde_json::Value> {
        let key = intent_key(query_lower);
        match self.store.get(&key).await {
            Ok(Some(raw)) => serde_json::from_str::<IntentCacheEntry>(&raw)
                .ok()
                .map(|e| e.payload),
            _ => None,
        }
    }

    pub async fn put_intent(&self, query_lower: &str, payload: serde_json::Value) {
        let key = intent_key(query_lower);
        let entry = IntentCacheEntry { payload };
        if let Ok(serialized) = serde_json::to_string(&entry) {
            let _ = self
                .store
                .set_with_ttl(&key, serialized, Duration::from_secs(7200))
                .await;
        }
    }

    /// Layer 4: embedding sub-cache, keyed by `md5(query_raw)`, TTL 1h.
    pub async fn get_embedding(&self, query_raw: &str) -> Option<Vec<f32>> {
        let key = embedding_key(query_raw);
        match self.store.get(&key).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).ok(),
            _ => None,
        }
    }

    pub async fn put_embedding(&self, query_raw: &str, embedding: &[f32]) {
        let key = embedding_key(query_raw);
        if let Ok(serialized) = serde_json::to_string(embedding) {
            let _ = self
                .store
                .set_with_ttl(&key, serialized, Duration::from_secs(3600))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inmemory::InMemoryCacheStore;
    use crate::normalize::normalize_query;
    use serde_json::json;

    fn cache() -> SemanticCache {
        SemanticCache::new(Arc::new(InMemoryCacheStore::new()), 0.95)
    }

    #[tokio::test]
    async fn exact_write_then_read_round_trips() {
        let cache = cache();
        let normalized = normalize_query("What is the minimum wage?");
        cache
            .store(
                &normalized,
                "What is the minimum wage?",
                "citizen",
                json!({"answer": "42"}),
                vec![0.1, 0.2, 0.3],
                Duration::from_secs(60),
            )
            .await;

        match cache.lookup("anything", &normalized, "citizen", None).await {
            CacheLookup::Exact(entry) => assert_eq!(entry.payload, json!({"answer": "42"})),
            other => panic!("expected exact hit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn similarity_hit_requires_threshold() {
        let cache = cache();
        let normalized = normalize_query("Can my employer fire me without a hearing?");
        cache
            .store(
                &normalized,
                "Can my employer fire me without a hearing?",
                "citizen",
                json!({"answer": "no"}),
                vec![1.0, 0.0, 0.0],
                Duration::from_secs(60),
            )
            .await;

        // Below threshold: orthogonal vector.
        let miss = cache.lookup("x", "different query", "citizen", Some(&[0.0, 1.0, 0.0])).await;
        assert!(matches!(miss, CacheLookup::Miss));

        // Above threshold: near-identical vector.
        let hit = cache
            .lookup("x", "different query text", "citizen", Some(&[0.999, 0.001, 0.0]))
            .await;
        assert!(matches!(hit, CacheLookup::Similar(_, sim) if sim >= 0.95));
    }

    #[tokio::test]
    async fn intent_sub_cache_round_trips() {
        let cache = cache();
        cache.put_intent("hello", json!({"intent": "conversational"})).await;
        let got = cache.get_intent("hello").await;
        assert_eq!(got, Some(json!({"intent": "conversational"})));
    }

    #[tokio::test]
    async fn embedding_sub_cache_round_trips() {
        let cache = cache();
        cache.put_embedding("raw query", &[0.1, 0.2]).await;
        let got = cache.get_embedding("raw query").await;
        assert_eq!(got, Some(vec![0.1, 0.2]));
    }

    #[test]
    fn cosine_similarity_boundary_is_inclusive() {
        let a = [1.0_f32, 0.0];
        let b = [1.0_f32, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }
}
