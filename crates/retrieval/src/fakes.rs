//! Deterministic in-process fakes for the retrieval-side external
//! collaborators, usable both as disabled-mode wiring (§6's "every backend
//! has a safe disabled mode") and as shared test fixtures for downstream
//! crates (`orchestrator`, `server`).

use async_trait::async_trait;
use std::collections::HashMap;
use zimlex_core::traits::retrieval::IndexHit;
use zimlex_core::{DenseIndex, ObjectStore, ParentDocument, Result, RetrievalFilters, SparseIndex};

/// Always returns an empty result set — the "disabled" dense/sparse index.
#[derive(Default)]
pub struct EmptyDenseIndex;

#[async_trait]
impl DenseIndex for EmptyDenseIndex {
    async fn search(&self, _q: &[f32], _top_k: usize, _filters: &RetrievalFilters) -> Result<Vec<IndexHit>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub struct EmptySparseIndex;

#[async_trait]
impl SparseIndex for EmptySparseIndex {
    async fn search(
        &self,
        _q: &str,
        _top_k: usize,
        _boosts: &HashMap<String, f32>,
        _filters: &RetrievalFilters,
    ) -> Result<Vec<IndexHit>> {
        Ok(Vec::new())
    }
}

/// In-memory dense index over pre-supplied hits, for tests that need a
/// deterministic non-empty retrieval path without a real vector backend.
#[derive(Default)]
pub struct FixedDenseIndex {
    pub hits: Vec<IndexHit>,
}

#[async_trait]
impl DenseIndex for FixedDenseIndex {
    async fn search(&self, _q: &[f32], top_k: usize, _filters: &RetrievalFilters) -> Result<Vec<IndexHit>> {
        Ok(self.hits.iter().take(top_k).cloned().collect())
    }
}

#[derive(Default)]
pub struct FixedSparseIndex {
    pub hits: Vec<IndexHit>,
}

#[async_trait]
impl SparseIndex for FixedSparseIndex {
    async fn search(
        &self,
        _q: &str,
        top_k: usize,
        _boosts: &HashMap<String, f32>,
        _filters: &RetrievalFilters,
    ) -> Result<Vec<IndexHit>> {
        Ok(self.hits.iter().take(top_k).cloned().collect())
    }
}

#[derive(Default)]
pub struct FixedObjectStore {
    pub docs: HashMap<String, ParentDocument>,
}

#[async_trait]
impl ObjectStore for FixedObjectStore {
    async fn batch_get(&self, doc_ids: &[String]) -> Result<Vec<Option<ParentDocument>>> {
        Ok(doc_ids.iter().map(|id| self.docs.get(id).cloned()).collect())
    }
}
