//! Retrieval-side external collaborators: the dense vector index, the
//! sparse keyword index, and the parent-document object store.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{DocType, ParentDocument};

/// Metadata filters drawn from a closed vocabulary (§4.4): document type,
/// optional year, optional chapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<DocType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
}

impl RetrievalFilters {
    pub fn with_doc_type(mut self, doc_type: DocType) -> Self {
        self.doc_type = Some(doc_type);
        self
    }
}

/// One hit from either index, before fusion: `(chunk_id, score, metadata)`.
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub chunk_id: String,
    pub score: f32,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// `search(query_embedding, top_k, filters) -> list[(chunk_id, score, metadata)]`.
/// Embedding dimension is a system constant owned by the adapter.
#[async_trait]
pub trait DenseIndex: Send + Sync + 'static {
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        filters: &RetrievalFilters,
    ) -> Result<Vec<IndexHit>>;
}

/// `search(query_text, top_k, field_boosts) -> list[(chunk_id, score, metadata)]`.
#[async_trait]
pub trait SparseIndex: Send + Sync + 'static {
    async fn search(
        &self,
        query_text: &str,
        top_k: usize,
        field_boosts: &HashMap<String, f32>,
        filters: &RetrievalFilters,
    ) -> Result<Vec<IndexHit>>;
}

/// `batch_get(list[parent_doc_id]) -> list[optional[parent document blob]]`.
/// Every implementation must be safe to call with an empty key list.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    async fn batch_get(&self, doc_ids: &[String]) -> Result<Vec<Option<ParentDocument>>>;
}
