//! Sparse/dense retrieval, RRF fusion, cross-encoder reranking, and
//! speculative parent-document fetching (spec §4.4-4.6). Generalizes the
//! teacher's `rag` crate (hybrid retriever, early-exit reranker) from a
//! gold-loan product corpus to the legal-document domain; `qdrant-client`
//! and `tantivy` remain the dense/sparse backends, same as the teacher.

pub mod engine;
pub mod error;
pub mod fakes;
pub mod parent_fetcher;
pub mod qdrant_adapter;
pub mod reranker;
pub mod tantivy_adapter;

pub use engine::{enforce_parent_diversity, reciprocal_rank_fusion, RetrievalEngine, RetrieveRequest};
pub use error::RetrievalError;
pub use parent_fetcher::ParentFetcher;
pub use qdrant_adapter::QdrantDenseIndex;
pub use reranker::Reranker;
pub use tantivy_adapter::TantivySparseIndex;
