//! Trait contracts for every external collaborator named in the external
//! interfaces section: vector index, sparse index, object store, LLM,
//! embedding model, cross-encoder, cache store, short-term store, profile
//! store. Each crate that needs one of these depends only on `zimlex-core`
//! and is handed a `Arc<dyn Trait>` by the server's startup wiring —
//! production adapters and deterministic test fakes both implement the same
//! trait.

pub mod llm;
pub mod retrieval;
pub mod store;

pub use llm::{CrossEncoder, EmbeddingModel, LlmBackend};
pub use retrieval::{DenseIndex, ObjectStore, SparseIndex};
pub use store::{CacheStore, ProfileStore, ShortTermStore};
