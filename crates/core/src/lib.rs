//! Core traits and types for the legal question-answering orchestrator
//!
//! This crate provides foundational types shared across every other crate:
//! - the document model (chunks, parent documents, retrieval results, citations)
//! - the agent state carried through the orchestration pipeline
//! - trait contracts for every external collaborator (indexes, stores, models)
//! - the crate-wide error type

pub mod error;
pub mod state;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use state::{
    AgentState, BundledContextItem, ClassificationState, IdentityState, InputState, MemoryState,
    NodeUpdate, ParentExpansionState, QualityState, RefinementState, RetrievalState,
    RewriteState, SynthesisState,
};
pub use types::{
    AuthorityLevel, Chunk, Citation, Complexity, DocType, Intent, ParentDocument,
    ReasoningFramework, RetrievalResult, RetrievalSource, UserType,
};
pub use traits::{
    CacheStore, CrossEncoder, DenseIndex, EmbeddingModel, LlmBackend, ObjectStore, ProfileStore,
    ShortTermStore, SparseIndex,
};
pub use traits::retrieval::RetrievalFilters;
