//! The document and retrieval data model.
//!
//! `Chunk`, `ParentDocument`, `RetrievalResult`, and `Citation` are the four
//! shapes every downstream crate (retrieval, quality, orchestrator) passes
//! around. None of them owns any I/O: they are produced by the traits in
//! [`crate::traits`] and consumed read-only everywhere else.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Closed vocabulary of source document kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocType {
    Constitution,
    Act,
    Ordinance,
    StatutoryInstrument,
    CaseLaw,
    Other,
}

/// Authority level of a parent document, used by the synthesizer's
/// legal-hierarchy ordering (constitution > acts > statutory instruments >
/// case law by court rank).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityLevel {
    Supreme,
    Binding,
    Persuasive,
}

/// An immutable unit of retrievable text. Produced by the (out-of-scope)
/// ingestion pipeline, consumed read-only by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub parent_doc_id: String,
    pub content: String,
    pub doc_type: DocType,
    /// e.g. "Part II > Section 12A"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_path: Option<String>,
    pub language: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// The full document associated with one or more chunks. `doc_id` is the
/// canonical document identifier; invariant: one-to-one with the source
/// document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentDocument {
    pub doc_id: String,
    pub title: String,
    pub canonical_citation: String,
    pub authority_level: AuthorityLevel,
    pub doc_type: DocType,
    pub full_text: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Which provider a retrieval result came from. Modeled as a plain
/// discriminated enum rather than a payload-carrying variant: all three
/// variants wrap the same (chunk, score, confidence) shape, so the fuser
/// operates over the union by matching on this tag alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalSource {
    Sparse,
    Dense,
    Fused,
}

/// A (chunk, parent-handle, score, confidence, source) tuple produced by
/// retrieval. `score` is provider-native (BM25-like for sparse, cosine
/// similarity for dense); `confidence` is a normalized `[0, 1]` projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub score: f32,
    pub confidence: f32,
    pub source: RetrievalSource,
}

impl RetrievalResult {
    pub fn parent_doc_id(&self) -> &str {
        &self.chunk.parent_doc_id
    }
}

/// A resolved citation, emitted by synthesis and checked by the quality gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub doc_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet_range: Option<(usize, usize)>,
    pub confidence: f32,
}

/// Query intent, classified by the intent classifier (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Intent {
    Conversational,
    RagQa,
    ConstitutionalInterpretation,
    StatutoryAnalysis,
    CaseLawResearch,
    ProceduralInquiry,
    RightsInquiry,
    ContractAnalysis,
    LegalDrafting,
    Summarization,
}

/// Query complexity tier, drives the adaptive retrieval/rerank parameters
/// and token/time budgets throughout the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
    Expert,
}

impl Complexity {
    /// Adaptive `(retrieval_top_k, rerank_top_k)` per §4.2's table.
    pub fn topk_params(self) -> (usize, usize) {
        match self {
            Complexity::Simple => (15, 5),
            Complexity::Moderate => (25, 8),
            Complexity::Complex => (40, 12),
            Complexity::Expert => (50, 15),
        }
    }

    /// Synthesis token budget per §4.7.
    pub fn synthesis_token_budget(self) -> usize {
        match self {
            Complexity::Simple => 800,
            Complexity::Moderate => 2500,
            Complexity::Complex => 5000,
            Complexity::Expert => 8000,
        }
    }

    /// Full-response cache TTL, in seconds, per §3's Cache Entry lifecycle.
    pub fn cache_ttl_secs(self) -> u64 {
        match self {
            Complexity::Simple => 2 * 3600,
            Complexity::Moderate => 3600,
            Complexity::Complex => 30 * 60,
            Complexity::Expert => 15 * 60,
        }
    }

    /// Overall per-request wall-clock budget, in milliseconds, per §5.
    pub fn wall_clock_budget_ms(self) -> u64 {
        match self {
            Complexity::Simple => 1_500,
            Complexity::Moderate => 3_000,
            Complexity::Complex => 5_000,
            Complexity::Expert => 8_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Citizen,
    Professional,
}

/// A named analytical schema selected by intent (IRAC, statutory
/// interpretation, precedent analysis, constitutional interpretation, ...).
/// Kept as a free-form string rather than a closed enum: the set of
/// frameworks is an editorial decision made alongside prompt templates, not
/// a structural invariant the pipeline branches on.
pub type ReasoningFramework = String;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complexity_topk_params_match_table() {
        assert_eq!(Complexity::Simple.topk_params(), (15, 5));
        assert_eq!(Complexity::Moderate.topk_params(), (25, 8));
        assert_eq!(Complexity::Complex.topk_params(), (40, 12));
        assert_eq!(Complexity::Expert.topk_params(), (50, 15));
    }

    #[test]
    fn complexity_ordering_is_simple_to_expert() {
        assert!(Complexity::Simple < Complexity::Moderate);
        assert!(Complexity::Moderate < Complexity::Complex);
        assert!(Complexity::Complex < Complexity::Expert);
    }

    #[test]
    fn retrieval_result_parent_doc_id_delegates_to_chunk() {
        let chunk = Chunk {
            chunk_id: "c1".into(),
            parent_doc_id: "p1".into(),
            content: "text".into(),
            doc_type: DocType::Act,
            section_path: None,
            language: "en".into(),
            metadata: HashMap::new(),
        };
        let result = RetrievalResult {
            chunk,
            score: 1.0,
            confidence: 1.0,
            source: RetrievalSource::Dense,
        };
        assert_eq!(result.parent_doc_id(), "p1");
    }
}
