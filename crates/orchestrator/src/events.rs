//! Streamed event types (spec §4.1, §6). An event stream MUST emit `meta`
//! first, MAY emit any number of `token`/`citation`/`warning` events, and
//! MUST emit exactly one `final` event at termination — enforced by
//! [`crate::orchestrator::Orchestrator`], not by this module.

use serde::Serialize;
use std::collections::HashMap;
use zimlex_core::Citation;

#[derive(Debug, Clone, Serialize)]
pub struct MetaPayload {
    pub trace_id: String,
    pub route: String,
    pub retrieval_top_k: usize,
    pub rerank_top_k: usize,
    pub wall_clock_budget_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SynthesisPayload {
    pub tldr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refinement_applied: Option<bool>,
    pub iteration_count: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimingsPayload {
    pub per_node_ms: HashMap<String, u64>,
    pub total_ms: u64,
}

/// The `final` event payload, exactly shaped per spec §6.
#[derive(Debug, Clone, Serialize)]
pub struct FinalPayload {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub confidence: f32,
    pub synthesis: SynthesisPayload,
    pub timings: TimingsPayload,
    pub from_cache: bool,
    pub warnings: Vec<String>,
}

/// One event in the outgoing stream, tagged by type for SSE serialization
/// (the server crate maps each variant to an `event:` line).
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Meta(MetaPayload),
    Token(String),
    Citation(Citation),
    Warning(String),
    Final(FinalPayload),
}
