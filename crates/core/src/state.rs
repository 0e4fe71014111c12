//! `AgentState`: the single carrier of one request's orchestration.
//!
//! Grouped into sub-structs mirroring the field groups in the data model
//! (identity / input / classification / rewrite / retrieval / parent
//! expansion / synthesis / quality / refinement / memory / cache flag) so a
//! node can borrow only the group it touches. A node never receives the
//! whole `AgentState` by value; it returns a [`NodeUpdate`], which the
//! orchestrator merges in declared order.

use crate::types::{Citation, Complexity, Intent, ReasoningFramework, RetrievalResult, UserType};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub const STATE_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityState {
    pub state_version: String,
    pub trace_id: String,
    pub user_id: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputState {
    pub raw_query: String,
    pub jurisdiction: Option<String>,
    pub date_context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationState {
    pub intent: Intent,
    pub complexity: Complexity,
    pub user_type: UserType,
    pub reasoning_framework: ReasoningFramework,
    pub confidence: f32,
    pub retrieval_top_k: usize,
    pub rerank_top_k: usize,
    pub legal_areas: HashSet<String>,
}

impl Default for ClassificationState {
    fn default() -> Self {
        Self {
            intent: Intent::Conversational,
            complexity: Complexity::Simple,
            user_type: UserType::Citizen,
            reasoning_framework: String::new(),
            confidence: 0.0,
            retrieval_top_k: 15,
            rerank_top_k: 5,
            legal_areas: HashSet::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewriteState {
    pub rewritten_query: String,
    pub hypothetical_docs: Vec<String>,
    pub sub_questions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalState {
    pub combined_results: Vec<RetrievalResult>,
    pub reranked_results: Vec<RetrievalResult>,
    pub reranked_chunk_ids: Vec<String>,
    pub topk_results: Vec<RetrievalResult>,
}

/// One entry of `bundled_context`: a parent excerpt ready for the
/// synthesis prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundledContextItem {
    pub chunk_id: String,
    pub parent_doc_id: String,
    pub title: String,
    pub excerpt: String,
    pub confidence: f32,
    pub source_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParentExpansionState {
    pub parent_doc_cache: HashMap<String, crate::types::ParentDocument>,
    pub bundled_context: Vec<BundledContextItem>,
    pub context_tokens: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesisState {
    pub final_answer: String,
    pub cited_sources: Vec<Citation>,
    pub tldr: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityState {
    pub quality_passed: bool,
    pub quality_confidence: f32,
    pub quality_issues: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefinementState {
    pub refinement_iteration: u8,
    pub refinement_instructions: Vec<String>,
    pub priority_fixes: Vec<String>,
    pub suggested_additions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryState {
    pub short_term_context: Vec<String>,
    pub long_term_profile_summary: Option<String>,
    pub memory_tokens_used: usize,
    pub conversation_topics: Vec<String>,
}

/// The single carrier of the orchestration, per §3 of the data model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub identity: IdentityState,
    pub input: InputState,
    pub classification: ClassificationState,
    pub rewrite: RewriteState,
    pub retrieval: RetrievalState,
    pub parent_expansion: ParentExpansionState,
    pub synthesis: SynthesisState,
    pub quality: QualityState,
    pub refinement: RefinementState,
    pub memory: MemoryState,
    pub from_cache: bool,
    pub warnings: Vec<String>,
}

impl AgentState {
    pub fn new(trace_id: String, user_id: String, session_id: String, raw_query: String) -> Self {
        Self {
            identity: IdentityState {
                state_version: STATE_VERSION.to_string(),
                trace_id,
                user_id,
                session_id,
            },
            input: InputState {
                raw_query,
                jurisdiction: None,
                date_context: None,
            },
            classification: ClassificationState::default(),
            rewrite: RewriteState::default(),
            retrieval: RetrievalState::default(),
            parent_expansion: ParentExpansionState::default(),
            synthesis: SynthesisState::default(),
            quality: QualityState::default(),
            refinement: RefinementState::default(),
            memory: MemoryState::default(),
            from_cache: false,
            warnings: Vec::new(),
        }
    }

    /// Invariant check (§3): `bundled_context` size never exceeds
    /// `rerank_top_k`.
    pub fn bundled_context_within_budget(&self) -> bool {
        self.parent_expansion.bundled_context.len() <= self.classification.rerank_top_k
    }
}

/// A node's partial update. Every group is optional; the orchestrator
/// applies only the groups a node actually touched, in graph-declared
/// order, per §5's ordering guarantees.
#[derive(Debug, Clone, Default)]
pub struct NodeUpdate {
    pub classification: Option<ClassificationState>,
    pub rewrite: Option<RewriteState>,
    pub retrieval: Option<RetrievalState>,
    pub parent_expansion: Option<ParentExpansionState>,
    pub synthesis: Option<SynthesisState>,
    pub quality: Option<QualityState>,
    pub refinement: Option<RefinementState>,
    pub memory: Option<MemoryState>,
    pub from_cache: Option<bool>,
    pub extra_warnings: Vec<String>,
}

impl NodeUpdate {
    pub fn apply(self, state: &mut AgentState) {
        if let Some(v) = self.classification {
            state.classification = v;
        }
        if let Some(v) = self.rewrite {
            state.rewrite = v;
        }
        if let Some(v) = self.retrieval {
            state.retrieval = v;
        }
        if let Some(v) = self.parent_expansion {
            state.parent_expansion = v;
        }
        if let Some(v) = self.synthesis {
            state.synthesis = v;
        }
        if let Some(v) = self.quality {
            state.quality = v;
        }
        if let Some(v) = self.refinement {
            state.refinement = v;
        }
        if let Some(v) = self.memory {
            state.memory = v;
        }
        if let Some(v) = self.from_cache {
            state.from_cache = v;
        }
        state.warnings.extend(self.extra_warnings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_state() -> AgentState {
        AgentState::new(
            "trace-1".into(),
            "user-1".into(),
            "session-1".into(),
            "what is the minimum wage?".into(),
        )
    }

    #[test]
    fn new_state_has_constant_version_and_zero_iteration() {
        let state = fresh_state();
        assert_eq!(state.identity.state_version, STATE_VERSION);
        assert_eq!(state.refinement.refinement_iteration, 0);
        assert!(!state.from_cache);
    }

    #[test]
    fn node_update_only_touches_declared_groups() {
        let mut state = fresh_state();
        let original_rewrite = state.rewrite.clone();
        let update = NodeUpdate {
            quality: Some(QualityState {
                quality_passed: true,
                quality_confidence: 0.9,
                quality_issues: vec![],
            }),
            ..Default::default()
        };
        update.apply(&mut state);
        assert!(state.quality.quality_passed);
        assert_eq!(state.rewrite.rewritten_query, original_rewrite.rewritten_query);
    }

    #[test]
    fn bundled_context_budget_invariant() {
        let mut state = fresh_state();
        state.classification.rerank_top_k = 2;
        state.parent_expansion.bundled_context = vec![
            BundledContextItem {
                chunk_id: "c1".into(),
                parent_doc_id: "p1".into(),
                title: "t".into(),
                excerpt: "e".into(),
                confidence: 0.5,
                source_type: "fused".into(),
            },
        ];
        assert!(state.bundled_context_within_budget());
        state.parent_expansion.bundled_context.push(BundledContextItem {
            chunk_id: "c2".into(),
            parent_doc_id: "p2".into(),
            title: "t".into(),
            excerpt: "e".into(),
            confidence: 0.5,
            source_type: "fused".into(),
        });
        state.parent_expansion.bundled_context.push(BundledContextItem {
            chunk_id: "c3".into(),
            parent_doc_id: "p3".into(),
            title: "t".into(),
            excerpt: "e".into(),
            confidence: 0.5,
            source_type: "fused".into(),
        });
        assert!(!state.bundled_context_within_budget());
    }
}
