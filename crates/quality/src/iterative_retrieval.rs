//! Iterative retriever (spec §4.9): generates a gap-filling reformulation
//! from `quality_issues`, retrieves additional candidates through
//! `crates/retrieval`, and deduplicates against the existing result set.
//! Grounded on the teacher's `rag::agentic::AgenticRetriever` (iterative
//! sufficiency-checked retrieval loop bounded by `AgenticRagConfig`).

use std::collections::HashSet;
use zimlex_core::{DocType, RetrievalResult};
use zimlex_retrieval::{RetrievalEngine, RetrieveRequest};

const GAP_FILL_TOP_K: usize = 15;

/// Keyword → doc-type steering, checked in order against the issue text.
const DOC_TYPE_HINTS: &[(&str, DocType)] = &[
    ("no case law", DocType::CaseLaw),
    ("missing case law", DocType::CaseLaw),
    ("no precedent", DocType::CaseLaw),
    ("no statutory", DocType::Act),
    ("missing statute", DocType::Act),
    ("no constitutional", DocType::Constitution),
    ("missing constitutional", DocType::Constitution),
    ("no statutory instrument", DocType::StatutoryInstrument),
];

/// Builds a gap-filling query plus an optional steering doc-type filter from
/// the accumulated `quality_issues`.
pub fn build_gap_fill_request(rewritten_query: &str, quality_issues: &[String]) -> RetrieveRequest {
    let combined_issues = quality_issues.join(" ").to_lowercase();
    let doc_type = DOC_TYPE_HINTS
        .iter()
        .find(|(hint, _)| combined_issues.contains(hint))
        .map(|(_, doc_type)| *doc_type);

    let mut filters = zimlex_core::RetrievalFilters::default();
    if let Some(doc_type) = doc_type {
        filters = filters.with_doc_type(doc_type);
    }

    let gap_fill_query = format!("{rewritten_query} (additional authoritative sources)");

    RetrieveRequest {
        queries: vec![gap_fill_query],
        filters,
        top_k_dense: GAP_FILL_TOP_K,
        top_k_sparse: GAP_FILL_TOP_K,
        max_per_parent: 3,
        rrf_k: 60.0,
    }
}

pub struct IterativeRetriever<'a> {
    engine: &'a RetrievalEngine,
}

impl<'a> IterativeRetriever<'a> {
    pub fn new(engine: &'a RetrievalEngine) -> Self {
        Self { engine }
    }

    /// Retrieves up to 15 gap-filling candidates and merges them into
    /// `combined_results`, deduplicated by chunk id.
    pub async fn run(
        &self,
        rewritten_query: &str,
        quality_issues: &[String],
        combined_results: &mut Vec<RetrievalResult>,
    ) -> Vec<String> {
        let request = build_gap_fill_request(rewritten_query, quality_issues);
        match self.engine.retrieve(&request).await {
            Ok((new_candidates, warnings)) => {
                let existing_ids: HashSet<String> =
                    combined_results.iter().map(|r| r.chunk.chunk_id.clone()).collect();
                for candidate in new_candidates {
                    if !existing_ids.contains(&candidate.chunk.chunk_id) {
                        combined_results.push(candidate);
                    }
                }
                warnings
            }
            Err(err) => vec![format!("iterative retrieval degraded: {err}")],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_law_hint_steers_doc_type_filter() {
        let request = build_gap_fill_request("unfair dismissal", &["no case law cited for this claim".to_string()]);
        assert_eq!(request.filters.doc_type, Some(DocType::CaseLaw));
    }

    #[test]
    fn no_hint_leaves_filter_unset() {
        let request = build_gap_fill_request("unfair dismissal", &["attribution density too low".to_string()]);
        assert_eq!(request.filters.doc_type, None);
    }

    #[test]
    fn gap_fill_request_caps_top_k_at_fifteen() {
        let request = build_gap_fill_request("q", &[]);
        assert_eq!(request.top_k_dense, GAP_FILL_TOP_K);
        assert_eq!(request.top_k_sparse, GAP_FILL_TOP_K);
    }
}
