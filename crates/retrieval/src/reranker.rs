//! Cross-encoder reranking with quality threshold and diversity (spec
//! §4.5). Grounded on the teacher's `rag::reranker` cascaded early-exit
//! design: the `score < 0.3` filter and per-parent cap generalize that
//! cascade, and the upstream-confidence sort is the same shape as the
//! teacher's documented `SimpleScorer` fallback when the cross-encoder is
//! unavailable.

use crate::engine::enforce_parent_diversity;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use zimlex_core::{CrossEncoder, RetrievalResult};

const CROSS_ENCODER_DEADLINE: Duration = Duration::from_millis(400);
const QUALITY_THRESHOLD: f32 = 0.3;

pub struct Reranker {
    cross_encoder: Option<Arc<dyn CrossEncoder>>,
}

impl Reranker {
    pub fn new(cross_encoder: Option<Arc<dyn CrossEncoder>>) -> Self {
        Self { cross_encoder }
    }

    /// Rerank `candidates` for `query`, returning exactly `rerank_top_k`
    /// results (padded with the best remaining candidates if the
    /// quality/diversity filters leave too few).
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<RetrievalResult>,
        rerank_top_k: usize,
    ) -> (Vec<RetrievalResult>, bool) {
        if candidates.is_empty() {
            return (Vec::new(), true);
        }

        match self.score_with_cross_encoder(query, &candidates).await {
            Some(scored) => (finalize(scored, rerank_top_k), true),
            None => {
                // Fallback: sort by upstream fused confidence, diversity still
                // enforced (spec §4.5 failure mode).
                let mut fallback = candidates;
                fallback.sort_by(|a, b| {
                    b.confidence
                        .partial_cmp(&a.confidence)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                (finalize(fallback, rerank_top_k), false)
            }
        }
    }

    async fn score_with_cross_encoder(
        &self,
        query: &str,
        candidates: &[RetrievalResult],
    ) -> Option<Vec<RetrievalResult>> {
        let cross_encoder = self.cross_encoder.clone()?;
        let texts: Vec<String> = candidates.iter().map(|c| c.chunk.content.clone()).collect();
        let query = query.to_string();

        let scored = timeout(CROSS_ENCODER_DEADLINE, async move {
            cross_encoder.score(&query, &texts).await
        })
        .await
        .ok()?
        .ok()?;

        if scored.len() != candidates.len() {
            tracing::warn!(
                expected = candidates.len(),
                got = scored.len(),
                "cross-encoder returned mismatched score count, degrading to fallback"
            );
            return None;
        }

        let mut out = Vec::with_capacity(candidates.len());
        for (candidate, score) in candidates.iter().zip(scored) {
            let mut rescored = candidate.clone();
            rescored.confidence = score;
            out.push(rescored);
        }
        Some(out)
    }
}

/// Quality filter, diversity allocation (`⌈0.4 · rerank_top_k⌉` slots per
/// parent), then top-K selection — shared between the cross-encoder and
/// fallback paths.
fn finalize(mut scored: Vec<RetrievalResult>, rerank_top_k: usize) -> Vec<RetrievalResult> {
    scored.retain(|r| r.confidence >= QUALITY_THRESHOLD);
    scored.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));

    let max_per_parent = ((0.4 * rerank_top_k as f32).ceil() as usize).max(1);
    let diverse = enforce_parent_diversity(scored, max_per_parent);
    diverse.into_iter().take(rerank_top_k).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use zimlex_core::{Chunk, DocType, RetrievalSource};

    struct FakeCrossEncoder {
        scores: Vec<f32>,
    }

    #[async_trait]
    impl CrossEncoder for FakeCrossEncoder {
        async fn score(&self, _query: &str, batch: &[String]) -> zimlex_core::Result<Vec<f32>> {
            Ok(self.scores.iter().take(batch.len()).cloned().collect())
        }
    }

    fn candidate(id: &str, parent: &str, confidence: f32) -> RetrievalResult {
        RetrievalResult {
            chunk: Chunk {
                chunk_id: id.to_string(),
                parent_doc_id: parent.to_string(),
                content: "some legal text".into(),
                doc_type: DocType::Act,
                section_path: None,
                language: "en".into(),
                metadata: HashMap::new(),
            },
            score: confidence,
            confidence,
            source: RetrievalSource::Fused,
        }
    }

    #[tokio::test]
    async fn cross_encoder_scores_replace_confidence() {
        let reranker = Reranker::new(Some(Arc::new(FakeCrossEncoder {
            scores: vec![0.9, 0.1],
        })));
        let candidates = vec![candidate("c1", "p1", 0.2), candidate("c2", "p1", 0.8)];
        let (results, used_cross_encoder) = reranker.rerank("query", candidates, 5).await;
        assert!(used_cross_encoder);
        // c2 scored 0.1 falls below the 0.3 quality threshold and is dropped.
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.chunk_id, "c1");
    }

    #[tokio::test]
    async fn no_cross_encoder_falls_back_to_confidence_sort() {
        let reranker = Reranker::new(None);
        let candidates = vec![candidate("c1", "p1", 0.5), candidate("c2", "p1", 0.9)];
        let (results, used_cross_encoder) = reranker.rerank("query", candidates, 5).await;
        assert!(!used_cross_encoder);
        assert_eq!(results[0].chunk.chunk_id, "c2");
    }

    #[tokio::test]
    async fn diversity_cap_applies_during_finalize() {
        let reranker = Reranker::new(None);
        let candidates = vec![
            candidate("c1", "p1", 0.9),
            candidate("c2", "p1", 0.8),
            candidate("c3", "p1", 0.7),
            candidate("c4", "p2", 0.6),
        ];
        // rerank_top_k = 5 -> max_per_parent = ceil(0.4*5) = 2
        let (results, _) = reranker.rerank("query", candidates, 5).await;
        let p1_count = results.iter().filter(|r| r.parent_doc_id() == "p1").count();
        assert_eq!(p1_count, 2);
    }
}
