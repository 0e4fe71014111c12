//! Hybrid retrieval engine (spec §4.4): concurrent sparse + dense search,
//! Reciprocal Rank Fusion, and per-parent diversity enforcement at the
//! candidate stage. Generalizes the teacher's `rag::retriever::HybridRetriever`
//! (RRF fusion math, concurrent `tokio::join!` search) from its gold-loan
//! product corpus to the legal-document domain.

use crate::error::RetrievalError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use zimlex_core::{
    Chunk, DenseIndex, DocType, RetrievalFilters, RetrievalResult, RetrievalSource, SparseIndex,
};

const DENSE_DEADLINE: Duration = Duration::from_millis(500);
const SPARSE_DEADLINE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub struct RetrieveRequest {
    pub queries: Vec<String>,
    pub filters: RetrievalFilters,
    pub top_k_dense: usize,
    pub top_k_sparse: usize,
    pub max_per_parent: usize,
    pub rrf_k: f32,
}

impl Default for RetrieveRequest {
    fn default() -> Self {
        Self {
            queries: Vec::new(),
            filters: RetrievalFilters::default(),
            top_k_dense: 25,
            top_k_sparse: 25,
            max_per_parent: 3,
            rrf_k: 60.0,
        }
    }
}

pub struct RetrievalEngine {
    dense: Option<Arc<dyn DenseIndex>>,
    sparse: Option<Arc<dyn SparseIndex>>,
    embedder: Option<Arc<dyn zimlex_core::EmbeddingModel>>,
}

impl RetrievalEngine {
    pub fn new(
        dense: Option<Arc<dyn DenseIndex>>,
        sparse: Option<Arc<dyn SparseIndex>>,
        embedder: Option<Arc<dyn zimlex_core::EmbeddingModel>>,
    ) -> Self {
        Self {
            dense,
            sparse,
            embedder,
        }
    }

    /// `retrieve(queries, filters, top_k_dense, top_k_sparse, max_per_parent)
    /// -> list[RetrievalResult]` (spec §4.4). Per-variant RRF then union,
    /// per §9's chosen reading of the ambiguous fusion ordering.
    pub async fn retrieve(
        &self,
        request: &RetrieveRequest,
    ) -> Result<(Vec<RetrievalResult>, Vec<String>), RetrievalError> {
        let mut warnings = Vec::new();
        let mut per_variant_fused = Vec::new();

        for query in &request.queries {
            let (dense_hits, sparse_hits) = self.search_both(query, request, &mut warnings).await?;
            let fused = reciprocal_rank_fusion(&dense_hits, &sparse_hits, request.rrf_k);
            per_variant_fused.push(fused);
        }

        let unioned = union_fused(per_variant_fused);
        let diverse = enforce_parent_diversity(unioned, request.max_per_parent);
        Ok((diverse, warnings))
    }

    async fn search_both(
        &self,
        query: &str,
        request: &RetrieveRequest,
        warnings: &mut Vec<String>,
    ) -> Result<(Vec<RetrievalResult>, Vec<RetrievalResult>), RetrievalError> {
        let dense_fut = self.search_dense(query, request);
        let sparse_fut = self.search_sparse(query, request);
        let (dense_res, sparse_res) = tokio::join!(dense_fut, sparse_fut);

        let dense_hits = match dense_res {
            Ok(hits) => hits,
            Err(err) => {
                warnings.push(format!("dense retrieval degraded: {err}"));
                Vec::new()
            }
        };
        let sparse_hits = match sparse_res {
            Ok(hits) => hits,
            Err(err) => {
                warnings.push(format!("sparse retrieval degraded: {err}"));
                Vec::new()
            }
        };

        if self.dense.is_none() && self.sparse.is_none() {
            return Err(RetrievalError::InsufficientSources);
        }

        Ok((dense_hits, sparse_hits))
    }

    async fn search_dense(
        &self,
        query: &str,
        request: &RetrieveRequest,
    ) -> Result<Vec<RetrievalResult>, RetrievalError> {
        let Some(dense) = self.dense.clone() else {
            return Ok(Vec::new());
        };
        let Some(embedder) = self.embedder.clone() else {
            return Ok(Vec::new());
        };
        let query = query.to_string();
        let filters = request.filters.clone();
        let top_k = request.top_k_dense;

        let result = timeout(DENSE_DEADLINE, async move {
            let embedding = embedder
                .embed(&[query])
                .await
                .map_err(|e| RetrievalError::IndexUnavailable(e.to_string()))?;
            let Some(vector) = embedding.into_iter().next() else {
                return Ok(Vec::new());
            };
            let hits = dense
                .search(&vector, top_k, &filters)
                .await
                .map_err(|e| RetrievalError::IndexUnavailable(e.to_string()))?;
            Ok(hits
                .into_iter()
                .map(|hit| hit_to_result(hit, RetrievalSource::Dense))
                .collect::<Vec<_>>())
        })
        .await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(RetrievalError::IndexUnavailable("dense search timed out".into())),
        }
    }

    async fn search_sparse(
        &self,
        query: &str,
        request: &RetrieveRequest,
    ) -> Result<Vec<RetrievalResult>, RetrievalError> {
        let Some(sparse) = self.sparse.clone() else {
            return Ok(Vec::new());
        };
        let query = query.to_string();
        let filters = request.filters.clone();
        let top_k = request.top_k_sparse;

        let result = timeout(SPARSE_DEADLINE, async move {
            let hits = sparse
                .search(&query, top_k, &HashMap::new(), &filters)
                .await
                .map_err(|e| RetrievalError::IndexUnavailable(e.to_string()))?;
            Ok(hits
                .into_iter()
                .map(|hit| hit_to_result(hit, RetrievalSource::Sparse))
                .collect::<Vec<_>>())
        })
        .await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(RetrievalError::IndexUnavailable("sparse search timed out".into())),
        }
    }
}

fn hit_to_result(hit: zimlex_core::traits::retrieval::IndexHit, source: RetrievalSource) -> RetrievalResult {
    let doc_type = hit
        .metadata
        .get("doc_type")
        .and_then(|v| v.as_str())
        .and_then(parse_doc_type)
        .unwrap_or(DocType::Other);
    let parent_doc_id = hit
        .metadata
        .get("parent_doc_id")
        .and_then(|v| v.as_str())
        .unwrap_or(&hit.chunk_id)
        .to_string();
    let content = hit
        .metadata
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let language = hit
        .metadata
        .get("language")
        .and_then(|v| v.as_str())
        .unwrap_or("en")
        .to_string();
    let section_path = hit
        .metadata
        .get("section_path")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let chunk = Chunk {
        chunk_id: hit.chunk_id,
        parent_doc_id,
        content,
        doc_type,
        section_path,
        language,
        metadata: hit.metadata,
    };

    RetrievalResult {
        confidence: normalize_confidence(hit.score, source),
        chunk,
        score: hit.score,
        source,
    }
}

fn parse_doc_type(raw: &str) -> Option<DocType> {
    match raw {
        "constitution" => Some(DocType::Constitution),
        "act" => Some(DocType::Act),
        "ordinance" => Some(DocType::Ordinance),
        "statutory-instrument" => Some(DocType::StatutoryInstrument),
        "case-law" => Some(DocType::CaseLaw),
        _ => Some(DocType::Other),
    }
}

/// Dense cosine similarity is already `[-1, 1]`-ish and close to normalized;
/// sparse BM25-like scores are unbounded, so squash with a simple logistic
/// curve. Neither provider's native score is directly comparable, which is
/// exactly why downstream components consume `confidence`, not `score`.
fn normalize_confidence(score: f32, source: RetrievalSource) -> f32 {
    match source {
        RetrievalSource::Dense => score.clamp(0.0, 1.0),
        _ => 1.0 / (1.0 + (-score / 10.0).exp()),
    }
}

/// Reciprocal Rank Fusion: for each chunk, sum over providers of
/// `1 / (k + rank)`.
pub fn reciprocal_rank_fusion(
    dense: &[RetrievalResult],
    sparse: &[RetrievalResult],
    k: f32,
) -> Vec<RetrievalResult> {
    let mut fused: HashMap<String, (f32, RetrievalResult)> = HashMap::new();

    for (rank, result) in dense.iter().enumerate() {
        let contribution = 1.0 / (k + rank as f32 + 1.0);
        fused
            .entry(result.chunk.chunk_id.clone())
            .and_modify(|(score, _)| *score += contribution)
            .or_insert((contribution, result.clone()));
    }

    for (rank, result) in sparse.iter().enumerate() {
        let contribution = 1.0 / (k + rank as f32 + 1.0);
        fused
            .entry(result.chunk.chunk_id.clone())
            .and_modify(|(score, existing)| {
                *score += contribution;
                existing.source = RetrievalSource::Fused;
            })
            .or_insert_with(|| {
                let mut r = result.clone();
                r.source = RetrievalSource::Fused;
                (contribution, r)
            });
    }

    let mut out: Vec<RetrievalResult> = fused
        .into_iter()
        .map(|(_, (score, mut result))| {
            result.confidence = score;
            result
        })
        .collect();
    out.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
    out
}

/// Union multiple per-variant fused lists, keeping the best (highest
/// confidence) occurrence of each chunk id, then re-sorting.
pub fn union_fused(variants: Vec<Vec<RetrievalResult>>) -> Vec<RetrievalResult> {
    let mut best: HashMap<String, RetrievalResult> = HashMap::new();
    for variant in variants {
        for result in variant {
            best.entry(result.chunk.chunk_id.clone())
                .and_modify(|existing| {
                    if result.confidence > existing.confidence {
                        *existing = result.clone();
                    }
                })
                .or_insert(result);
        }
    }
    let mut out: Vec<RetrievalResult> = best.into_values().collect();
    out.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
    out
}

/// Enforce no more than `max_per_parent` chunks from the same parent
/// document in the candidate list, preserving rank order.
pub fn enforce_parent_diversity(
    candidates: Vec<RetrievalResult>,
    max_per_parent: usize,
) -> Vec<RetrievalResult> {
    let mut per_parent_count: HashMap<String, usize> = HashMap::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !seen.insert(candidate.chunk.chunk_id.clone()) {
            continue;
        }
        let count = per_parent_count
            .entry(candidate.parent_doc_id().to_string())
            .or_insert(0);
        if *count >= max_per_parent {
            continue;
        }
        *count += 1;
        out.push(candidate);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use zimlex_core::DocType;

    fn result(id: &str, parent: &str, confidence: f32, source: RetrievalSource) -> RetrievalResult {
        RetrievalResult {
            chunk: Chunk {
                chunk_id: id.to_string(),
                parent_doc_id: parent.to_string(),
                content: "text".into(),
                doc_type: DocType::Act,
                section_path: None,
                language: "en".into(),
                metadata: HashMap::new(),
            },
            score: confidence,
            confidence,
            source,
        }
    }

    #[test]
    fn rrf_fusion_sums_contributions_across_providers() {
        let dense = vec![result("c1", "p1", 0.9, RetrievalSource::Dense)];
        let sparse = vec![result("c1", "p1", 5.0, RetrievalSource::Sparse)];
        let fused = reciprocal_rank_fusion(&dense, &sparse, 60.0);
        assert_eq!(fused.len(), 1);
        let expected = 1.0 / 61.0 + 1.0 / 61.0;
        assert!((fused[0].confidence - expected).abs() < 1e-6);
        assert_eq!(fused[0].source, RetrievalSource::Fused);
    }

    #[test]
    fn rrf_fusion_orders_by_fused_score_descending() {
        let dense = vec![
            result("c1", "p1", 0.9, RetrievalSource::Dense),
            result("c2", "p2", 0.5, RetrievalSource::Dense),
        ];
        let sparse = vec![result("c2", "p2", 5.0, RetrievalSource::Sparse)];
        let fused = reciprocal_rank_fusion(&dense, &sparse, 60.0);
        assert_eq!(fused[0].chunk.chunk_id, "c2");
    }

    #[test]
    fn parent_diversity_cap_is_enforced() {
        let candidates = vec![
            result("c1", "p1", 0.9, RetrievalSource::Fused),
            result("c2", "p1", 0.8, RetrievalSource::Fused),
            result("c3", "p1", 0.7, RetrievalSource::Fused),
            result("c4", "p1", 0.6, RetrievalSource::Fused),
            result("c5", "p2", 0.5, RetrievalSource::Fused),
        ];
        let diverse = enforce_parent_diversity(candidates, 3);
        assert_eq!(diverse.len(), 4);
        let p1_count = diverse.iter().filter(|r| r.parent_doc_id() == "p1").count();
        assert_eq!(p1_count, 3);
    }

    #[test]
    fn union_fused_keeps_best_confidence_per_chunk() {
        let variant_a = vec![result("c1", "p1", 0.3, RetrievalSource::Fused)];
        let variant_b = vec![result("c1", "p1", 0.9, RetrievalSource::Fused)];
        let unioned = union_fused(vec![variant_a, variant_b]);
        assert_eq!(unioned.len(), 1);
        assert!((unioned[0].confidence - 0.9).abs() < 1e-6);
    }
}
