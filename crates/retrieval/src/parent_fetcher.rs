//! Speculative parent-document fetcher (spec §4.6): batch-resolve parent
//! documents from the object store, deduplicated and rank-ordered, with
//! bounded concurrency.

use std::collections::HashMap;
use std::sync::Arc;
use zimlex_core::{BundledContextItem, ObjectStore, ParentDocument, RetrievalResult};

const SPECULATIVE_WINDOW: usize = 15;
const PARENT_EXCERPT_CHARS: usize = 2000;

pub struct ParentFetcher {
    store: Arc<dyn ObjectStore>,
    concurrency: usize,
}

impl ParentFetcher {
    pub fn new(store: Arc<dyn ObjectStore>, concurrency: usize) -> Self {
        Self { store, concurrency }
    }

    /// Extract unique parent ids from the top 15 reranked chunks (or all,
    /// if fewer), preserving rank order, then issue one batched fetch.
    pub async fn prefetch(
        &self,
        reranked: &[RetrievalResult],
    ) -> HashMap<String, ParentDocument> {
        let window = &reranked[..reranked.len().min(SPECULATIVE_WINDOW)];
        let mut seen = std::collections::HashSet::new();
        let mut ordered_ids = Vec::new();
        for result in window {
            let id = result.parent_doc_id().to_string();
            if seen.insert(id.clone()) {
                ordered_ids.push(id);
            }
        }

        let mut cache = HashMap::new();
        for batch in ordered_ids.chunks(self.concurrency.max(1)) {
            match self.store.batch_get(batch).await {
                Ok(docs) => {
                    for (id, doc) in batch.iter().zip(docs) {
                        match doc {
                            Some(doc) => {
                                cache.insert(id.clone(), doc);
                            }
                            None => {
                                tracing::warn!(parent_doc_id = %id, "parent document fetch miss");
                            }
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, "batched parent fetch failed, falling back to per-id retry");
                    for id in batch {
                        if let Ok(mut single) = self.store.batch_get(std::slice::from_ref(id)).await {
                            if let Some(Some(doc)) = single.pop() {
                                cache.insert(id.clone(), doc);
                            }
                        }
                    }
                }
            }
        }
        cache
    }

    /// Build `bundled_context` from `topk_results` by reading from the
    /// prefetched `parent_doc_cache`, truncating each excerpt to
    /// [`PARENT_EXCERPT_CHARS`].
    pub fn bundle(
        topk_results: &[RetrievalResult],
        parent_doc_cache: &HashMap<String, ParentDocument>,
        warnings: &mut Vec<String>,
    ) -> Vec<BundledContextItem> {
        let mut bundled = Vec::with_capacity(topk_results.len());
        for result in topk_results {
            let parent_id = result.parent_doc_id();
            let Some(parent) = parent_doc_cache.get(parent_id) else {
                warnings.push(format!("no parent document resolved for {parent_id}"));
                continue;
            };
            let excerpt = truncate_chars(&parent.full_text, PARENT_EXCERPT_CHARS);
            bundled.push(BundledContextItem {
                chunk_id: result.chunk.chunk_id.clone(),
                parent_doc_id: parent_id.to_string(),
                title: parent.title.clone(),
                excerpt,
                confidence: result.confidence,
                source_type: format!("{:?}", result.source).to_lowercase(),
            });
        }
        bundled
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use zimlex_core::{AuthorityLevel, Chunk, DocType, RetrievalSource};

    struct FakeObjectStore {
        docs: HashMap<String, ParentDocument>,
    }

    #[async_trait]
    impl ObjectStore for FakeObjectStore {
        async fn batch_get(&self, doc_ids: &[String]) -> zimlex_core::Result<Vec<Option<ParentDocument>>> {
            Ok(doc_ids.iter().map(|id| self.docs.get(id).cloned()).collect())
        }
    }

    fn parent(id: &str) -> ParentDocument {
        ParentDocument {
            doc_id: id.to_string(),
            title: format!("Title {id}"),
            canonical_citation: format!("[Chapter 1:{id}]"),
            authority_level: AuthorityLevel::Binding,
            doc_type: DocType::Act,
            full_text: "a".repeat(3000),
            metadata: HashMap::new(),
        }
    }

    fn result(chunk_id: &str, parent_id: &str) -> RetrievalResult {
        RetrievalResult {
            chunk: Chunk {
                chunk_id: chunk_id.to_string(),
                parent_doc_id: parent_id.to_string(),
                content: "text".into(),
                doc_type: DocType::Act,
                section_path: None,
                language: "en".into(),
                metadata: HashMap::new(),
            },
            score: 0.5,
            confidence: 0.5,
            source: RetrievalSource::Fused,
        }
    }

    #[tokio::test]
    async fn prefetch_dedupes_parent_ids() {
        let mut docs = HashMap::new();
        docs.insert("p1".to_string(), parent("p1"));
        let fetcher = ParentFetcher::new(Arc::new(FakeObjectStore { docs }), 16);
        let reranked = vec![result("c1", "p1"), result("c2", "p1")];
        let cache = fetcher.prefetch(&reranked).await;
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn bundle_truncates_excerpt_and_logs_missing_parent() {
        let mut cache = HashMap::new();
        cache.insert("p1".to_string(), parent("p1"));
        let topk = vec![result("c1", "p1"), result("c2", "p2")];
        let mut warnings = Vec::new();
        let bundled = ParentFetcher::bundle(&topk, &cache, &mut warnings);
        assert_eq!(bundled.len(), 1);
        assert_eq!(bundled[0].excerpt.chars().count(), PARENT_EXCERPT_CHARS);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("p2"));
    }
}
