//! Process-wide singleton wiring (spec §5 "Shared resources", §9
//! "Process-wide singletons"). Built once at startup from [`Settings`] and
//! shared (via `Arc`) across every concurrent request the orchestrator
//! serves — mirroring the teacher's `AppState` construction in
//! `server::state`.

use std::sync::Arc;
use std::time::Duration;

use zimlex_cache::{InMemoryCacheStore, SemanticCache};
use zimlex_config::Settings;
use zimlex_core::{CacheStore, CrossEncoder, DenseIndex, EmbeddingModel, LlmBackend, ObjectStore, SparseIndex};
use zimlex_llm::{ClaudeBackend, ClaudeConfig, ClaudeModel, DisabledLlmBackend, HashingEmbeddingModel, HttpEmbeddingConfig, HttpEmbeddingModel};
use zimlex_memory::{LongTermMemory, MemoryCoordinator, ShortTermMemory};
use zimlex_nlp::{IntentClassifier, QueryRewriter};
use zimlex_quality::{QualityGate, SelfCritic};
use zimlex_retrieval::fakes::FixedObjectStore;
use zimlex_retrieval::{ParentFetcher, QdrantDenseIndex, Reranker, RetrievalEngine, TantivySparseIndex};

use crate::error::OrchestratorError;

/// Everything the orchestrator's node graph reads from or calls into.
/// Intentionally flat rather than nested per-component config: every node
/// function takes exactly the collaborators it needs from here, the same
/// shallow `AppState` shape the teacher's `server::state::AppState` uses.
pub struct Dependencies {
    pub settings: Settings,
    pub cache: Arc<SemanticCache>,
    pub memory: Arc<MemoryCoordinator>,
    /// Held separately from `memory` so the orchestrator can append a turn
    /// / update a profile without `MemoryCoordinator` needing to expose
    /// write methods alongside its read-only `fetch`.
    pub short_term: ShortTermMemory,
    pub long_term: Arc<LongTermMemory>,
    pub intent_classifier: Arc<IntentClassifier>,
    pub query_rewriter: Arc<QueryRewriter>,
    pub retrieval_engine: Arc<RetrievalEngine>,
    pub reranker: Arc<Reranker>,
    pub parent_fetcher: Arc<ParentFetcher>,
    pub embedding_model: Arc<dyn EmbeddingModel>,
    pub small_model: Arc<dyn LlmBackend>,
    pub large_model: Arc<dyn LlmBackend>,
    pub quality_gate: Arc<QualityGate>,
    pub self_critic: Arc<SelfCritic>,
    pub refined_synthesizer: Arc<zimlex_quality::RefinedSynthesizer>,
}

impl Dependencies {
    /// Builds every singleton from `settings`. Every external backend that
    /// is not `is_configured()` resolves to the crate-local disabled-mode
    /// adapter (empty index, in-memory store, refusal model) rather than
    /// failing construction — per §6's "every backend has a safe disabled
    /// mode".
    pub fn build(settings: Settings) -> Result<Self, OrchestratorError> {
        let embedding_model = build_embedding_model(&settings)?;
        let dense_index = build_dense_index(&settings)?;
        let sparse_index = build_sparse_index(&settings)?;
        let object_store = build_object_store(&settings);
        let cache_store = build_cache_store(&settings);
        let short_term_store = zimlex_memory::fakes::FakeShortTermStore::default();
        let profile_store = zimlex_memory::fakes::FakeProfileStore::default();

        let small_model = build_llm(&settings.llm.small.backend, &settings.llm.small.model, "small")?;
        let large_model = build_llm(&settings.llm.large.backend, &settings.llm.large.model, "large")?;
        let cross_encoder: Option<Arc<dyn CrossEncoder>> = None;

        let cache = Arc::new(SemanticCache::new(cache_store, settings.cache.similarity_threshold));
        let short_term = ShortTermMemory::new(Arc::new(short_term_store), settings.memory.short_term_window);
        let profile_store: Arc<dyn zimlex_core::ProfileStore> = Arc::new(profile_store);
        let memory = Arc::new(MemoryCoordinator::new(short_term, LongTermMemory::new(profile_store.clone())));

        let long_term_for_classifier = Arc::new(LongTermMemory::new(profile_store));
        let intent_classifier = Arc::new(IntentClassifier::new(
            cache.clone(),
            long_term_for_classifier.clone(),
            small_model.clone(),
        ));
        let query_rewriter = Arc::new(QueryRewriter::new(small_model.clone()));
        let retrieval_engine = Arc::new(RetrievalEngine::new(dense_index, sparse_index, Some(embedding_model.clone())));
        let reranker = Arc::new(Reranker::new(cross_encoder));
        let parent_fetcher = Arc::new(ParentFetcher::new(object_store, settings.retrieval.parent_fetch_concurrency));
        let quality_gate = Arc::new(QualityGate::new(small_model.clone()));
        let self_critic = Arc::new(SelfCritic::new(small_model.clone()));
        let refined_synthesizer = Arc::new(zimlex_quality::RefinedSynthesizer::new(large_model.clone()));

        Ok(Self {
            settings,
            cache,
            memory,
            short_term,
            long_term: long_term_for_classifier,
            intent_classifier,
            query_rewriter,
            retrieval_engine,
            reranker,
            parent_fetcher,
            embedding_model,
            small_model,
            large_model,
            quality_gate,
            self_critic,
            refined_synthesizer,
        })
    }
}

fn build_embedding_model(settings: &Settings) -> Result<Arc<dyn EmbeddingModel>, OrchestratorError> {
    let backend = &settings.retrieval.embedding_model;
    if backend.is_configured() {
        let model = HttpEmbeddingModel::new(HttpEmbeddingConfig {
            endpoint: backend.endpoint.clone().unwrap_or_default(),
            api_key: backend.api_key.clone().unwrap_or_default(),
            model: "default".to_string(),
            dimension: zimlex_llm::embedding::DEFAULT_DIMENSION,
            timeout: Duration::from_secs(5),
        })
        .map_err(|e| OrchestratorError::Wiring(e.to_string()))?;
        Ok(Arc::new(model))
    } else {
        Ok(Arc::new(HashingEmbeddingModel::default()))
    }
}

fn build_dense_index(settings: &Settings) -> Result<Option<Arc<dyn DenseIndex>>, OrchestratorError> {
    let backend = &settings.retrieval.dense_index;
    if !backend.is_configured() {
        return Ok(None);
    }
    let index = QdrantDenseIndex::new(
        backend.endpoint.as_deref().unwrap_or_default(),
        backend.api_key.as_deref(),
        &settings.retrieval.dense_collection,
    )
    .map_err(|e| OrchestratorError::Wiring(e.to_string()))?;
    Ok(Some(Arc::new(index)))
}

fn build_sparse_index(settings: &Settings) -> Result<Option<Arc<dyn SparseIndex>>, OrchestratorError> {
    let Some(path) = &settings.retrieval.sparse_index_path else {
        return Ok(None);
    };
    let index = TantivySparseIndex::open(path).map_err(|e| OrchestratorError::Wiring(e.to_string()))?;
    Ok(Some(Arc::new(index)))
}

fn build_object_store(_settings: &Settings) -> Arc<dyn ObjectStore> {
    // No production object-store adapter is built: parent-document blob
    // storage is owned by the out-of-scope ingestion pipeline and this
    // workspace only ever reads it through the `ObjectStore` trait.
    // `FixedObjectStore`'s safe-disabled-mode ("miss for every id, logged
    // as a warning by `ParentFetcher`") is the correct default when no
    // adapter is wired, per §6's "every backend has a safe disabled mode".
    Arc::new(FixedObjectStore::default())
}

fn build_cache_store(_settings: &Settings) -> Arc<dyn CacheStore> {
    Arc::new(InMemoryCacheStore::new())
}

fn build_llm(backend: &zimlex_config::BackendConfig, model: &str, tier_name: &str) -> Result<Arc<dyn LlmBackend>, OrchestratorError> {
    if !backend.is_configured() {
        return Ok(Arc::new(DisabledLlmBackend::new(tier_name)));
    }
    let claude_model = ClaudeModel::from_str(model).unwrap_or(ClaudeModel::Sonnet4);
    let config = ClaudeConfig {
        api_key: backend.api_key.clone().unwrap_or_default(),
        model: claude_model,
        endpoint: backend
            .endpoint
            .clone()
            .unwrap_or_else(|| "https://api.anthropic.com/v1/messages".to_string()),
        timeout: Duration::from_secs(30),
        tier_name: tier_name.to_string(),
    };
    let backend = ClaudeBackend::new(config).map_err(|e| OrchestratorError::Wiring(e.to_string()))?;
    Ok(Arc::new(backend))
}
