//! The orchestrator state machine (spec §4, §5): the node graph that
//! `run_query_streaming` drives end to end. Shaped like the teacher's
//! `pipeline::Pipeline::run` — a single async function stepping a mutable
//! state through named stages, each stage's duration folded into a timings
//! map — generalized from the teacher's turn-taking voice pipeline to this
//! system's classify/retrieve/rerank/synthesize/quality-gate loop.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::mpsc;

use zimlex_cache::{normalize_query, CacheLookup};
use zimlex_core::state::BundledContextItem;
use zimlex_core::{
    AgentState, Citation, ClassificationState, Complexity, Intent, LlmBackend, MemoryState,
    NodeUpdate, ParentExpansionState, QualityState, RefinementState, RetrievalFilters,
    RetrievalResult, RetrievalState, RewriteState, SynthesisState, UserType,
};
use zimlex_llm::{prompt, SpeculativeSynthesizer};
use zimlex_memory::{Message, QueryMetadata, Role};
use zimlex_nlp::adaptive_params;
use zimlex_quality::IterativeRetriever;
use zimlex_retrieval::{ParentFetcher, RetrieveRequest};

use crate::decision::{decide, Decision};
use crate::deps::Dependencies;
use crate::events::{FinalPayload, MetaPayload, StreamEvent, SynthesisPayload, TimingsPayload};
use crate::request::QueryRequest;

const LOW_CONFIDENCE_THRESHOLD: f32 = 0.5;
const LOW_CONFIDENCE_DISCLAIMER: &str = "This information is general in nature. Given the \
    complexity or uncertainty involved, consulting a qualified Zimbabwean legal practitioner is \
    advisable.";
const MAX_OUTER_ITERATIONS: u8 = 3;

static CITATION_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]").unwrap());

/// Drives one request's full node graph from a [`Dependencies`] bundle built
/// once at startup and shared across every concurrent request.
pub struct Orchestrator {
    deps: Arc<Dependencies>,
}

impl Orchestrator {
    pub fn new(deps: Dependencies) -> Self {
        Self { deps: Arc::new(deps) }
    }

    /// Spawns the pipeline and returns the receiving half of its event
    /// channel immediately; the sender side is driven from a detached task
    /// so a slow or disconnected consumer never blocks request intake.
    pub async fn run_query_streaming(&self, request: QueryRequest) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(256);
        let deps = self.deps.clone();
        tokio::spawn(async move {
            run(deps, request, tx).await;
        });
        rx
    }
}

async fn run(deps: Arc<Dependencies>, request: QueryRequest, tx: mpsc::Sender<StreamEvent>) {
    let start = Instant::now();
    let trace_id = request.trace_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut state = AgentState::new(
        trace_id.clone(),
        request.user_id.clone(),
        request.session_id.clone(),
        request.raw_query.clone(),
    );
    state.input.jurisdiction = request.jurisdiction.clone();
    state.input.date_context = request.date_context.clone();

    let classification = deps.intent_classifier.classify(&request.raw_query, &request.user_id).await;
    let (retrieval_top_k, rerank_top_k) = adaptive_params(classification.complexity);
    let legal_areas = legal_areas_for(classification.intent);

    NodeUpdate {
        classification: Some(ClassificationState {
            intent: classification.intent,
            complexity: classification.complexity,
            user_type: classification.user_type,
            reasoning_framework: classification.reasoning_framework.clone(),
            confidence: classification.confidence,
            retrieval_top_k,
            rerank_top_k,
            legal_areas: legal_areas.clone(),
        }),
        ..Default::default()
    }
    .apply(&mut state);

    let wall_clock_budget_ms = classification.complexity.wall_clock_budget_ms();
    let deadline = start + Duration::from_millis(wall_clock_budget_ms);

    let _ = tx
        .send(StreamEvent::Meta(MetaPayload {
            trace_id: trace_id.clone(),
            route: route_name(classification.intent),
            retrieval_top_k,
            rerank_top_k,
            wall_clock_budget_ms,
        }))
        .await;

    if matches!(classification.intent, Intent::Conversational) {
        run_conversational(&deps, &request, &mut state, &tx, start).await;
        return;
    }

    let normalized_query = normalize_query(&request.raw_query);
    let user_type_str = user_type_str(classification.user_type);

    if deps.settings.features.semantic_cache {
        let embedding = get_or_compute_embedding(&deps, &request.raw_query).await;
        let lookup = deps
            .cache
            .lookup(&request.raw_query, &normalized_query, user_type_str, embedding.as_deref())
            .await;
        if let Some(entry) = cache_hit_entry(lookup) {
            if let Ok(cached) = serde_json::from_value::<CachedPayload>(entry.payload) {
                state.from_cache = true;
                finish_from_cache(&deps, &request, &classification, &legal_areas, cached, &tx, start).await;
                return;
            }
        }
    }

    run_pipeline(
        deps,
        request,
        state,
        classification.complexity,
        classification.user_type,
        classification.reasoning_framework.clone(),
        legal_areas,
        retrieval_top_k,
        rerank_top_k,
        normalized_query,
        user_type_str.to_string(),
        tx,
        start,
        deadline,
    )
    .await;
}

/// Greeting / empty-input short-circuit: no retrieval, rerank, or synthesis
/// node runs (per §4.1's conversational invariant).
async fn run_conversational(
    deps: &Dependencies,
    request: &QueryRequest,
    state: &mut AgentState,
    tx: &mpsc::Sender<StreamEvent>,
    start: Instant,
) {
    let answer = if request.raw_query.trim().is_empty() {
        empty_query_answer()
    } else {
        greeting_answer()
    };
    let confidence = if request.raw_query.trim().is_empty() { 0.3 } else { 0.9 };

    let _ = tx.send(StreamEvent::Token(answer.clone())).await;

    state.synthesis = SynthesisState {
        final_answer: answer.clone(),
        cited_sources: Vec::new(),
        tldr: make_tldr(&answer),
    };
    state.quality = QualityState {
        quality_passed: true,
        quality_confidence: confidence,
        quality_issues: Vec::new(),
    };

    let payload = FinalPayload {
        answer: answer.clone(),
        citations: Vec::new(),
        confidence,
        synthesis: SynthesisPayload {
            tldr: state.synthesis.tldr.clone(),
            refinement_applied: None,
            iteration_count: 0,
        },
        timings: TimingsPayload {
            per_node_ms: [("classify".to_string(), start.elapsed().as_millis() as u64)].into(),
            total_ms: start.elapsed().as_millis() as u64,
        },
        from_cache: false,
        warnings: state.warnings.clone(),
    };
    let _ = tx.send(StreamEvent::Final(payload)).await;

    let short_term = deps.short_term.clone();
    let session_id = request.session_id.clone();
    let user_query = request.raw_query.clone();
    tokio::spawn(async move {
        let _ = short_term.append(&session_id, Role::User, &user_query, serde_json::Value::Null).await;
        let _ = short_term.append(&session_id, Role::Assistant, &answer, serde_json::Value::Null).await;
    });
}

#[allow(clippy::too_many_arguments)]
async fn run_pipeline(
    deps: Arc<Dependencies>,
    request: QueryRequest,
    mut state: AgentState,
    complexity: Complexity,
    user_type: UserType,
    reasoning_framework: String,
    legal_areas: HashSet<String>,
    retrieval_top_k: usize,
    rerank_top_k: usize,
    normalized_query: String,
    user_type_str: String,
    tx: mpsc::Sender<StreamEvent>,
    start: Instant,
    deadline: Instant,
) {
    let mut per_node_ms = std::collections::HashMap::new();

    let t_memory = Instant::now();
    let memory_ctx = deps
        .memory
        .fetch(&request.session_id, &request.user_id, deps.settings.memory.memory_token_budget)
        .await;
    per_node_ms.insert("memory_fetch".to_string(), t_memory.elapsed().as_millis() as u64);

    NodeUpdate {
        memory: Some(MemoryState {
            short_term_context: messages_to_strings(&memory_ctx.short_term_context),
            long_term_profile_summary: memory_ctx.is_returning_user.then(|| {
                format!(
                    "returning user, typical complexity {:?}, top interests: {:?}",
                    memory_ctx.typical_complexity, memory_ctx.top_legal_interests
                )
            }),
            memory_tokens_used: memory_ctx.tokens_used,
            conversation_topics: memory_ctx.top_legal_interests.clone(),
        }),
        ..Default::default()
    }
    .apply(&mut state);

    let t_rewrite = Instant::now();
    let rewritten = deps.query_rewriter.rewrite(&request.raw_query, &memory_ctx.short_term_context).await;
    per_node_ms.insert("rewrite".to_string(), t_rewrite.elapsed().as_millis() as u64);

    NodeUpdate {
        rewrite: Some(RewriteState {
            rewritten_query: rewritten.rewritten_query.clone(),
            hypothetical_docs: rewritten.hypothetical_docs.clone(),
            sub_questions: rewritten.sub_questions.clone(),
        }),
        ..Default::default()
    }
    .apply(&mut state);

    let mut queries = vec![rewritten.rewritten_query.clone()];
    queries.extend(rewritten.hypothetical_docs.iter().cloned());
    queries.extend(rewritten.sub_questions.iter().cloned());

    let initial_request = RetrieveRequest {
        queries,
        filters: RetrievalFilters::default(),
        top_k_dense: retrieval_top_k,
        top_k_sparse: retrieval_top_k,
        max_per_parent: deps.settings.retrieval.max_per_parent,
        rrf_k: deps.settings.retrieval.rrf_k,
    };

    let t_retrieve = Instant::now();
    let mut combined_results: Vec<RetrievalResult> = match deps.retrieval_engine.retrieve(&initial_request).await {
        Ok((results, warnings)) => {
            state.warnings.extend(warnings);
            results
        }
        Err(err) => {
            state.warnings.push(format!("retrieval unavailable: {err}"));
            Vec::new()
        }
    };
    per_node_ms.insert("retrieve".to_string(), t_retrieve.elapsed().as_millis() as u64);

    let synthesizer = SpeculativeSynthesizer::new(
        deps.large_model.clone(),
        deps.small_model.clone(),
        deps.settings.llm.first_token_deadline_ms,
    );
    let system_prompt = prompt::system_prompt(complexity, &reasoning_framework, user_type);
    let short_term_strings = messages_to_strings(&memory_ctx.short_term_context);
    let max_tokens = complexity.synthesis_token_budget();

    let mut final_answer = String::new();
    let mut cited_sources: Vec<Citation> = Vec::new();
    let mut refinement_applied = false;
    let mut outer_iteration: u8 = 0;

    loop {
        outer_iteration += 1;
        if outer_iteration > MAX_OUTER_ITERATIONS || Instant::now() >= deadline {
            state.warnings.push("wall-clock budget exhausted, returning best-effort answer".to_string());
            if final_answer.is_empty() {
                final_answer = refusal_answer("The retrieval and synthesis budget was exhausted before a confident answer could be produced.");
            }
            break;
        }

        let t_rerank = Instant::now();
        let (reranked, _used_cross_encoder) =
            deps.reranker.rerank(&rewritten.rewritten_query, combined_results.clone(), rerank_top_k).await;
        per_node_ms.insert("rerank".to_string(), t_rerank.elapsed().as_millis() as u64);

        if reranked.is_empty() {
            final_answer = refusal_answer("No sufficiently relevant sources were retrieved for this query.");
            state.warnings.push("no sources survived reranking, insufficient authority to answer".to_string());
            state.quality = QualityState {
                quality_passed: false,
                quality_confidence: 0.3,
                quality_issues: vec!["insufficient sources".to_string()],
            };
            let _ = tx.send(StreamEvent::Token(final_answer.clone())).await;
            break;
        }

        state.retrieval = RetrievalState {
            combined_results: combined_results.clone(),
            reranked_results: reranked.clone(),
            reranked_chunk_ids: reranked.iter().map(|r| r.chunk.chunk_id.clone()).collect(),
            topk_results: reranked.clone(),
        };

        let t_parent = Instant::now();
        let parent_cache = deps.parent_fetcher.prefetch(&reranked).await;
        let mut parent_warnings = Vec::new();
        let bundled = ParentFetcher::bundle(&reranked, &parent_cache, &mut parent_warnings);
        per_node_ms.insert("parent_fetch".to_string(), t_parent.elapsed().as_millis() as u64);
        state.warnings.extend(parent_warnings);

        state.parent_expansion = ParentExpansionState {
            parent_doc_cache: parent_cache,
            bundled_context: bundled.clone(),
            context_tokens: bundled.iter().map(|b| (b.excerpt.len() / 4).max(1)).sum(),
        };

        let user_prompt = prompt::synthesis_user_prompt(&rewritten.rewritten_query, &bundled, &short_term_strings);

        let t_synth = Instant::now();
        let answer = if deps.settings.features.speculative_model_downgrade {
            run_synthesis(&synthesizer, &system_prompt, &user_prompt, max_tokens, &tx).await
        } else {
            run_synthesis_plain(&deps.large_model, &system_prompt, &user_prompt, max_tokens, &tx).await
        };
        per_node_ms.insert("synthesize".to_string(), t_synth.elapsed().as_millis() as u64);

        let citations = extract_citations(&answer, &bundled);
        for citation in &citations {
            let _ = tx.send(StreamEvent::Citation(citation.clone())).await;
        }

        state.synthesis = SynthesisState {
            final_answer: answer.clone(),
            cited_sources: citations.clone(),
            tldr: make_tldr(&answer),
        };

        let t_quality = Instant::now();
        let quality_result = deps.quality_gate.check(&answer, &bundled).await;
        per_node_ms.insert("quality_gate".to_string(), t_quality.elapsed().as_millis() as u64);

        state.quality = QualityState {
            quality_passed: quality_result.quality_passed,
            quality_confidence: quality_result.quality_confidence,
            quality_issues: quality_result.quality_issues.clone(),
        };

        final_answer = answer;
        cited_sources = citations;

        let decision = if deps.settings.features.self_correction {
            decide(
                quality_result.quality_passed,
                quality_result.quality_confidence,
                &quality_result.quality_issues,
                state.refinement.refinement_iteration,
                complexity,
            )
        } else {
            Decision::Pass
        };

        match decision {
            Decision::Pass => break,
            Decision::PassWithWarning => {
                state.warnings.push(
                    "the quality gate could not fully confirm this answer after the maximum refinement attempts; treat with extra caution"
                        .to_string(),
                );
                break;
            }
            Decision::Refine => {
                let t_critic = Instant::now();
                let critique = deps.self_critic.run(&final_answer, &quality_result.quality_issues).await;
                per_node_ms.insert("self_critic".to_string(), t_critic.elapsed().as_millis() as u64);

                state.refinement = RefinementState {
                    refinement_iteration: state.refinement.refinement_iteration + 1,
                    refinement_instructions: critique.refinement_instructions.clone(),
                    priority_fixes: critique.priority_fixes.clone(),
                    suggested_additions: critique.suggested_additions.clone(),
                };

                let t_refine = Instant::now();
                let refined = deps.refined_synthesizer.run(&system_prompt, &final_answer, &critique, max_tokens).await;
                per_node_ms.insert("refined_synthesis".to_string(), t_refine.elapsed().as_millis() as u64);

                refinement_applied = refined != final_answer;
                final_answer = refined;

                let refined_citations = extract_citations(&final_answer, &bundled);
                state.synthesis = SynthesisState {
                    final_answer: final_answer.clone(),
                    cited_sources: refined_citations.clone(),
                    tldr: make_tldr(&final_answer),
                };
                cited_sources = refined_citations;

                // Scenario E calls for a second quality-gate pass after
                // refinement; its outcome only downgrades the returned
                // confidence/warnings, it never re-enters retrieval — the
                // single sanctioned back-edge stays RetrieveMore -> rerank.
                let rechecked = deps.quality_gate.check(&final_answer, &bundled).await;
                state.quality = QualityState {
                    quality_passed: rechecked.quality_passed,
                    quality_confidence: rechecked.quality_confidence,
                    quality_issues: rechecked.quality_issues.clone(),
                };
                let redecision = decide(
                    rechecked.quality_passed,
                    rechecked.quality_confidence,
                    &rechecked.quality_issues,
                    state.refinement.refinement_iteration,
                    complexity,
                );
                if !matches!(redecision, Decision::Pass) {
                    state.warnings.push(
                        "the quality gate still flagged issues after one refinement pass; answer returned best-effort"
                            .to_string(),
                    );
                }
                break;
            }
            Decision::RetrieveMore => {
                let t_iter = Instant::now();
                let gap_warnings = IterativeRetriever::new(&deps.retrieval_engine)
                    .run(&rewritten.rewritten_query, &quality_result.quality_issues, &mut combined_results)
                    .await;
                per_node_ms.insert("iterative_retrieval".to_string(), t_iter.elapsed().as_millis() as u64);
                state.warnings.extend(gap_warnings);
                state.refinement.refinement_iteration += 1;
                continue;
            }
        }
    }

    final_answer = apply_disclaimer_if_needed(final_answer, state.quality.quality_confidence, &state.warnings);
    state.synthesis.final_answer = final_answer.clone();

    let total_ms = start.elapsed().as_millis() as u64;
    let payload = FinalPayload {
        answer: final_answer.clone(),
        citations: cited_sources.clone(),
        confidence: state.quality.quality_confidence,
        synthesis: SynthesisPayload {
            tldr: state.synthesis.tldr.clone(),
            refinement_applied: (state.refinement.refinement_iteration > 0).then_some(refinement_applied),
            iteration_count: state.refinement.refinement_iteration,
        },
        timings: TimingsPayload { per_node_ms, total_ms },
        from_cache: false,
        warnings: state.warnings.clone(),
    };
    let _ = tx.send(StreamEvent::Final(payload)).await;

    let should_cache = deps.settings.features.semantic_cache && !matches!(request.jurisdiction.as_deref(), Some("skip-cache"));
    PostResponseWork {
        user_id: request.user_id.clone(),
        session_id: request.session_id.clone(),
        raw_query: request.raw_query.clone(),
        final_answer,
        complexity,
        user_type,
        legal_areas,
        should_cache,
        normalized_query,
        user_type_str,
        cached: CachedPayload {
            answer: state.synthesis.final_answer.clone(),
            citations: cited_sources,
            confidence: state.quality.quality_confidence,
            tldr: state.synthesis.tldr.clone(),
            iteration_count: state.refinement.refinement_iteration,
            warnings: state.warnings.clone(),
        },
    }
    .spawn(deps);
}

async fn finish_from_cache(
    deps: &Dependencies,
    request: &QueryRequest,
    classification: &zimlex_nlp::ClassificationResult,
    legal_areas: &HashSet<String>,
    cached: CachedPayload,
    tx: &mpsc::Sender<StreamEvent>,
    start: Instant,
) {
    for citation in &cached.citations {
        let _ = tx.send(StreamEvent::Citation(citation.clone())).await;
    }
    for warning in &cached.warnings {
        let _ = tx.send(StreamEvent::Warning(warning.clone())).await;
    }

    let payload = FinalPayload {
        answer: cached.answer.clone(),
        citations: cached.citations.clone(),
        confidence: cached.confidence,
        synthesis: SynthesisPayload {
            tldr: cached.tldr.clone(),
            refinement_applied: None,
            iteration_count: cached.iteration_count,
        },
        timings: TimingsPayload {
            per_node_ms: [("cache_lookup".to_string(), start.elapsed().as_millis() as u64)].into(),
            total_ms: start.elapsed().as_millis() as u64,
        },
        from_cache: true,
        warnings: cached.warnings.clone(),
    };
    let _ = tx.send(StreamEvent::Final(payload)).await;

    let short_term = deps.short_term.clone();
    let long_term = deps.long_term.clone();
    let session_id = request.session_id.clone();
    let user_id = request.user_id.clone();
    let raw_query = request.raw_query.clone();
    let answer = cached.answer.clone();
    let complexity = classification.complexity;
    let user_type = classification.user_type;
    let legal_areas: Vec<String> = legal_areas.iter().cloned().collect();
    tokio::spawn(async move {
        let _ = short_term.append(&session_id, Role::User, &raw_query, serde_json::Value::Null).await;
        let _ = short_term.append(&session_id, Role::Assistant, &answer, serde_json::Value::Null).await;
        let _ = long_term
            .update_after_query(&user_id, QueryMetadata { legal_areas, complexity, user_type })
            .await;
    });
}

/// Best-effort cache write and memory update, run after the `final` event
/// has already been sent so neither can add latency to the response.
struct PostResponseWork {
    user_id: String,
    session_id: String,
    raw_query: String,
    final_answer: String,
    complexity: Complexity,
    user_type: UserType,
    legal_areas: HashSet<String>,
    should_cache: bool,
    normalized_query: String,
    user_type_str: String,
    cached: CachedPayload,
}

impl PostResponseWork {
    fn spawn(self, deps: Arc<Dependencies>) {
        tokio::spawn(async move {
            let _ = deps.short_term.append(&self.session_id, Role::User, &self.raw_query, serde_json::Value::Null).await;
            let _ = deps
                .short_term
                .append(&self.session_id, Role::Assistant, &self.final_answer, serde_json::Value::Null)
                .await;
            let _ = deps
                .long_term
                .update_after_query(
                    &self.user_id,
                    QueryMetadata {
                        legal_areas: self.legal_areas.into_iter().collect(),
                        complexity: self.complexity,
                        user_type: self.user_type,
                    },
                )
                .await;

            if self.should_cache {
                if let Ok(payload) = serde_json::to_value(&self.cached) {
                    if let Some(embedding) = get_or_compute_embedding(&deps, &self.raw_query).await {
                        deps.cache
                            .store(
                                &self.normalized_query,
                                &self.raw_query,
                                &self.user_type_str,
                                payload,
                                embedding,
                                Duration::from_secs(self.complexity.cache_ttl_secs()),
                            )
                            .await;
                    }
                }
            }
        });
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct CachedPayload {
    answer: String,
    citations: Vec<Citation>,
    confidence: f32,
    tldr: String,
    iteration_count: u8,
    warnings: Vec<String>,
}

fn cache_hit_entry(lookup: CacheLookup) -> Option<zimlex_cache::CacheEntry> {
    match lookup {
        CacheLookup::Miss => None,
        CacheLookup::Exact(entry) => Some(entry),
        CacheLookup::Similar(entry, _similarity) => Some(entry),
    }
}

async fn get_or_compute_embedding(deps: &Dependencies, raw_query: &str) -> Option<Vec<f32>> {
    if let Some(embedding) = deps.cache.get_embedding(raw_query).await {
        return Some(embedding);
    }
    let batch = deps.embedding_model.embed(&[raw_query.to_string()]).await.ok()?;
    let embedding = batch.into_iter().next()?;
    deps.cache.put_embedding(raw_query, &embedding).await;
    Some(embedding)
}

/// Streams tokens from the speculative tiered synthesizer into `tx` as they
/// arrive, retrying once at half the token budget if generation yields
/// nothing usable (disabled/unreachable backends still resolve, by
/// contract, to a short refusal token rather than an empty stream).
async fn run_synthesis(
    synthesizer: &SpeculativeSynthesizer,
    system_prompt: &str,
    user_prompt: &str,
    max_tokens: usize,
    tx: &mpsc::Sender<StreamEvent>,
) -> String {
    if let Some(text) = stream_and_forward(synthesizer, system_prompt, user_prompt, max_tokens, tx).await {
        if !text.trim().is_empty() {
            return text;
        }
    }
    let retry_tokens = (max_tokens / 2).max(200);
    if let Some(text) = stream_and_forward(synthesizer, system_prompt, user_prompt, retry_tokens, tx).await {
        if !text.trim().is_empty() {
            return text;
        }
    }
    refusal_answer("The language model backend returned no usable answer after a retry.")
}

async fn stream_and_forward(
    synthesizer: &SpeculativeSynthesizer,
    system_prompt: &str,
    user_prompt: &str,
    max_tokens: usize,
    tx: &mpsc::Sender<StreamEvent>,
) -> Option<String> {
    let (internal_tx, mut internal_rx) = mpsc::channel::<String>(64);
    let outer_tx = tx.clone();
    let forward = tokio::spawn(async move {
        let mut accumulated = String::new();
        while let Some(token) = internal_rx.recv().await {
            accumulated.push_str(&token);
            if outer_tx.send(StreamEvent::Token(token)).await.is_err() {
                break;
            }
        }
        accumulated
    });

    let outcome = synthesizer.stream_complete(system_prompt, user_prompt, max_tokens, 0.2, internal_tx).await;
    let forwarded = forward.await.unwrap_or_default();

    match outcome {
        Ok(outcome) if !outcome.text.is_empty() => Some(outcome.text),
        Ok(_) => (!forwarded.is_empty()).then_some(forwarded),
        Err(err) => {
            tracing::warn!(%err, "synthesis model call failed");
            None
        }
    }
}

/// Direct large-tier call, bypassing the first-token-deadline race, for when
/// `speculative_model_downgrade` is turned off.
async fn run_synthesis_plain(
    large_model: &Arc<dyn LlmBackend>,
    system_prompt: &str,
    user_prompt: &str,
    max_tokens: usize,
    tx: &mpsc::Sender<StreamEvent>,
) -> String {
    let (internal_tx, mut internal_rx) = mpsc::channel::<String>(64);
    let outer_tx = tx.clone();
    let forward = tokio::spawn(async move {
        let mut accumulated = String::new();
        while let Some(token) = internal_rx.recv().await {
            accumulated.push_str(&token);
            if outer_tx.send(StreamEvent::Token(token)).await.is_err() {
                break;
            }
        }
        accumulated
    });

    let result = large_model.stream_complete(system_prompt, user_prompt, max_tokens, 0.2, internal_tx).await;
    let accumulated = forward.await.unwrap_or_default();
    match result {
        Ok(()) if !accumulated.trim().is_empty() => accumulated,
        _ => refusal_answer("The language model backend returned no usable answer."),
    }
}

fn extract_citations(answer: &str, bundled_context: &[BundledContextItem]) -> Vec<Citation> {
    let mut seen = HashSet::new();
    let mut citations = Vec::new();
    for capture in CITATION_MARKER.captures_iter(answer) {
        let Some(key) = capture.get(1).map(|m| m.as_str()) else { continue };
        if !seen.insert(key.to_string()) {
            continue;
        }
        if let Some(item) = bundled_context.iter().find(|item| item.parent_doc_id == key) {
            citations.push(Citation {
                doc_key: item.parent_doc_id.clone(),
                page: None,
                snippet_range: None,
                confidence: item.confidence,
            });
        }
    }
    citations
}

fn make_tldr(answer: &str) -> String {
    const MAX_CHARS: usize = 200;
    let trimmed = answer.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let candidate = match trimmed.find(['.', '!', '?']) {
        Some(idx) if idx < MAX_CHARS => &trimmed[..=idx],
        _ => trimmed,
    };
    truncate_chars(candidate, MAX_CHARS)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}…")
}

fn messages_to_strings(messages: &[Message]) -> Vec<String> {
    messages.iter().map(|m| format!("{:?}: {}", m.role, m.content)).collect()
}

fn apply_disclaimer_if_needed(mut answer: String, confidence: f32, warnings: &[String]) -> String {
    let flagged = warnings.iter().any(|w| w.to_lowercase().contains("insufficient"));
    if (confidence < LOW_CONFIDENCE_THRESHOLD || flagged) && !answer.contains("qualified Zimbabwean legal practitioner") {
        answer.push_str("\n\n");
        answer.push_str(LOW_CONFIDENCE_DISCLAIMER);
    }
    answer
}

fn refusal_answer(reason: &str) -> String {
    format!(
        "I could not find sufficient authoritative sources in the Zimbabwean legal corpus to \
         answer this question with confidence. {reason} Consulting a qualified Zimbabwean legal \
         practitioner is advisable."
    )
}

fn greeting_answer() -> String {
    "Hello! I can help answer questions about Zimbabwean law, including the Constitution, Acts \
     of Parliament, statutory instruments, and case law. What would you like to know?"
        .to_string()
}

fn empty_query_answer() -> String {
    "I didn't receive a question. Please ask about a specific area of Zimbabwean law, for \
     example a section of an Act, a constitutional provision, or a case."
        .to_string()
}

fn route_name(intent: Intent) -> String {
    match intent {
        Intent::Conversational => "conversational",
        _ => "legal-qa",
    }
    .to_string()
}

fn user_type_str(user_type: UserType) -> &'static str {
    match user_type {
        UserType::Citizen => "citizen",
        UserType::Professional => "professional",
    }
}

/// No existing collaborator derives a legal-area tag from [`Intent`]; this is
/// a simple, intentionally coarse mapping used only to seed
/// [`zimlex_memory::QueryMetadata::legal_areas`] for long-term profile
/// frequency tracking.
fn legal_areas_for(intent: Intent) -> HashSet<String> {
    let area = match intent {
        Intent::ConstitutionalInterpretation => Some("constitutional"),
        Intent::StatutoryAnalysis => Some("statutory"),
        Intent::CaseLawResearch => Some("case-law"),
        Intent::ProceduralInquiry => Some("procedural"),
        Intent::RightsInquiry => Some("rights"),
        Intent::ContractAnalysis => Some("contract"),
        Intent::LegalDrafting => Some("drafting"),
        Intent::Summarization => Some("summarization"),
        Intent::RagQa => Some("general"),
        Intent::Conversational => None,
    };
    area.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use zimlex_core::BundledContextItem;

    fn context_item(parent_doc_id: &str, confidence: f32) -> BundledContextItem {
        BundledContextItem {
            chunk_id: format!("{parent_doc_id}-c1"),
            parent_doc_id: parent_doc_id.to_string(),
            title: "Labour Act".to_string(),
            excerpt: "excerpt".to_string(),
            confidence,
            source_type: "fused".to_string(),
        }
    }

    #[test]
    fn extract_citations_resolves_against_parent_doc_id() {
        let context = vec![context_item("labour-act-s12a", 0.8)];
        let answer = "[labour-act-s12a] Notice is required before dismissal.";
        let citations = extract_citations(answer, &context);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].doc_key, "labour-act-s12a");
        assert!((citations[0].confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn extract_citations_ignores_unresolvable_markers() {
        let context = vec![context_item("labour-act-s12a", 0.8)];
        let answer = "[unknown-doc] Something was claimed without a real source.";
        assert!(extract_citations(answer, &context).is_empty());
    }

    #[test]
    fn extract_citations_dedupes_repeated_markers() {
        let context = vec![context_item("labour-act-s12a", 0.8)];
        let answer = "[labour-act-s12a] First mention. [labour-act-s12a] Second mention.";
        assert_eq!(extract_citations(answer, &context).len(), 1);
    }

    #[test]
    fn legal_areas_for_conversational_is_empty() {
        assert!(legal_areas_for(Intent::Conversational).is_empty());
    }

    #[test]
    fn legal_areas_for_constitutional_intent_is_tagged() {
        let areas = legal_areas_for(Intent::ConstitutionalInterpretation);
        assert!(areas.contains("constitutional"));
    }

    #[test]
    fn make_tldr_stops_at_first_sentence() {
        let tldr = make_tldr("First sentence here. Second sentence that should not appear.");
        assert_eq!(tldr, "First sentence here.");
    }

    #[test]
    fn make_tldr_truncates_long_sentence_fragments() {
        let long = "a".repeat(500);
        let tldr = make_tldr(&long);
        assert!(tldr.chars().count() <= 201);
    }

    #[test]
    fn disclaimer_is_appended_below_confidence_threshold() {
        let answer = apply_disclaimer_if_needed("Some answer.".to_string(), 0.4, &[]);
        assert!(answer.contains("qualified Zimbabwean legal practitioner"));
    }

    #[test]
    fn disclaimer_is_skipped_above_threshold_with_no_warnings() {
        let answer = apply_disclaimer_if_needed("Some answer.".to_string(), 0.9, &[]);
        assert!(!answer.contains("qualified Zimbabwean legal practitioner"));
    }

    #[test]
    fn user_type_str_matches_cache_key_convention() {
        assert_eq!(user_type_str(UserType::Citizen), "citizen");
        assert_eq!(user_type_str(UserType::Professional), "professional");
    }
}
