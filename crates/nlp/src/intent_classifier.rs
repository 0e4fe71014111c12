//! Intent classifier (spec §4.2): heuristic-first, small-model fallback,
//! long-term-profile override for returning users, adaptive
//! retrieval/rerank parameters. Regex marker patterns are compiled once via
//! `once_cell::sync::Lazy<Regex>` statics, the way the teacher's
//! `agent::intent::IntentDetector` precompiles its slot patterns.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use zimlex_cache::SemanticCache;
use zimlex_core::{Complexity, Intent, LlmBackend, UserType};
use zimlex_memory::LongTermMemory;

const HEURISTIC_ACCEPT_THRESHOLD: f32 = 0.9;
const INTENT_CACHE_TTL_SECS: u64 = 7200;

static PROFESSIONAL_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bratio decidendi\b|\bobiter\b|section\s+\d+\([a-z0-9]+\)|\[chapter\s+\d+:\d+\]")
        .unwrap()
});
static CONVERSATIONAL_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(hello|hi|hey|thanks|thank you|good morning|good afternoon)\b").unwrap());
static CONSTITUTIONAL_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bconstitution\b|\bconstitutional\b|\bbill of rights\b").unwrap());
static CASE_LAW_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bcase\b|\bprecedent\b|\bjudgment\b|\bv\.\s").unwrap());
static STATUTORY_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bact\b|\bstatute\b|\bsection\s+\d+|\bstatutory instrument\b|\bsi\s+\d+").unwrap()
});
static PROCEDURAL_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bhow do i\b|\bprocedure\b|\bfile a\b|\bapply for\b").unwrap());
static RIGHTS_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bmy rights\b|\bright to\b|\bentitled to\b").unwrap());
static CONTRACT_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bcontract\b|\bagreement\b|\bclause\b").unwrap());
static DRAFTING_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bdraft\b|\bwrite me\b|\bprepare a\b").unwrap());
static SUMMARIZATION_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bsummarize\b|\bsummary\b|\btl;?dr\b").unwrap());
static COMPARATIVE_CONNECTIVES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\band\b|\bor\b|\bcompare\b|\bversus\b|\bvs\.?\b").unwrap());
static LEGAL_TERM_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bact\b|\bsection\b|\bconstitution\b|\bcase\b|\bcourt\b|\bstatute\b|\bclause\b|\bjudgment\b")
        .unwrap()
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub intent: Intent,
    pub complexity: Complexity,
    pub user_type: UserType,
    pub reasoning_framework: String,
    pub confidence: f32,
    pub jurisdiction: Option<String>,
}

/// Strict JSON contract the small model must satisfy (spec §4.2 step 4).
#[derive(Debug, Deserialize)]
struct ModelClassification {
    intent: String,
    complexity: String,
    user_type: String,
    reasoning_framework: String,
    confidence: f32,
    #[serde(default)]
    jurisdiction: Option<String>,
}

fn reasoning_framework_for(intent: Intent) -> &'static str {
    match intent {
        Intent::ConstitutionalInterpretation => "constitutional-interpretation",
        Intent::StatutoryAnalysis => "statutory-interpretation",
        Intent::CaseLawResearch => "precedent-analysis",
        Intent::ContractAnalysis | Intent::ProceduralInquiry | Intent::RightsInquiry => "irac",
        Intent::LegalDrafting | Intent::Summarization => "direct",
        Intent::RagQa => "irac",
        Intent::Conversational => "none",
    }
}

/// Heuristic pass: pattern-match markers, no model call. Returns the
/// classification plus a confidence score.
fn heuristic_classify(raw_query: &str) -> ClassificationResult {
    let trimmed = raw_query.trim();
    if trimmed.is_empty() || CONVERSATIONAL_MARKERS.is_match(trimmed) {
        return ClassificationResult {
            intent: Intent::Conversational,
            complexity: Complexity::Simple,
            user_type: UserType::Citizen,
            reasoning_framework: "none".to_string(),
            confidence: 0.95,
            jurisdiction: None,
        };
    }

    // Statutory markers (explicit "section N", "[Chapter N:M]", "act",
    // "statutory instrument") are a more specific signal than a bare
    // "case"/"precedent" token, so a query naming both a statute and
    // "relevant precedent" (spec §8 Scenario B) is statutory-analysis, not
    // case-law-research.
    let intent = if CONSTITUTIONAL_MARKERS.is_match(trimmed) {
        Intent::ConstitutionalInterpretation
    } else if STATUTORY_MARKERS.is_match(trimmed) {
        Intent::StatutoryAnalysis
    } else if CASE_LAW_MARKERS.is_match(trimmed) {
        Intent::CaseLawResearch
    } else if DRAFTING_MARKERS.is_match(trimmed) {
        Intent::LegalDrafting
    } else if SUMMARIZATION_MARKERS.is_match(trimmed) {
        Intent::Summarization
    } else if CONTRACT_MARKERS.is_match(trimmed) {
        Intent::ContractAnalysis
    } else if PROCEDURAL_MARKERS.is_match(trimmed) {
        Intent::ProceduralInquiry
    } else if RIGHTS_MARKERS.is_match(trimmed) {
        Intent::RightsInquiry
    } else {
        Intent::RagQa
    };

    let word_count = trimmed.split_whitespace().count();
    let legal_term_hits = LEGAL_TERM_MARKERS.find_iter(trimmed).count();
    let has_connective = COMPARATIVE_CONNECTIVES.is_match(trimmed);

    let complexity = match (word_count, legal_term_hits, has_connective) {
        (w, _, _) if w <= 8 => Complexity::Simple,
        (_, hits, conn) if hits >= 3 && conn => Complexity::Expert,
        (_, hits, _) if hits >= 2 => Complexity::Complex,
        (w, _, conn) if w > 20 || conn => Complexity::Moderate,
        _ => Complexity::Simple,
    };

    let user_type = if PROFESSIONAL_MARKERS.is_match(trimmed) {
        UserType::Professional
    } else {
        UserType::Citizen
    };

    // Confidence reflects how many distinct signal categories agreed.
    let mut confidence: f32 = 0.6;
    if legal_term_hits > 0 {
        confidence += 0.15;
    }
    if PROFESSIONAL_MARKERS.is_match(trimmed) {
        confidence += 0.2;
    }
    if word_count <= 8 {
        confidence += 0.1;
    }
    confidence = confidence.min(0.95);

    ClassificationResult {
        reasoning_framework: reasoning_framework_for(intent).to_string(),
        intent,
        complexity,
        user_type,
        confidence,
        jurisdiction: None,
    }
}

fn clamp_classification(mut result: ClassificationResult) -> ClassificationResult {
    result.confidence = result.confidence.clamp(0.0, 1.0);
    result
}

impl ModelClassification {
    fn into_result(self) -> Option<ClassificationResult> {
        let intent = match self.intent.as_str() {
            "conversational" => Intent::Conversational,
            "rag-qa" => Intent::RagQa,
            "constitutional-interpretation" => Intent::ConstitutionalInterpretation,
            "statutory-analysis" => Intent::StatutoryAnalysis,
            "case-law-research" => Intent::CaseLawResearch,
            "procedural-inquiry" => Intent::ProceduralInquiry,
            "rights-inquiry" => Intent::RightsInquiry,
            "contract-analysis" => Intent::ContractAnalysis,
            "legal-drafting" => Intent::LegalDrafting,
            "summarization" => Intent::Summarization,
            _ => return None,
        };
        let complexity = match self.complexity.as_str() {
            "simple" => Complexity::Simple,
            "moderate" => Complexity::Moderate,
            "complex" => Complexity::Complex,
            "expert" => Complexity::Expert,
            _ => return None,
        };
        let user_type = match self.user_type.as_str() {
            "citizen" => UserType::Citizen,
            "professional" => UserType::Professional,
            _ => return None,
        };
        Some(ClassificationResult {
            intent,
            complexity,
            user_type,
            reasoning_framework: self.reasoning_framework,
            confidence: self.confidence,
            jurisdiction: self.jurisdiction,
        })
    }
}

pub struct IntentClassifier {
    cache: Arc<SemanticCache>,
    long_term: Arc<LongTermMemory>,
    small_model: Arc<dyn LlmBackend>,
}

impl IntentClassifier {
    pub fn new(
        cache: Arc<SemanticCache>,
        long_term: Arc<LongTermMemory>,
        small_model: Arc<dyn LlmBackend>,
    ) -> Self {
        Self {
            cache,
            long_term,
            small_model,
        }
    }

    pub async fn classify(&self, raw_query: &str, user_id: &str) -> ClassificationResult {
        let query_lower = raw_query.to_lowercase();

        if let Some(cached) = self.cache.get_intent(&query_lower).await {
            if let Ok(result) = serde_json::from_value::<ClassificationResult>(cached) {
                return result;
            }
        }

        let mut result = heuristic_classify(raw_query);

        if result.confidence < HEURISTIC_ACCEPT_THRESHOLD && !matches!(result.intent, Intent::Conversational) {
            if let Some(model_result) = self.classify_with_model(raw_query).await {
                result = model_result;
            }
        }

        let profile = self.long_term.get_profile(user_id).await;
        if profile.is_returning_user() && result.confidence < HEURISTIC_ACCEPT_THRESHOLD {
            result.user_type = profile.expertise;
            result.complexity = profile.typical_complexity;
        }

        let result = clamp_classification(result);

        if let Ok(payload) = serde_json::to_value(&result) {
            self.cache.put_intent(&query_lower, payload).await;
        }
        let _ = INTENT_CACHE_TTL_SECS;
        result
    }

    async fn classify_with_model(&self, raw_query: &str) -> Option<ClassificationResult> {
        let system = "You are a legal query classifier for Zimbabwean law. Respond with strict JSON only: \
            {\"intent\": one of [conversational, rag-qa, constitutional-interpretation, statutory-analysis, \
            case-law-research, procedural-inquiry, rights-inquiry, contract-analysis, legal-drafting, summarization], \
            \"complexity\": one of [simple, moderate, complex, expert], \"user_type\": one of [citizen, professional], \
            \"reasoning_framework\": string, \"confidence\": number in [0,1], \"jurisdiction\": string or null}";
        let raw = self
            .small_model
            .complete(system, raw_query, 200, 0.0)
            .await
            .ok()?;
        let parsed: ModelClassification = serde_json::from_str(&raw).ok()?;
        parsed.into_result()
    }
}

/// `retrieval_top_k`/`rerank_top_k` adaptive parameters, per §4.2's table
/// (delegates to `Complexity::topk_params`, the shared source of truth
/// also used by the orchestrator's invariant checks in §8).
pub fn adaptive_params(complexity: Complexity) -> (usize, usize) {
    complexity.topk_params()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_is_conversational() {
        let result = heuristic_classify("");
        assert_eq!(result.intent, Intent::Conversational);
    }

    #[test]
    fn greeting_is_conversational() {
        let result = heuristic_classify("hello there");
        assert_eq!(result.intent, Intent::Conversational);
    }

    #[test]
    fn constitution_keyword_routes_to_constitutional_interpretation() {
        let result = heuristic_classify("What does the constitution say about freedom of assembly?");
        assert_eq!(result.intent, Intent::ConstitutionalInterpretation);
    }

    #[test]
    fn case_keyword_routes_to_case_law_research() {
        let result = heuristic_classify("Is there a precedent case on unlawful dismissal?");
        assert_eq!(result.intent, Intent::CaseLawResearch);
    }

    #[test]
    fn statutory_markers_outrank_a_bare_precedent_mention() {
        let result = heuristic_classify(
            "Analyze section 12A of the Labour Act [Chapter 28:01] regarding dismissal procedures and relevant precedent.",
        );
        assert_eq!(result.intent, Intent::StatutoryAnalysis);
    }

    #[test]
    fn professional_markers_set_professional_user_type() {
        let result = heuristic_classify("What is the ratio decidendi in section 12(3)?");
        assert_eq!(result.user_type, UserType::Professional);
    }

    #[test]
    fn short_query_is_simple_complexity() {
        let result = heuristic_classify("What is the minimum wage?");
        assert_eq!(result.complexity, Complexity::Simple);
    }

    #[test]
    fn many_legal_terms_and_connective_is_expert_complexity() {
        let result = heuristic_classify(
            "Compare and analyze the act, the constitution, and relevant case law regarding the statute's section on court jurisdiction",
        );
        assert_eq!(result.complexity, Complexity::Expert);
    }

    #[test]
    fn adaptive_params_match_table() {
        assert_eq!(adaptive_params(Complexity::Simple), (15, 5));
        assert_eq!(adaptive_params(Complexity::Expert), (50, 15));
    }
}
