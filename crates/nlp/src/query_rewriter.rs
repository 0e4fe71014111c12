//! Query rewriter (spec §4.3): follow-up detection, pronoun resolution
//! against session history, deterministic abbreviation expansion, and a
//! bounded hypothetical-doc/sub-question fan-out.
//!
//! Split into a cheap `should_retrieve_documents` pre-check and the actual
//! rewrite, the same division `shodh_rag::rag::QueryRewriter` makes between
//! "is a rewrite worth doing" and "do the rewrite".

use futures::stream::{FuturesUnordered, StreamExt};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use zimlex_core::LlmBackend;
use zimlex_memory::{Message, Role};

const VARIANT_DEADLINE: Duration = Duration::from_millis(600);
const MAX_HYPOTHETICAL_DOCS: usize = 4;
const MAX_SUB_QUESTIONS: usize = 3;
const MAX_TOTAL_VARIANTS: usize = 8;
const MAX_VARIANT_TOKENS: usize = 120;

static ABBREVIATIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert("SI", "statutory instrument");
    map.insert("SC", "Supreme Court");
    map.insert("CC", "Constitutional Court");
    map.insert("HC", "High Court");
    map.insert("CoA", "Court of Appeal");
    map.insert("LA", "Labour Act");
    map.insert("ZLR", "Zimbabwe Law Reports");
    map.insert("s.", "section");
    map.insert("ss.", "sections");
    map
});

static FOLLOW_UP_MARKERS: &[&str] = &["what about", "and if", "as you said", "what if"];
static LEADING_PRONOUNS: &[&str] = &["it", "that", "this", "they", "he", "she", "them"];

#[derive(Debug, Clone, Default)]
pub struct RewrittenQuery {
    pub original_query: String,
    pub rewritten_query: String,
    pub used_context: bool,
    pub hypothetical_docs: Vec<String>,
    pub sub_questions: Vec<String>,
}

pub struct QueryRewriter {
    small_model: Arc<dyn LlmBackend>,
}

fn is_follow_up(query: &str) -> bool {
    let lower = query.to_lowercase();
    if FOLLOW_UP_MARKERS.iter().any(|marker| lower.starts_with(marker) || lower.contains(marker)) {
        return true;
    }
    let first_word = lower.split_whitespace().next().unwrap_or("");
    LEADING_PRONOUNS.contains(&first_word)
}

fn expand_abbreviations(query: &str) -> String {
    let mut expanded = String::with_capacity(query.len());
    for (i, word) in query.split_whitespace().enumerate() {
        if i > 0 {
            expanded.push(' ');
        }
        let bare = word.trim_end_matches(|c: char| !c.is_alphanumeric());
        if let Some(replacement) = ABBREVIATIONS.get(bare) {
            expanded.push_str(replacement);
            expanded.push_str(&word[bare.len()..]);
        } else {
            expanded.push_str(word);
        }
    }
    expanded
}

fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    let max_chars = max_tokens * 4;
    if text.len() <= max_chars {
        return text.to_string();
    }
    let mut end = max_chars;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

impl QueryRewriter {
    pub fn new(small_model: Arc<dyn LlmBackend>) -> Self {
        Self { small_model }
    }

    /// Cheap pre-check: is this query even worth retrieving documents for?
    /// Mirrors `shodh_rag::rag::QueryRewriter::should_retrieve_documents`.
    pub fn should_retrieve_documents(&self, query: &str) -> (bool, String) {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return (false, "empty query".to_string());
        }
        let lower = trimmed.to_lowercase();
        let greetings = ["hello", "hi", "hey", "thanks", "thank you", "bye", "goodbye"];
        if greetings.iter().any(|g| lower == *g || lower.starts_with(&format!("{g} "))) {
            return (false, "conversational greeting, no retrieval needed".to_string());
        }
        (true, "legal question requires document search".to_string())
    }

    /// Full rewrite: pronoun resolution against recent history, abbreviation
    /// expansion, and a bounded hypothetical-doc/sub-question fan-out.
    pub async fn rewrite(&self, raw_query: &str, recent_context: &[Message]) -> RewrittenQuery {
        let mut rewritten = raw_query.to_string();
        let mut used_context = false;

        if is_follow_up(raw_query) && !recent_context.is_empty() {
            if let Some(resolved) = self.resolve_references(raw_query, recent_context).await {
                rewritten = resolved;
                used_context = true;
            }
        }

        rewritten = expand_abbreviations(&rewritten);

        let (hypothetical_docs, sub_questions) = self.generate_variants(&rewritten).await;

        RewrittenQuery {
            original_query: raw_query.to_string(),
            rewritten_query: rewritten,
            used_context,
            hypothetical_docs,
            sub_questions,
        }
    }

    async fn resolve_references(&self, raw_query: &str, recent_context: &[Message]) -> Option<String> {
        let last_exchange: String = recent_context
            .iter()
            .rev()
            .take(2)
            .map(|m| format!("{:?}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let system = "Resolve pronouns and references in the follow-up question using the \
            conversation history. Respond with only the rewritten, self-contained question.";
        let user = format!("History:\n{last_exchange}\n\nFollow-up question: {raw_query}");

        let result = tokio::time::timeout(VARIANT_DEADLINE, self.small_model.complete(system, &user, 100, 0.0)).await;
        match result {
            Ok(Ok(resolved)) if !resolved.trim().is_empty() => Some(resolved.trim().to_string()),
            _ => None,
        }
    }

    /// Bounded `FuturesUnordered` fan-out for hypothetical-doc drafts and
    /// sub-question decomposition, each individually deadlined; a variant
    /// that times out is dropped, never surfaced as an error.
    async fn generate_variants(&self, rewritten_query: &str) -> (Vec<String>, Vec<String>) {
        enum Kind {
            Hypothetical,
            SubQuestion,
        }

        let mut tasks = FuturesUnordered::new();
        for i in 0..MAX_HYPOTHETICAL_DOCS {
            let system = "Draft a short hypothetical answer passage (under 120 tokens) to the \
                legal question, as if it were an excerpt from a legal document.";
            let user = format!("{rewritten_query} (variant {i})");
            tasks.push(self.timed_variant(system, &user, Kind::Hypothetical as u8));
        }
        for i in 0..MAX_SUB_QUESTIONS {
            let system = "Decompose the legal question into one narrower sub-question (under 120 tokens).";
            let user = format!("{rewritten_query} (sub-question {i})");
            tasks.push(self.timed_variant(system, &user, Kind::SubQuestion as u8));
        }

        let mut hypothetical_docs = Vec::new();
        let mut sub_questions = Vec::new();
        let mut total = 0;
        while let Some((kind, text)) = tasks.next().await {
            if total >= MAX_TOTAL_VARIANTS {
                break;
            }
            let Some(text) = text else { continue };
            let truncated = truncate_to_tokens(&text, MAX_VARIANT_TOKENS);
            if kind == Kind::Hypothetical as u8 {
                hypothetical_docs.push(truncated);
            } else {
                sub_questions.push(truncated);
            }
            total += 1;
        }
        (hypothetical_docs, sub_questions)
    }

    async fn timed_variant(&self, system: &str, user: &str, kind: u8) -> (u8, Option<String>) {
        match tokio::time::timeout(VARIANT_DEADLINE, self.small_model.complete(system, user, 150, 0.3)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => (kind, Some(text)),
            _ => (kind, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::mpsc;
    use zimlex_core::Result;

    struct FakeModel {
        response: String,
    }

    #[async_trait]
    impl LlmBackend for FakeModel {
        async fn stream_complete(
            &self,
            _system_prompt: &str,
            _user_prompt: &str,
            _max_tokens: usize,
            _temperature: f32,
            sender: mpsc::Sender<String>,
        ) -> Result<()> {
            let _ = sender.send(self.response.clone()).await;
            Ok(())
        }

        fn name(&self) -> &str {
            "fake-small-model"
        }
    }

    fn message(role: Role, content: &str) -> Message {
        Message {
            role,
            content: content.to_string(),
            timestamp: chrono::Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn follow_up_pronoun_is_detected() {
        assert!(is_follow_up("it was dismissed though"));
        assert!(is_follow_up("What about unfair dismissal?"));
        assert!(!is_follow_up("What is the minimum wage in Zimbabwe?"));
    }

    #[test]
    fn abbreviation_expansion_replaces_known_terms() {
        let expanded = expand_abbreviations("Does SI 34 apply here?");
        assert!(expanded.contains("statutory instrument"));
    }

    #[test]
    fn greeting_does_not_require_retrieval() {
        let rewriter = QueryRewriter::new(Arc::new(FakeModel { response: String::new() }));
        let (should_retrieve, _) = rewriter.should_retrieve_documents("hello");
        assert!(!should_retrieve);
    }

    #[test]
    fn legal_question_requires_retrieval() {
        let rewriter = QueryRewriter::new(Arc::new(FakeModel { response: String::new() }));
        let (should_retrieve, _) = rewriter.should_retrieve_documents("What is the notice period for dismissal?");
        assert!(should_retrieve);
    }

    #[tokio::test]
    async fn follow_up_with_context_resolves_pronoun() {
        let rewriter = QueryRewriter::new(Arc::new(FakeModel {
            response: "What is the notice period for dismissal under the Labour Act?".to_string(),
        }));
        let history = vec![
            message(Role::User, "Can I be dismissed without notice?"),
            message(Role::Assistant, "Dismissal under the Labour Act Section 12A requires notice."),
        ];
        let result = rewriter.rewrite("what about it?", &history).await;
        assert!(result.used_context);
        assert!(result.rewritten_query.contains("Labour Act"));
    }

    #[tokio::test]
    async fn no_context_skips_resolution() {
        let rewriter = QueryRewriter::new(Arc::new(FakeModel { response: String::new() }));
        let result = rewriter.rewrite("What is the minimum wage?", &[]).await;
        assert!(!result.used_context);
        assert_eq!(result.rewritten_query, "What is the minimum wage?");
    }

    #[tokio::test]
    async fn variant_fan_out_is_capped_and_truncated() {
        let rewriter = QueryRewriter::new(Arc::new(FakeModel {
            response: "x".repeat(1000),
        }));
        let result = rewriter.rewrite("What is the minimum wage?", &[]).await;
        assert!(result.hypothetical_docs.len() <= MAX_HYPOTHETICAL_DOCS);
        assert!(result.sub_questions.len() <= MAX_SUB_QUESTIONS);
        assert!(result.hypothetical_docs.len() + result.sub_questions.len() <= MAX_TOTAL_VARIANTS);
        for doc in &result.hypothetical_docs {
            assert!(doc.len() <= MAX_VARIANT_TOKENS * 4);
        }
    }
}
