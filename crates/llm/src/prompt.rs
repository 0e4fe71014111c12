//! Synthesis prompt construction.
//!
//! Plain Rust functions building a `String` per section, the same inline
//! construction style the teacher's `llm::prompt` module uses, rather than
//! a templating-engine dependency.

use zimlex_core::state::BundledContextItem;
use zimlex_core::types::{Complexity, UserType};

const LEGAL_HIERARCHY: &str = "Constitution of Zimbabwe > Acts of Parliament > Statutory Instruments > case law (Constitutional Court > Supreme Court > High Court > Labour Court > Magistrates Court)";

/// System prompt enforcing grounding, citation order, legal-hierarchy
/// resolution, and the section structure required for `complexity` and
/// `reasoning_framework`.
pub fn system_prompt(complexity: Complexity, reasoning_framework: &str, user_type: UserType) -> String {
    let mut sections = vec!["Issue", "Legal Framework", "Application", "Conclusion"];
    if matches!(complexity, Complexity::Complex | Complexity::Expert) {
        sections.extend(["Adversarial Analysis", "Practical Implications", "Confidence Calibration"]);
    }

    let audience = match user_type {
        UserType::Citizen => "Write for a layperson: plain language, define legal terms on first use.",
        UserType::Professional => "Write for a legal professional: precise terminology, full citations, no simplification.",
    };

    let framework_line = if reasoning_framework.is_empty() {
        String::new()
    } else {
        format!("\nApply the {reasoning_framework} analytical framework.")
    };

    format!(
        "You are a legal research assistant answering questions about Zimbabwean law.\n\
         Ground every substantive legal statement strictly in the provided context excerpts. \
         Never state a legal conclusion without a citation immediately preceding it in the same paragraph.\n\
         When sources conflict, resolve using this authority ordering: {LEGAL_HIERARCHY}.\n\
         Structure your answer with these sections, in order: {sections}.\
         {framework_line}\n\
         {audience}\n\
         If the provided context is insufficient to answer fully, say so explicitly rather than inventing authority.",
        sections = sections.join(", "),
    )
}

/// Renders `bundled_context` as a numbered list of excerpts, each with its
/// canonical citation, authority level, and source tag.
pub fn context_block(bundled_context: &[BundledContextItem]) -> String {
    if bundled_context.is_empty() {
        return "No supporting context was retrieved for this query.".to_string();
    }

    let mut block = String::from("Context excerpts:\n");
    for (index, item) in bundled_context.iter().enumerate() {
        block.push_str(&format!(
            "[{n}] {title} (source: {source_type}, id: {doc_id})\n{excerpt}\n\n",
            n = index + 1,
            title = item.title,
            source_type = item.source_type,
            doc_id = item.parent_doc_id,
            excerpt = item.excerpt,
        ));
    }
    block
}

/// At most the last two exchanges, truncated, as a short hint of
/// conversational continuity — not a full transcript.
pub fn prior_turn_hint(short_term_context: &[String]) -> String {
    const MAX_EXCHANGES: usize = 2;
    const MAX_CHARS_PER_EXCHANGE: usize = 400;

    if short_term_context.is_empty() {
        return String::new();
    }

    let recent = short_term_context
        .iter()
        .rev()
        .take(MAX_EXCHANGES)
        .map(|turn| truncate_chars(turn, MAX_CHARS_PER_EXCHANGE))
        .collect::<Vec<_>>();

    let mut ordered = recent;
    ordered.reverse();
    format!("Recent conversation:\n{}", ordered.join("\n"))
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}…")
}

/// The full user-turn prompt handed to the synthesizer: rewritten query,
/// context block, and prior-turn hint, in that order.
pub fn synthesis_user_prompt(
    rewritten_query: &str,
    bundled_context: &[BundledContextItem],
    short_term_context: &[String],
) -> String {
    let hint = prior_turn_hint(short_term_context);
    let context = context_block(bundled_context);

    if hint.is_empty() {
        format!("{context}\n\nQuestion: {rewritten_query}")
    } else {
        format!("{hint}\n\n{context}\n\nQuestion: {rewritten_query}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item(n: usize) -> BundledContextItem {
        BundledContextItem {
            chunk_id: format!("c{n}"),
            parent_doc_id: format!("p{n}"),
            title: format!("Labour Act [Chapter 28:01] s{n}"),
            excerpt: "An employee dismissed without notice...".to_string(),
            confidence: 0.8,
            source_type: "fused".to_string(),
        }
    }

    #[test]
    fn system_prompt_includes_adversarial_sections_only_for_complex_and_expert() {
        let simple = system_prompt(Complexity::Simple, "", UserType::Citizen);
        assert!(!simple.contains("Adversarial Analysis"));

        let expert = system_prompt(Complexity::Expert, "IRAC", UserType::Professional);
        assert!(expert.contains("Adversarial Analysis"));
        assert!(expert.contains("Confidence Calibration"));
        assert!(expert.contains("IRAC"));
    }

    #[test]
    fn system_prompt_states_legal_hierarchy() {
        let prompt = system_prompt(Complexity::Moderate, "", UserType::Citizen);
        assert!(prompt.contains("Constitution of Zimbabwe"));
        assert!(prompt.contains("case law"));
    }

    #[test]
    fn context_block_lists_every_excerpt() {
        let items = vec![sample_item(1), sample_item(2)];
        let block = context_block(&items);
        assert!(block.contains("[1]"));
        assert!(block.contains("[2]"));
        assert!(block.contains("p1"));
        assert!(block.contains("p2"));
    }

    #[test]
    fn context_block_reports_empty_context_explicitly() {
        let block = context_block(&[]);
        assert!(block.contains("No supporting context"));
    }

    #[test]
    fn prior_turn_hint_keeps_only_last_two_exchanges() {
        let turns = vec![
            "turn one".to_string(),
            "turn two".to_string(),
            "turn three".to_string(),
        ];
        let hint = prior_turn_hint(&turns);
        assert!(!hint.contains("turn one"));
        assert!(hint.contains("turn two"));
        assert!(hint.contains("turn three"));
    }

    #[test]
    fn synthesis_user_prompt_contains_question() {
        let prompt = synthesis_user_prompt("What is the notice period?", &[sample_item(1)], &[]);
        assert!(prompt.contains("What is the notice period?"));
        assert!(prompt.contains("Context excerpts"));
    }
}
