//! The self-correction loop's deterministic decision function (spec §4.1).
//! A plain function rather than a trait: the rule is a fixed, ordered
//! cascade, not a collaborator with a swappable implementation.

use zimlex_core::Complexity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Pass,
    PassWithWarning,
    Refine,
    RetrieveMore,
}

const QUALITY_PASS_THRESHOLD: f32 = 0.8;
const MAX_REFINEMENT_ITERATIONS: u8 = 2;

fn issues_contain_any(issues: &[String], tokens: &[&str]) -> bool {
    issues.iter().any(|issue| {
        let lower = issue.to_lowercase();
        tokens.iter().any(|token| lower.contains(token))
    })
}

/// Mirrors §4.1's cascade exactly: pass → iteration cap (fail-safe) →
/// insufficient-sources → coherence-band refine → expert-low-confidence
/// refine → pass.
pub fn decide(
    quality_passed: bool,
    quality_confidence: f32,
    quality_issues: &[String],
    refinement_iteration: u8,
    complexity: Complexity,
) -> Decision {
    if quality_passed && quality_confidence >= QUALITY_PASS_THRESHOLD {
        return Decision::Pass;
    }
    if refinement_iteration >= MAX_REFINEMENT_ITERATIONS {
        return Decision::PassWithWarning;
    }
    if issues_contain_any(quality_issues, &["insufficient", "missing source"]) {
        return Decision::RetrieveMore;
    }
    if issues_contain_any(quality_issues, &["coherence", "logic"])
        && (0.5..0.8).contains(&quality_confidence)
    {
        return Decision::Refine;
    }
    if complexity == Complexity::Expert && quality_confidence < 0.7 {
        return Decision::Refine;
    }
    Decision::Pass
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_confidence_pass_short_circuits_everything() {
        let decision = decide(true, 0.95, &["insufficient".into()], 0, Complexity::Expert);
        assert_eq!(decision, Decision::Pass);
    }

    #[test]
    fn iteration_cap_forces_pass_with_warning() {
        let decision = decide(false, 0.3, &["insufficient".into()], 2, Complexity::Simple);
        assert_eq!(decision, Decision::PassWithWarning);
    }

    #[test]
    fn insufficient_sources_triggers_retrieve_more() {
        let decision = decide(false, 0.4, &["no case law cited, insufficient authority".into()], 0, Complexity::Moderate);
        assert_eq!(decision, Decision::RetrieveMore);
    }

    #[test]
    fn coherence_issue_in_band_triggers_refine() {
        let decision = decide(false, 0.6, &["weak coherence in application section".into()], 0, Complexity::Moderate);
        assert_eq!(decision, Decision::Refine);
    }

    #[test]
    fn expert_low_confidence_triggers_refine_even_without_named_issue() {
        let decision = decide(false, 0.65, &["minor stylistic nit".into()], 0, Complexity::Expert);
        assert_eq!(decision, Decision::Refine);
    }

    #[test]
    fn unclassified_low_confidence_on_non_expert_defaults_to_pass() {
        let decision = decide(false, 0.65, &["minor stylistic nit".into()], 0, Complexity::Moderate);
        assert_eq!(decision, Decision::Pass);
    }
}
