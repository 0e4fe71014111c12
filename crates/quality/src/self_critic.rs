//! Self-critic (spec §4.9): given the final answer and quality issues,
//! produce refinement instructions. Malformed model output falls back to a
//! templated instruction list derived directly from `quality_issues`, the
//! same fallback shape used by the JSON-contract paths elsewhere in this
//! workspace (intent classifier, config loading).

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use zimlex_core::LlmBackend;

const SELF_CRITIC_DEADLINE: Duration = Duration::from_millis(800);
const MIN_INSTRUCTIONS: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct SelfCriticOutput {
    pub refinement_instructions: Vec<String>,
    pub priority_fixes: Vec<String>,
    pub suggested_additions: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelCritique {
    #[serde(default)]
    refinement_instructions: Vec<String>,
    #[serde(default)]
    priority_fixes: Vec<String>,
    #[serde(default)]
    suggested_additions: Vec<String>,
}

pub struct SelfCritic {
    small_model: Arc<dyn LlmBackend>,
}

impl SelfCritic {
    pub fn new(small_model: Arc<dyn LlmBackend>) -> Self {
        Self { small_model }
    }

    pub async fn run(&self, final_answer: &str, quality_issues: &[String]) -> SelfCriticOutput {
        let system = "Given a legal answer and the quality issues found with it, produce strict \
            JSON: {\"refinement_instructions\": [string, at least 3], \"priority_fixes\": [string], \
            \"suggested_additions\": [string]}.";
        let user = format!("Issues: {quality_issues:?}\n\nAnswer:\n{final_answer}");

        let result = tokio::time::timeout(SELF_CRITIC_DEADLINE, self.small_model.complete(system, &user, 400, 0.2)).await;

        let critique = match result {
            Ok(Ok(raw)) => serde_json::from_str::<ModelCritique>(&raw).ok(),
            _ => None,
        };

        match critique {
            Some(critique) if critique.refinement_instructions.len() >= MIN_INSTRUCTIONS => SelfCriticOutput {
                refinement_instructions: critique.refinement_instructions,
                priority_fixes: critique.priority_fixes,
                suggested_additions: critique.suggested_additions,
            },
            _ => templated_fallback(quality_issues),
        }
    }
}

/// Templated instruction list derived from `quality_issues` when the model
/// output is malformed or short of the minimum instruction count.
fn templated_fallback(quality_issues: &[String]) -> SelfCriticOutput {
    let mut refinement_instructions: Vec<String> = quality_issues
        .iter()
        .map(|issue| format!("Address the following quality issue: {issue}"))
        .collect();
    while refinement_instructions.len() < MIN_INSTRUCTIONS {
        refinement_instructions.push("Add an explicit citation before every substantive statement.".to_string());
    }
    SelfCriticOutput {
        refinement_instructions,
        priority_fixes: quality_issues.to_vec(),
        suggested_additions: Vec::new(),
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
            "fake-critic-model"
        }
    }

    #[tokio::test]
    async fn well_formed_critique_is_used_verbatim() {
        let critic = SelfCritic::new(Arc::new(FakeModel {
            response: r#"{"refinement_instructions": ["a", "b", "c"], "priority_fixes": ["a"], "suggested_additions": []}"#.to_string(),
        }));
        let output = critic.run("answer text", &["no case law cited".to_string()]).await;
        assert_eq!(output.refinement_instructions, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn malformed_json_falls_back_to_template() {
        let critic = SelfCritic::new(Arc::new(FakeModel {
            response: "not json".to_string(),
        }));
        let issues = vec!["attribution density too low".to_string()];
        let output = critic.run("answer text", &issues).await;
        assert!(output.refinement_instructions.len() >= MIN_INSTRUCTIONS);
        assert!(output.refinement_instructions[0].contains("attribution density too low"));
    }

    #[tokio::test]
    async fn short_instruction_list_falls_back_to_template() {
        let critic = SelfCritic::new(Arc::new(FakeModel {
            response: r#"{"refinement_instructions": ["only one"]}"#.to_string(),
        }));
        let output = critic.run("answer text", &["issue one".to_string()]).await;
        assert!(output.refinement_instructions.len() >= MIN_INSTRUCTIONS);
    }
}
