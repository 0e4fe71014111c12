//! Refined synthesizer (spec §4.9): identical contract to the primary
//! synthesizer, but receives the original answer (truncated) plus the
//! self-critic's refinement fields. Delegates to the same `LlmBackend`
//! used by the primary synthesizer, with a different prompt-construction
//! function. On failure, the original answer is kept unchanged.

use crate::self_critic::SelfCriticOutput;
use std::sync::Arc;
use std::time::Duration;
use zimlex_core::LlmBackend;

const ORIGINAL_ANSWER_TRUNCATION_CHARS: usize = 500;
const REFINED_SYNTHESIS_DEADLINE: Duration = Duration::from_secs(20);

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    if text.len() <= max_chars {
        return text;
    }
    let mut end = max_chars;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn build_refined_prompt(original_answer: &str, refinement: &SelfCriticOutput) -> String {
    let truncated = truncate_chars(original_answer, ORIGINAL_ANSWER_TRUNCATION_CHARS);
    format!(
        "Original answer (truncated):\n{truncated}\n\n\
         Refinement instructions:\n{}\n\n\
         Priority fixes:\n{}\n\n\
         Suggested additions:\n{}\n\n\
         Produce a corrected, complete answer that addresses every instruction above.",
        refinement.refinement_instructions.join("\n"),
        refinement.priority_fixes.join("\n"),
        refinement.suggested_additions.join("\n"),
    )
}

pub struct RefinedSynthesizer {
    model: Arc<dyn LlmBackend>,
}

impl RefinedSynthesizer {
    pub fn new(model: Arc<dyn LlmBackend>) -> Self {
        Self { model }
    }

    pub async fn run(
        &self,
        system_prompt: &str,
        original_answer: &str,
        refinement: &SelfCriticOutput,
        max_tokens: usize,
    ) -> String {
        let user_prompt = build_refined_prompt(original_answer, refinement);
        let result = tokio::time::timeout(
            REFINED_SYNTHESIS_DEADLINE,
            self.model.complete(system_prompt, &user_prompt, max_tokens, 0.1),
        )
        .await;

        match result {
            Ok(Ok(refined)) if !refined.trim().is_empty() => refined,
            Ok(Ok(_)) => {
                tracing::warn!("refined synthesis returned an empty answer, keeping original");
                original_answer.to_string()
            }
            Ok(Err(err)) => {
                tracing::warn!(%err, "refined synthesis model call failed, keeping original");
                original_answer.to_string()
            }
            Err(_) => {
                tracing::warn!("refined synthesis timed out, keeping original");
                original_answer.to_string()
            }
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
        response: Result<String>,
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
            if let Ok(text) = &self.response {
                let _ = sender.send(text.clone()).await;
            }
            Ok(())
        }

        async fn complete(
            &self,
            _system_prompt: &str,
            _user_prompt: &str,
            _max_tokens: usize,
            _temperature: f32,
        ) -> Result<String> {
            match &self.response {
                Ok(text) => Ok(text.clone()),
                Err(_) => Err(zimlex_core::Error::Llm("boom".to_string())),
            }
        }

        fn name(&self) -> &str {
            "fake-refiner-model"
        }
    }

    fn refinement() -> SelfCriticOutput {
        SelfCriticOutput {
            refinement_instructions: vec!["add a citation".to_string()],
            priority_fixes: vec![],
            suggested_additions: vec![],
        }
    }

    #[tokio::test]
    async fn successful_refinement_overrides_original() {
        let synthesizer = RefinedSynthesizer::new(Arc::new(FakeModel {
            response: Ok("a fully corrected answer".to_string()),
        }));
        let result = synthesizer.run("system", "original answer", &refinement(), 500).await;
        assert_eq!(result, "a fully corrected answer");
    }

    #[tokio::test]
    async fn failed_refinement_keeps_original() {
        let synthesizer = RefinedSynthesizer::new(Arc::new(FakeModel {
            response: Err(zimlex_core::Error::Llm("boom".to_string())),
        }));
        let result = synthesizer.run("system", "original answer", &refinement(), 500).await;
        assert_eq!(result, "original answer");
    }

    #[test]
    fn prompt_truncates_long_original_answer() {
        let long_answer = "x".repeat(1000);
        let prompt = build_refined_prompt(&long_answer, &refinement());
        assert!(prompt.len() < long_answer.len() + 500);
    }
}
