//! Deterministic `LlmBackend` fakes: the safe-disabled-mode wiring for
//! both model tiers, and scripted fixtures for tests that need a
//! controllable first-token delay (to exercise the speculative downgrade
//! in [`crate::speculative`]) without a real model dependency — the same
//! "fake behind a trait, with scripted timeouts" pattern used throughout
//! this workspace's other crates (`cache`, `memory`, `retrieval`).

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use zimlex_core::{LlmBackend, Result};

/// Always returns a fixed refusal-shaped completion. Used as the
/// `small`/`large` tier wiring when no backend is configured.
pub struct DisabledLlmBackend {
    name: String,
}

impl DisabledLlmBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl LlmBackend for DisabledLlmBackend {
    async fn stream_complete(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _max_tokens: usize,
        _temperature: f32,
        sender: mpsc::Sender<String>,
    ) -> Result<()> {
        let _ = sender
            .send("No language model is configured for this deployment.".to_string())
            .await;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Emits a scripted token list after an optional artificial delay before
/// the first token, so tests can assert on the speculative executor's
/// first-token-deadline downgrade without real network latency.
pub struct ScriptedLlmBackend {
    name: String,
    tokens: Vec<String>,
    first_token_delay: Duration,
}

impl ScriptedLlmBackend {
    pub fn new(name: impl Into<String>, tokens: Vec<String>, first_token_delay: Duration) -> Self {
        Self {
            name: name.into(),
            tokens,
            first_token_delay,
        }
    }
}

#[async_trait]
impl LlmBackend for ScriptedLlmBackend {
    async fn stream_complete(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _max_tokens: usize,
        _temperature: f32,
        sender: mpsc::Sender<String>,
    ) -> Result<()> {
        tokio::time::sleep(self.first_token_delay).await;
        for token in &self.tokens {
            if sender.send(token.clone()).await.is_err() {
                return Ok(());
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_backend_emits_a_single_refusal_token() {
        let backend = DisabledLlmBackend::new("small");
        let text = backend.complete("system", "user", 100, 0.0).await.unwrap();
        assert!(text.contains("No language model"));
    }

    #[tokio::test]
    async fn scripted_backend_emits_tokens_in_order_after_delay() {
        let backend = ScriptedLlmBackend::new(
            "large",
            vec!["hello".to_string(), " world".to_string()],
            Duration::from_millis(5),
        );
        let text = backend.complete("system", "user", 100, 0.0).await.unwrap();
        assert_eq!(text, "hello world");
    }
}
