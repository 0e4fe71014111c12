//! Speculative, latency-bounded synthesis: race the large tier's first
//! token against a deadline, downgrading to the small tier for the rest
//! of generation if it is missed.
//!
//! Grounded on the teacher's `llm::speculative::SpeculativeExecutor` (a
//! multi-tier model pool racing a deadline, swapping to a faster tier on
//! a slow first token) — this module keeps that one strategy (the first-
//! token downgrade) and drops the teacher's SLM-First/Race-Parallel/
//! Hybrid-Streaming/Draft-Verify repertoire, none of which this system
//! needs.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use zimlex_core::{Error, LlmBackend, Result};

pub struct SpeculativeSynthesizer {
    large: Arc<dyn LlmBackend>,
    small: Arc<dyn LlmBackend>,
    first_token_deadline: Duration,
}

#[derive(Debug, Clone)]
pub struct SpeculativeOutcome {
    pub text: String,
    pub tier_used: String,
    pub downgraded: bool,
}

impl SpeculativeSynthesizer {
    pub fn new(large: Arc<dyn LlmBackend>, small: Arc<dyn LlmBackend>, first_token_deadline_ms: u64) -> Self {
        Self {
            large,
            small,
            first_token_deadline: Duration::from_millis(first_token_deadline_ms),
        }
    }

    /// Streams tokens into `sender` as they are produced (generation order
    /// preserved), returning the full accumulated text plus which tier
    /// ultimately served the request.
    pub async fn stream_complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: usize,
        temperature: f32,
        sender: mpsc::Sender<String>,
    ) -> Result<SpeculativeOutcome> {
        let (internal_tx, mut internal_rx) = mpsc::channel::<String>(64);
        let large = self.large.clone();
        let large_name = self.large.name().to_string();
        let system = system_prompt.to_string();
        let user = user_prompt.to_string();

        let large_task = tokio::spawn(async move {
            large
                .stream_complete(&system, &user, max_tokens, temperature, internal_tx)
                .await
        });

        match tokio::time::timeout(self.first_token_deadline, internal_rx.recv()).await {
            Ok(Some(first_token)) => {
                let mut text = first_token.clone();
                let mut broken = sender.send(first_token).await.is_err();
                while !broken {
                    match internal_rx.recv().await {
                        Some(token) => {
                            text.push_str(&token);
                            broken = sender.send(token).await.is_err();
                        }
                        None => break,
                    }
                }
                large_task.abort();
                Ok(SpeculativeOutcome {
                    text,
                    tier_used: large_name,
                    downgraded: false,
                })
            }
            Ok(None) => {
                // Large tier finished (or errored) with zero tokens before the
                // deadline elapsed; nothing to downgrade to mid-stream, the
                // caller just gets an empty result rather than a second call.
                let _ = large_task.await;
                Ok(SpeculativeOutcome {
                    text: String::new(),
                    tier_used: large_name,
                    downgraded: false,
                })
            }
            Err(_) => {
                tracing::warn!(
                    deadline_ms = self.first_token_deadline.as_millis() as u64,
                    "large-tier first token missed deadline, downgrading to small tier"
                );
                large_task.abort();
                let small = self.small.clone();
                let small_name = self.small.name().to_string();
                let mut text = String::new();
                let (small_tx, mut small_rx) = mpsc::channel::<String>(64);
                let small_system = system_prompt.to_string();
                let small_user = user_prompt.to_string();
                let small_task = tokio::spawn(async move {
                    small
                        .stream_complete(&small_system, &small_user, max_tokens, temperature, small_tx)
                        .await
                });
                while let Some(token) = small_rx.recv().await {
                    text.push_str(&token);
                    if sender.send(token).await.is_err() {
                        break;
                    }
                }
                small_task
                    .await
                    .map_err(|e| Error::Llm(format!("small-tier synthesis task panicked: {e}")))??;
                Ok(SpeculativeOutcome {
                    text,
                    tier_used: small_name,
                    downgraded: true,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::ScriptedLlmBackend;

    #[tokio::test]
    async fn fast_large_tier_is_used_without_downgrade() {
        let large = Arc::new(ScriptedLlmBackend::new(
            "large",
            vec!["fast".to_string()],
            Duration::from_millis(5),
        ));
        let small = Arc::new(ScriptedLlmBackend::new(
            "small",
            vec!["slow-fallback".to_string()],
            Duration::from_millis(5),
        ));
        let synthesizer = SpeculativeSynthesizer::new(large, small, 400);
        let (tx, mut rx) = mpsc::channel(16);
        let outcome = synthesizer
            .stream_complete("system", "user", 100, 0.1, tx)
            .await
            .unwrap();
        assert_eq!(outcome.tier_used, "large");
        assert!(!outcome.downgraded);
        assert_eq!(rx.recv().await, Some("fast".to_string()));
    }

    #[tokio::test]
    async fn slow_large_tier_downgrades_to_small() {
        let large = Arc::new(ScriptedLlmBackend::new(
            "large",
            vec!["too-late".to_string()],
            Duration::from_millis(500),
        ));
        let small = Arc::new(ScriptedLlmBackend::new(
            "small",
            vec!["fallback".to_string()],
            Duration::from_millis(1),
        ));
        let synthesizer = SpeculativeSynthesizer::new(large, small, 50);
        let (tx, mut rx) = mpsc::channel(16);
        let outcome = synthesizer
            .stream_complete("system", "user", 100, 0.1, tx)
            .await
            .unwrap();
        assert_eq!(outcome.tier_used, "small");
        assert!(outcome.downgraded);
        assert_eq!(rx.recv().await, Some("fallback".to_string()));
    }
}
