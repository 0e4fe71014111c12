//! Model-backed external collaborators: the large-language model (multiple
//! tiers), the embedding model, and the cross-encoder reranker model.

use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// `stream_complete(system_prompt, user_prompt, max_tokens, temperature) ->
/// async iterator[token]`. Tokens are pushed onto `sender` in generation
/// order; the call resolves once generation is complete (or fails).
/// Multiple model tiers (small for classification/critique/coherence, large
/// for synthesis) are distinct instances of the same trait, selected by the
/// caller, not distinguished at the trait level.
#[async_trait]
pub trait LlmBackend: Send + Sync + 'static {
    async fn stream_complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: usize,
        temperature: f32,
        sender: mpsc::Sender<String>,
    ) -> Result<()>;

    /// Non-streaming convenience used by JSON-contract callers (classifier,
    /// self-critic, coherence check) that need the whole completion before
    /// parsing it as structured output.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: usize,
        temperature: f32,
    ) -> Result<String> {
        let (tx, mut rx) = mpsc::channel(64);
        self.stream_complete(system_prompt, user_prompt, max_tokens, temperature, tx)
            .await?;
        let mut out = String::new();
        while let Some(tok) = rx.recv().await {
            out.push_str(&tok);
        }
        Ok(out)
    }

    /// Logical model name/tier, used in timing and tracing fields.
    fn name(&self) -> &str;
}

/// `embed(batch[string]) -> list[vector]`.
#[async_trait]
pub trait EmbeddingModel: Send + Sync + 'static {
    async fn embed(&self, batch: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;
}

/// `score(query, batch[chunk text]) -> list[float]`.
#[async_trait]
pub trait CrossEncoder: Send + Sync + 'static {
    async fn score(&self, query: &str, batch: &[String]) -> Result<Vec<f32>>;
}
