//! `EmbeddingModel` adapter (spec §6): `embed(batch[string]) -> list[vector]`.
//!
//! The production adapter speaks an OpenAI-compatible `/v1/embeddings`
//! endpoint, generalized the same way `LlmTierConfig` generalizes the
//! teacher's `ClaudeConfig` — `endpoint`/`api_key` are enough to front
//! any provider that speaks this shape. `HashingEmbeddingModel` is the
//! deterministic disabled-mode/test fake, following the same
//! safe-disabled-mode convention `BackendConfig::is_configured()` already
//! establishes for every other backend in this workspace: a fixed,
//! content-derived vector rather than a zero vector, so cosine-similarity
//! tests over it are not degenerate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use zimlex_core::{EmbeddingModel, Error, Result};

pub const DEFAULT_DIMENSION: usize = 256;

#[derive(Debug, Clone)]
pub struct HttpEmbeddingConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub dimension: usize,
    pub timeout: Duration,
}

pub struct HttpEmbeddingModel {
    config: HttpEmbeddingConfig,
    client: reqwest::Client,
}

impl HttpEmbeddingModel {
    pub fn new(config: HttpEmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Llm(format!("failed to build embedding HTTP client: {e}")))?;
        Ok(Self { config, client })
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingModel for HttpEmbeddingModel {
    async fn embed(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.config.model,
            input: batch,
        };

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.config.endpoint))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Llm(format!("embedding request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("embedding API returned {status}: {body}")));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Llm(format!("embedding response decode failed: {e}")))?;

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

/// Deterministic, content-derived vector with no network dependency: the
/// safe-disabled-mode wiring for the embedding model, and a fixture
/// downstream crates (retrieval, cache) can exercise cosine-similarity
/// logic against without a real model.
pub struct HashingEmbeddingModel {
    dimension: usize,
}

impl HashingEmbeddingModel {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashingEmbeddingModel {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

fn hash_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dimension];
    let normalized = text.to_lowercase();
    for (position, token) in normalized.split_whitespace().enumerate() {
        let mut hash: u64 = 1469598103934665603; // FNV offset basis
        for byte in token.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(1099511628211); // FNV prime
        }
        let bucket = (hash as usize) % dimension;
        let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        let decay = 1.0 / (1.0 + position as f32 * 0.05);
        vector[bucket] += sign * decay;
    }
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
    vector
}

#[async_trait]
impl EmbeddingModel for HashingEmbeddingModel {
    async fn embed(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(batch.iter().map(|text| hash_embed(text, self.dimension)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashing_model_is_deterministic() {
        let model = HashingEmbeddingModel::default();
        let first = model.embed(&["minimum wage in Zimbabwe".to_string()]).await.unwrap();
        let second = model.embed(&["minimum wage in Zimbabwe".to_string()]).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn hashing_model_produces_unit_vectors() {
        let model = HashingEmbeddingModel::default();
        let vectors = model.embed(&["unfair dismissal procedure".to_string()]).await.unwrap();
        let norm: f32 = vectors[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn distinct_queries_yield_distinct_vectors() {
        let model = HashingEmbeddingModel::default();
        let a = &model.embed(&["minimum wage".to_string()]).await.unwrap()[0];
        let b = &model.embed(&["notice period".to_string()]).await.unwrap()[0];
        assert_ne!(a, b);
    }
}
