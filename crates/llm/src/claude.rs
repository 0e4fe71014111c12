//! Claude-backed `LlmBackend` (spec §6's large-language-model collaborator).
//!
//! Grounded on the teacher's `llm::claude::ClaudeBackend`: same `ClaudeModel`
//! enum and `model_id()` mapping, same Messages-API request shape, same
//! SSE-over-`reqwest::bytes_stream` token-delta parsing. Generalized to
//! implement `zimlex_core::LlmBackend` (`stream_complete` into an
//! `mpsc::Sender<String>`) instead of the teacher's own internal
//! `backend::LlmBackend` trait, and stripped of tool-use support, which
//! none of this system's components need.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use zimlex_core::{Error, LlmBackend, Result};

/// Claude model variants, matching the teacher's enum and model-id strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaudeModel {
    Opus4_5,
    Sonnet4,
    Haiku3_5,
}

impl ClaudeModel {
    pub fn model_id(&self) -> &'static str {
        match self {
            ClaudeModel::Opus4_5 => "claude-opus-4-5-20251101",
            ClaudeModel::Sonnet4 => "claude-sonnet-4-20250514",
            ClaudeModel::Haiku3_5 => "claude-3-5-haiku-20241022",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "opus" | "opus-4.5" | "claude-opus-4-5-20251101" => Some(ClaudeModel::Opus4_5),
            "sonnet" | "sonnet-4" | "claude-sonnet-4-20250514" => Some(ClaudeModel::Sonnet4),
            "haiku" | "haiku-3.5" | "claude-3-5-haiku-20241022" => Some(ClaudeModel::Haiku3_5),
            _ => None,
        }
    }
}

impl Default for ClaudeModel {
    fn default() -> Self {
        ClaudeModel::Sonnet4
    }
}

#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    pub api_key: String,
    pub model: ClaudeModel,
    pub endpoint: String,
    pub timeout: Duration,
    /// Logical tier name surfaced via `LlmBackend::name`, e.g. `"small"`/`"large"`.
    pub tier_name: String,
}

pub struct ClaudeBackend {
    config: ClaudeConfig,
    client: Client,
}

impl ClaudeBackend {
    pub fn new(config: ClaudeConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(Error::Llm("ANTHROPIC_API_KEY not set for Claude backend".to_string()));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Llm(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }
}

#[derive(Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ClaudeMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeApiResponse {
    content: Vec<ClaudeContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClaudeContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClaudeStreamEvent {
    ContentBlockDelta { delta: ClaudeDelta },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClaudeDelta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[async_trait]
impl LlmBackend for ClaudeBackend {
    async fn stream_complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: usize,
        temperature: f32,
        sender: mpsc::Sender<String>,
    ) -> Result<()> {
        let request = ClaudeRequest {
            model: self.config.model.model_id(),
            max_tokens,
            messages: vec![ClaudeMessage {
                role: "user",
                content: user_prompt.to_string(),
            }],
            system: if system_prompt.is_empty() { None } else { Some(system_prompt) },
            temperature,
            stream: true,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.endpoint))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Llm(format!("Claude request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("Claude API returned {status}: {body}")));
        }

        use futures::StreamExt;
        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Llm(format!("Claude stream read failed: {e}")))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].trim().to_string();
                buffer = buffer[line_end + 1..].to_string();

                if line.is_empty() {
                    continue;
                }
                let Some(json_str) = line.strip_prefix("data: ") else {
                    continue;
                };
                if json_str == "[DONE]" {
                    continue;
                }
                let Ok(event) = serde_json::from_str::<ClaudeStreamEvent>(json_str) else {
                    continue;
                };
                if let ClaudeStreamEvent::ContentBlockDelta {
                    delta: ClaudeDelta::TextDelta { text },
                } = event
                {
                    if sender.send(text).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }

        Ok(())
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: usize,
        temperature: f32,
    ) -> Result<String> {
        let request = ClaudeRequest {
            model: self.config.model.model_id(),
            max_tokens,
            messages: vec![ClaudeMessage {
                role: "user",
                content: user_prompt.to_string(),
            }],
            system: if system_prompt.is_empty() { None } else { Some(system_prompt) },
            temperature,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.endpoint))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Llm(format!("Claude request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("Claude API returned {status}: {body}")));
        }

        let parsed: ClaudeApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Llm(format!("Claude response decode failed: {e}")))?;

        let mut text = String::new();
        for block in parsed.content {
            if let ClaudeContentBlock::Text { text: t } = block {
                text.push_str(&t);
            }
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.config.tier_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_id_matches_anthropic_literal_strings() {
        assert_eq!(ClaudeModel::Opus4_5.model_id(), "claude-opus-4-5-20251101");
        assert_eq!(ClaudeModel::Sonnet4.model_id(), "claude-sonnet-4-20250514");
        assert_eq!(ClaudeModel::Haiku3_5.model_id(), "claude-3-5-haiku-20241022");
    }

    #[test]
    fn from_str_accepts_aliases_and_literal_ids() {
        assert_eq!(ClaudeModel::from_str("opus"), Some(ClaudeModel::Opus4_5));
        assert_eq!(ClaudeModel::from_str("claude-sonnet-4-20250514"), Some(ClaudeModel::Sonnet4));
        assert_eq!(ClaudeModel::from_str("bogus"), None);
    }

    #[test]
    fn empty_api_key_is_rejected_at_construction() {
        let config = ClaudeConfig {
            api_key: String::new(),
            model: ClaudeModel::Haiku3_5,
            endpoint: "https://api.anthropic.com".to_string(),
            timeout: Duration::from_secs(30),
            tier_name: "small".to_string(),
        };
        assert!(ClaudeBackend::new(config).is_err());
    }

    #[test]
    fn stream_event_ignores_unknown_variants() {
        let raw = r#"{"type":"ping"}"#;
        let event: ClaudeStreamEvent = serde_json::from_str(raw).unwrap();
        assert!(matches!(event, ClaudeStreamEvent::Other));
    }
}
