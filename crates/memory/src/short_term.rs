//! Per-session sliding window of recent exchanges (spec §4.11, "Short-Term
//! Memory operations").

use crate::error::MemoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use zimlex_core::ShortTermStore;

const SESSION_TTL: Duration = Duration::from_secs(86_400);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// One user/assistant pair, the unit `last_n_exchanges` groups messages
/// into.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub user: Message,
    pub assistant: Option<Message>,
}

fn session_key(session_id: &str) -> String {
    format!("session:{}:messages", session_id)
}

/// Rough token estimate (chars / 4), the same cheap heuristic the memory
/// coordinator uses to stay within its token budget without a tokenizer
/// dependency on the hot path.
fn estimate_tokens(text: &str) -> usize {
    (text.len() / 4).max(1)
}

#[derive(Clone)]
pub struct ShortTermMemory {
    store: Arc<dyn ShortTermStore>,
    window: usize,
}

impl ShortTermMemory {
    pub fn new(store: Arc<dyn ShortTermStore>, window: usize) -> Self {
        Self { store, window }
    }

    /// `append(session_id, role, content, metadata)`: push newest, trim to
    /// the N-newest window, reset TTL.
    pub async fn append(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
        metadata: serde_json::Value,
    ) -> Result<(), MemoryError> {
        let message = Message {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
            metadata,
        };
        let serialized = serde_json::to_string(&message)
            .map_err(|e| MemoryError::StoreUnavailable(e.to_string()))?;
        let key = session_key(session_id);
        self.store
            .push_front(&key, serialized)
            .await
            .map_err(|e| MemoryError::StoreUnavailable(e.to_string()))?;
        self.store
            .trim(&key, self.window)
            .await
            .map_err(|e| MemoryError::StoreUnavailable(e.to_string()))?;
        self.store
            .set_ttl(&key, SESSION_TTL)
            .await
            .map_err(|e| MemoryError::StoreUnavailable(e.to_string()))?;
        Ok(())
    }

    /// `get_context(session_id, max_tokens)`: oldest-to-newest, bounded by
    /// a token budget. Messages are stored newest-first; newest-first is
    /// consumed until the budget is exhausted, then reversed.
    pub async fn get_context(&self, session_id: &str, max_tokens: usize) -> Vec<Message> {
        let raw = match self.store.range(&session_key(session_id), 0, -1).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(%err, session_id, "short-term store unavailable, degrading to empty context");
                return Vec::new();
            }
        };

        let mut budget = max_tokens;
        let mut newest_first = Vec::new();
        for entry in raw {
            let Ok(message) = serde_json::from_str::<Message>(&entry) else {
                continue;
            };
            let cost = estimate_tokens(&message.content);
            if cost > budget && !newest_first.is_empty() {
                break;
            }
            budget = budget.saturating_sub(cost);
            newest_first.push(message);
        }
        newest_first.reverse();
        newest_first
    }

    /// `last_n_exchanges(session_id, n)`: group user/assistant turns into
    /// exchanges, most recent first.
    pub async fn last_n_exchanges(&self, session_id: &str, n: usize) -> Vec<Exchange> {
        let raw = match self
            .store
            .range(&session_key(session_id), 0, (self.window as isize) - 1)
            .await
        {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        // `raw` is newest-first; walk it pairing an Assistant with the
        // User message immediately after it (chronologically before it).
        let messages: Vec<Message> = raw
            .into_iter()
            .filter_map(|entry| serde_json::from_str::<Message>(&entry).ok())
            .collect();

        let mut exchanges = Vec::new();
        let mut i = 0;
        while i < messages.len() && exchanges.len() < n {
            match messages[i].role {
                Role::Assistant => {
                    if let Some(user) = messages.get(i + 1).cloned() {
                        if matches!(user.role, Role::User) {
                            exchanges.push(Exchange {
                                user,
                                assistant: Some(messages[i].clone()),
                            });
                            i += 2;
                            continue;
                        }
                    }
                    i += 1;
                }
                Role::User => {
                    exchanges.push(Exchange {
                        user: messages[i].clone(),
                        assistant: None,
                    });
                    i += 1;
                }
            }
        }
        exchanges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeShortTermStore;

    fn memory(window: usize) -> ShortTermMemory {
        ShortTermMemory::new(Arc::new(FakeShortTermStore::default()), window)
    }

    #[tokio::test]
    async fn append_then_get_context_round_trips() {
        let memory = memory(10);
        memory
            .append("s1", Role::User, "what is the minimum wage?", serde_json::Value::Null)
            .await
            .unwrap();
        let context = memory.get_context("s1", 1000).await;
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].content, "what is the minimum wage?");
    }

    #[tokio::test]
    async fn window_trims_to_n_newest_oldest_evicted_first() {
        let memory = memory(3);
        for i in 0..5 {
            memory
                .append("s1", Role::User, &format!("message {i}"), serde_json::Value::Null)
                .await
                .unwrap();
        }
        let context = memory.get_context("s1", 10_000).await;
        assert_eq!(context.len(), 3);
        assert_eq!(context[0].content, "message 2");
        assert_eq!(context[2].content, "message 4");
    }

    #[tokio::test]
    async fn get_context_respects_token_budget() {
        let memory = memory(10);
        memory
            .append("s1", Role::User, &"x".repeat(400), serde_json::Value::Null)
            .await
            .unwrap();
        memory
            .append("s1", Role::Assistant, &"y".repeat(400), serde_json::Value::Null)
            .await
            .unwrap();
        // Each message costs ~100 tokens; budget of 100 admits only the
        // newest message.
        let context = memory.get_context("s1", 100).await;
        assert_eq!(context.len(), 1);
        assert!(context[0].content.starts_with('y'));
    }

    #[tokio::test]
    async fn last_n_exchanges_pairs_user_and_assistant() {
        let memory = memory(10);
        memory
            .append("s1", Role::User, "question", serde_json::Value::Null)
            .await
            .unwrap();
        memory
            .append("s1", Role::Assistant, "answer", serde_json::Value::Null)
            .await
            .unwrap();
        let exchanges = memory.last_n_exchanges("s1", 2).await;
        assert_eq!(exchanges.len(), 1);
        assert_eq!(exchanges[0].user.content, "question");
        assert_eq!(exchanges[0].assistant.as_ref().unwrap().content, "answer");
    }
}
