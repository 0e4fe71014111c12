//! Unified, token-budgeted context assembly from short-term and long-term
//! memory (spec §4.11). Fetches both tiers concurrently via `tokio::join!`,
//! the named parallelism opportunity in §5.

use crate::long_term::LongTermMemory;
use crate::short_term::{Message, ShortTermMemory};
use zimlex_core::{Complexity, UserType};

/// 70% of the memory token budget goes to short-term context, 30% to
/// long-term profile derivation (the profile itself is cheap to represent,
/// but the split keeps the allocation explicit and tunable).
const SHORT_TERM_SHARE: f32 = 0.7;

#[derive(Debug, Clone)]
pub struct CombinedMemoryContext {
    pub short_term_context: Vec<Message>,
    pub top_legal_interests: Vec<String>,
    pub is_returning_user: bool,
    pub typical_complexity: Complexity,
    pub expertise_level: UserType,
    pub tokens_used: usize,
}

pub struct MemoryCoordinator {
    short_term: ShortTermMemory,
    long_term: LongTermMemory,
}

impl MemoryCoordinator {
    pub fn new(short_term: ShortTermMemory, long_term: LongTermMemory) -> Self {
        Self {
            short_term,
            long_term,
        }
    }

    pub async fn fetch(
        &self,
        session_id: &str,
        user_id: &str,
        token_budget: usize,
    ) -> CombinedMemoryContext {
        let short_term_budget = ((token_budget as f32) * SHORT_TERM_SHARE) as usize;

        let (short_term_context, profile) = tokio::join!(
            self.short_term.get_context(session_id, short_term_budget),
            self.long_term.get_profile(user_id)
        );

        let tokens_used = short_term_context
            .iter()
            .map(|m| (m.content.len() / 4).max(1))
            .sum();

        CombinedMemoryContext {
            is_returning_user: profile.is_returning_user(),
            typical_complexity: profile.typical_complexity,
            expertise_level: profile.expertise,
            top_legal_interests: profile.top_legal_interests(5),
            short_term_context,
            tokens_used,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeProfileStore, FakeShortTermStore};
    use crate::short_term::Role;
    use std::sync::Arc;

    async fn coordinator() -> (MemoryCoordinator, ShortTermMemory) {
        let short_store = Arc::new(FakeShortTermStore::default());
        let short_term = ShortTermMemory::new(short_store, 10);
        let long_term = LongTermMemory::new(Arc::new(FakeProfileStore::default()));
        (
            MemoryCoordinator::new(short_term.clone(), long_term),
            short_term,
        )
    }

    #[tokio::test]
    async fn fetch_combines_both_tiers_concurrently() {
        let (coordinator, short_term) = coordinator().await;
        short_term
            .append("s1", Role::User, "what about notice periods?", serde_json::Value::Null)
            .await
            .unwrap();

        let context = coordinator.fetch("s1", "u1", 1000).await;
        assert_eq!(context.short_term_context.len(), 1);
        assert!(!context.is_returning_user);
        assert_eq!(context.typical_complexity, Complexity::Simple);
    }

    #[tokio::test]
    async fn short_term_budget_is_seventy_percent_of_total() {
        let (coordinator, short_term) = coordinator().await;
        for i in 0..3 {
            short_term
                .append("s1", Role::User, &"w".repeat(40), serde_json::Value::Null)
                .await
                .unwrap();
            let _ = i;
        }
        // Budget of 100 tokens total -> 70 for short term -> ~7 messages
        // of 10-token cost admitted at most; just assert it doesn't exceed
        // the unconstrained count and tokens_used stays bounded.
        let context = coordinator.fetch("s1", "u1", 100).await;
        assert!(context.tokens_used <= 70 + 10);
    }
}
