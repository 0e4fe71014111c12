//! Per-user profile of topic frequencies, expertise, and complexity
//! (spec §3's Long-Term Profile, §4.11's "Long-Term Memory operations").

use crate::error::MemoryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use zimlex_core::{Complexity, ProfileStore, UserType};

fn profile_key(user_id: &str) -> String {
    format!("users/{}", user_id)
}

/// A user-scoped record, updated atomically after each successful query
/// (increment and set-union semantics per §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongTermProfile {
    pub user_id: String,
    pub query_count: u64,
    pub legal_area_frequency: HashMap<String, u64>,
    pub expertise: UserType,
    pub typical_complexity: Complexity,
    pub last_updated: DateTime<Utc>,
}

impl LongTermProfile {
    fn default_for(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            query_count: 0,
            legal_area_frequency: HashMap::new(),
            expertise: UserType::Citizen,
            typical_complexity: Complexity::Simple,
            last_updated: Utc::now(),
        }
    }

    /// `query_count > 5` per §4.2 and §4.11's `is_returning_user`.
    pub fn is_returning_user(&self) -> bool {
        self.query_count > 5
    }

    /// Top 5 legal areas by frequency, per §4.11's `top_legal_interests`.
    pub fn top_legal_interests(&self, n: usize) -> Vec<String> {
        let mut areas: Vec<(&String, &u64)> = self.legal_area_frequency.iter().collect();
        areas.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        areas.into_iter().take(n).map(|(area, _)| area.clone()).collect()
    }
}

/// Metadata passed to `update_after_query`: the legal areas touched by the
/// just-completed query and its classified complexity, used to update the
/// rolling `typical_complexity` estimate.
#[derive(Debug, Clone)]
pub struct QueryMetadata {
    pub legal_areas: Vec<String>,
    pub complexity: Complexity,
    pub user_type: UserType,
}

pub struct LongTermMemory {
    store: Arc<dyn ProfileStore>,
}

impl LongTermMemory {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    /// `get_profile(user_id)`: return stored profile, or a freshly
    /// initialized default.
    pub async fn get_profile(&self, user_id: &str) -> LongTermProfile {
        match self.store.get_document(&profile_key(user_id)).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                tracing::warn!(%err, user_id, "profile deserialization failed, using default");
                LongTermProfile::default_for(user_id)
            }),
            Ok(None) => LongTermProfile::default_for(user_id),
            Err(err) => {
                tracing::warn!(%err, user_id, "profile store unavailable, using default");
                LongTermProfile::default_for(user_id)
            }
        }
    }

    /// `update_after_query(user_id, query_metadata)`: atomic increment of
    /// query count and per-area frequency; array-union of legal areas;
    /// set expertise / complexity.
    ///
    /// Commutative by construction (§8 property 9): increments and
    /// frequency-map bumps are associative regardless of call order, and
    /// `typical_complexity` is recomputed from the full updated history
    /// (a running mode-ish max over seen complexities) rather than from
    /// "most recent wins", so two updates applied in either order converge
    /// on the same final state.
    pub async fn update_after_query(
        &self,
        user_id: &str,
        metadata: QueryMetadata,
    ) -> Result<(), MemoryError> {
        let mut profile = self.get_profile(user_id).await;
        profile.query_count += 1;
        for area in metadata.legal_areas {
            *profile.legal_area_frequency.entry(area).or_insert(0) += 1;
        }
        if metadata.complexity > profile.typical_complexity {
            profile.typical_complexity = metadata.complexity;
        }
        if matches!(metadata.user_type, UserType::Professional) {
            profile.expertise = UserType::Professional;
        }
        profile.last_updated = Utc::now();

        let serialized = serde_json::to_string(&profile)
            .map_err(|e| MemoryError::StoreUnavailable(e.to_string()))?;
        self.store
            .put_document(&profile_key(user_id), serialized)
            .await
            .map_err(|e| MemoryError::StoreUnavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeProfileStore;

    fn memory() -> LongTermMemory {
        LongTermMemory::new(Arc::new(FakeProfileStore::default()))
    }

    #[tokio::test]
    async fn fresh_user_gets_default_profile() {
        let memory = memory();
        let profile = memory.get_profile("u1").await;
        assert_eq!(profile.query_count, 0);
        assert!(!profile.is_returning_user());
    }

    #[tokio::test]
    async fn update_after_query_increments_and_unions() {
        let memory = memory();
        memory
            .update_after_query(
                "u1",
                QueryMetadata {
                    legal_areas: vec!["labour".into()],
                    complexity: Complexity::Moderate,
                    user_type: UserType::Citizen,
                },
            )
            .await
            .unwrap();
        memory
            .update_after_query(
                "u1",
                QueryMetadata {
                    legal_areas: vec!["labour".into(), "constitutional".into()],
                    complexity: Complexity::Complex,
                    user_type: UserType::Professional,
                },
            )
            .await
            .unwrap();

        let profile = memory.get_profile("u1").await;
        assert_eq!(profile.query_count, 2);
        assert_eq!(profile.legal_area_frequency.get("labour"), Some(&2));
        assert_eq!(profile.legal_area_frequency.get("constitutional"), Some(&1));
        assert_eq!(profile.typical_complexity, Complexity::Complex);
        assert_eq!(profile.expertise, UserType::Professional);
    }

    #[tokio::test]
    async fn update_order_is_commutative() {
        let a = QueryMetadata {
            legal_areas: vec!["labour".into()],
            complexity: Complexity::Simple,
            user_type: UserType::Citizen,
        };
        let b = QueryMetadata {
            legal_areas: vec!["tax".into()],
            complexity: Complexity::Expert,
            user_type: UserType::Professional,
        };

        let forward = memory();
        forward.update_after_query("u1", a.clone()).await.unwrap();
        forward.update_after_query("u1", b.clone()).await.unwrap();
        let forward_profile = forward.get_profile("u1").await;

        let backward = memory();
        backward.update_after_query("u1", b).await.unwrap();
        backward.update_after_query("u1", a).await.unwrap();
        let backward_profile = backward.get_profile("u1").await;

        assert_eq!(forward_profile.query_count, backward_profile.query_count);
        assert_eq!(
            forward_profile.legal_area_frequency,
            backward_profile.legal_area_frequency
        );
        assert_eq!(
            forward_profile.typical_complexity,
            backward_profile.typical_complexity
        );
        assert_eq!(forward_profile.expertise, backward_profile.expertise);
    }
}
