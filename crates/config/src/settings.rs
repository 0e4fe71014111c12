//! Main settings module.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Runtime environment, as in the teacher's `RuntimeEnvironment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Top-level application settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub features: FeatureFlags,
}

fn default_true() -> bool {
    true
}

/// A generic "maybe configured" external backend. Every collaborator named
/// in spec §6 (vector index, sparse index, object store, cache store,
/// short-term store, profile store) is reachable via one of these: absence
/// of `endpoint` means the crate wires in a disabled/in-memory adapter
/// whose every call degrades to a miss, per §6.1's "safe disabled mode".
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BackendConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl BackendConfig {
    pub fn is_configured(&self) -> bool {
        self.enabled && self.endpoint.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Retrieval-side backend wiring: dense index, sparse index, object store,
/// cross-encoder, plus the tunables the retrieval engine and reranker read
/// at startup (the adaptive `retrieval_top_k`/`rerank_top_k` pair itself is
/// computed per-request from `Complexity`, not read from here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub dense_index: BackendConfig,
    #[serde(default)]
    pub sparse_index: BackendConfig,
    #[serde(default)]
    pub object_store: BackendConfig,
    #[serde(default)]
    pub cross_encoder: BackendConfig,
    #[serde(default)]
    pub embedding_model: BackendConfig,
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,
    #[serde(default = "default_max_per_parent")]
    pub max_per_parent: usize,
    #[serde(default = "default_rerank_quality_threshold")]
    pub rerank_quality_threshold: f32,
    #[serde(default = "default_parent_fetch_concurrency")]
    pub parent_fetch_concurrency: usize,
    #[serde(default = "default_parent_excerpt_chars")]
    pub parent_excerpt_chars: usize,
    /// Qdrant collection name. `dense_index.endpoint` carries the cluster URL.
    #[serde(default = "default_dense_collection")]
    pub dense_collection: String,
    /// Tantivy index directory; `None` uses an in-RAM index (test/disabled mode).
    #[serde(default)]
    pub sparse_index_path: Option<String>,
}

fn default_rrf_k() -> f32 {
    60.0
}
fn default_max_per_parent() -> usize {
    3
}
fn default_rerank_quality_threshold() -> f32 {
    0.3
}
fn default_parent_fetch_concurrency() -> usize {
    16
}
fn default_parent_excerpt_chars() -> usize {
    2000
}
fn default_dense_collection() -> String {
    "zimlex_chunks".to_string()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            dense_index: BackendConfig::default(),
            sparse_index: BackendConfig::default(),
            object_store: BackendConfig::default(),
            cross_encoder: BackendConfig::default(),
            embedding_model: BackendConfig::default(),
            rrf_k: default_rrf_k(),
            max_per_parent: default_max_per_parent(),
            rerank_quality_threshold: default_rerank_quality_threshold(),
            parent_fetch_concurrency: default_parent_fetch_concurrency(),
            parent_excerpt_chars: default_parent_excerpt_chars(),
            dense_collection: default_dense_collection(),
            sparse_index_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub store: BackendConfig,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
}

fn default_similarity_threshold() -> f32 {
    0.95
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            store: BackendConfig::default(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub short_term_store: BackendConfig,
    #[serde(default)]
    pub profile_store: BackendConfig,
    #[serde(default = "default_window_size")]
    pub short_term_window: usize,
    #[serde(default = "default_memory_token_budget")]
    pub memory_token_budget: usize,
}

fn default_window_size() -> usize {
    10
}
fn default_memory_token_budget() -> usize {
    1000
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            short_term_store: BackendConfig::default(),
            profile_store: BackendConfig::default(),
            short_term_window: default_window_size(),
            memory_token_budget: default_memory_token_budget(),
        }
    }
}

/// One model tier (small or large), the teacher's `LlmConfig` generalized to
/// be provider-agnostic: `endpoint`/`model` are enough to build any
/// `LlmBackend` adapter (OpenAI-compatible HTTP, local, or otherwise).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmTierConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_model() -> String {
    "default".to_string()
}
fn default_temperature() -> f32 {
    0.2
}

impl Default for LlmTierConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            model: default_model(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub small: LlmTierConfig,
    #[serde(default)]
    pub large: LlmTierConfig,
    #[serde(default = "default_first_token_deadline_ms")]
    pub first_token_deadline_ms: u64,
}

fn default_first_token_deadline_ms() -> u64 {
    400
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            small: LlmTierConfig::default(),
            large: LlmTierConfig::default(),
            first_token_deadline_ms: default_first_token_deadline_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
    #[serde(default = "default_true")]
    pub tracing_enabled: bool,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_metrics_port() -> u16 {
    9090
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            tracing_enabled: true,
            otlp_endpoint: None,
            metrics_enabled: true,
            metrics_port: default_metrics_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlags {
    #[serde(default = "default_true")]
    pub semantic_cache: bool,
    #[serde(default = "default_true")]
    pub self_correction: bool,
    #[serde(default = "default_true")]
    pub speculative_parent_prefetch: bool,
    #[serde(default = "default_true")]
    pub speculative_model_downgrade: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            semantic_cache: true,
            self_correction: true,
            speculative_parent_prefetch: true,
            speculative_model_downgrade: true,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retrieval.max_per_parent == 0 {
            return Err(ConfigError::Validation(
                "retrieval.max_per_parent must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.cache.similarity_threshold) {
            return Err(ConfigError::Validation(
                "cache.similarity_threshold must be in [0, 1]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retrieval.rerank_quality_threshold) {
            return Err(ConfigError::Validation(
                "retrieval.rerank_quality_threshold must be in [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load settings from files and environment.
///
/// Priority (highest to lowest):
/// 1. Environment variables (`ZIMLEX_` prefix, `__`-separated)
/// 2. `config/{env}.yaml` (if `env` given)
/// 3. `config/default.yaml`
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("ZIMLEX")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_validate() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.server.port, 8080);
        assert!(settings.features.semantic_cache);
    }

    #[test]
    fn backend_config_disabled_without_endpoint() {
        let backend = BackendConfig::default();
        assert!(!backend.is_configured());
    }

    #[test]
    fn invalid_similarity_threshold_rejected() {
        let mut settings = Settings::default();
        settings.cache.similarity_threshold = 1.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn env_override_changes_port() {
        std::env::set_var("ZIMLEX__SERVER__PORT", "9999");
        let settings = load_settings(None).expect("settings should load from env alone");
        assert_eq!(settings.server.port, 9999);
        std::env::remove_var("ZIMLEX__SERVER__PORT");
    }
}
