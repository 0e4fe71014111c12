//! Layered configuration for the legal question-answering orchestrator.
//!
//! Mirrors the teacher's `config` crate: a single `Settings` struct loaded
//! from `config/default.yaml`, an optional `config/{env}.yaml` overlay, and
//! `ZIMLEX_`-prefixed environment variables, in that ascending priority
//! order. Every external backend in `Settings` defaults to its disabled
//! mode so a workspace with no environment configured still boots.

pub mod settings;

pub use settings::{
    BackendConfig, CacheConfig, FeatureFlags, LlmConfig, LlmTierConfig, MemoryConfig,
    ObservabilityConfig, RetrievalConfig, RuntimeEnvironment, ServerConfig, Settings,
    load_settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Validation(String),
}
