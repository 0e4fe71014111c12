//! Model-backed collaborators: the `LlmBackend`/`EmbeddingModel` trait
//! implementations, deterministic disabled-mode fakes, speculative tiered
//! synthesis, and the synthesizer's prompt construction.

pub mod claude;
pub mod embedding;
pub mod error;
pub mod fake;
pub mod prompt;
pub mod speculative;

pub use claude::{ClaudeBackend, ClaudeConfig, ClaudeModel};
pub use embedding::{HashingEmbeddingModel, HttpEmbeddingConfig, HttpEmbeddingModel};
pub use error::LlmError;
pub use fake::{DisabledLlmBackend, ScriptedLlmBackend};
pub use speculative::{SpeculativeOutcome, SpeculativeSynthesizer};
