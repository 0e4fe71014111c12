//! This crate's narrow error enum, bridged into [`zimlex_core::Error`] via
//! `From`, the way `RagError`/`CacheError`/`MemoryError` bridge into the
//! shared core error elsewhere in this workspace.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("model call timed out")]
    Timeout,

    #[error("malformed model output: {0}")]
    MalformedOutput(String),
}

impl From<LlmError> for zimlex_core::Error {
    fn from(err: LlmError) -> Self {
        zimlex_core::Error::Llm(err.to_string())
    }
}
