//! Crate-wide error type
//!
//! Every other crate defines its own narrower error enum and bridges it into
//! this one with a `From` impl, the way `RagError`/`LlmError` bridge into a
//! shared core error in the surrounding workspace.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("retrieval error: {0}")]
    Retrieval(String),

    #[error("llm error: {0}")]
    Llm(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("memory error: {0}")]
    Memory(String),

    #[error("nlp error: {0}")]
    Nlp(String),

    #[error("quality error: {0}")]
    Quality(String),

    #[error("orchestrator error: {0}")]
    Orchestrator(String),

    #[error("configuration error: {0}")]
    Config(String),
}
