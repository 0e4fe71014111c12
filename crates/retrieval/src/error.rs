use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("both sparse and dense retrieval are unavailable")]
    InsufficientSources,

    #[error("upstream index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("object store unavailable: {0}")]
    ObjectStoreUnavailable(String),
}

impl From<RetrievalError> for zimlex_core::Error {
    fn from(err: RetrievalError) -> Self {
        zimlex_core::Error::Retrieval(err.to_string())
    }
}
