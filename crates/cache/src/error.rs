use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CacheError> for zimlex_core::Error {
    fn from(err: CacheError) -> Self {
        zimlex_core::Error::Cache(err.to_string())
    }
}
