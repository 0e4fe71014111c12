use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("memory store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<MemoryError> for zimlex_core::Error {
    fn from(err: MemoryError) -> Self {
        zimlex_core::Error::Memory(err.to_string())
    }
}
