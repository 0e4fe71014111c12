use thiserror::Error;

#[derive(Error, Debug)]
pub enum QualityError {
    #[error("coherence model call failed: {0}")]
    CoherenceModel(String),

    #[error("self-critic model call failed: {0}")]
    SelfCriticModel(String),
}

impl From<QualityError> for zimlex_core::Error {
    fn from(err: QualityError) -> Self {
        zimlex_core::Error::Quality(err.to_string())
    }
}
