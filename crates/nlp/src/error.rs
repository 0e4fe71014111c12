use thiserror::Error;

#[derive(Error, Debug)]
pub enum NlpError {
    #[error("classifier model call failed: {0}")]
    ClassifierModel(String),

    #[error("rewriter model call failed: {0}")]
    RewriterModel(String),
}

impl From<NlpError> for zimlex_core::Error {
    fn from(err: NlpError) -> Self {
        zimlex_core::Error::Nlp(err.to_string())
    }
}
