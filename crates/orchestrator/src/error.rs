use thiserror::Error;

/// Every variant here is reachable only at wiring time (construction of
/// [`crate::deps::Dependencies`]) — per §7, "irrecoverable configuration
/// errors MAY fail fast at startup but MUST NOT fail a request after it
/// has been accepted". `run_query_streaming` itself never returns `Err`.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("failed to wire dependency: {0}")]
    Wiring(String),
}

impl From<OrchestratorError> for zimlex_core::Error {
    fn from(err: OrchestratorError) -> Self {
        zimlex_core::Error::Orchestrator(err.to_string())
    }
}
