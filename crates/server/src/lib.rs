//! HTTP front door for the legal question-answering orchestrator.
//!
//! Exposes the single external interface named in spec §6: a query
//! endpoint that streams `meta`/`token`/`citation`/`warning`/`final`
//! server-sent events, backed by `zimlex_orchestrator::Orchestrator`.

pub mod http;
pub mod metrics;
pub mod state;

pub use http::create_router;
pub use metrics::init_metrics;
pub use state::AppState;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServerError> for axum::http::StatusCode {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::InvalidRequest(_) => axum::http::StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
