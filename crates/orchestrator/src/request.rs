//! The external query request (spec §6).

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub trace_id: Option<String>,
    pub user_id: String,
    pub session_id: String,
    pub raw_query: String,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub date_context: Option<String>,
}
