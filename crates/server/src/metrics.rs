//! Prometheus metrics (spec §5 ambient observability; not itself a spec
//! module — carried the way the teacher instruments its server crate).

use axum::http::StatusCode;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Installs the global Prometheus recorder and returns the handle the
/// `/metrics` route renders from.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

pub fn record_request(route: &str) {
    metrics::counter!("zimlex_requests_total", "route" => route.to_string()).increment(1);
}

pub fn record_cache_hit(hit: bool) {
    metrics::counter!("zimlex_cache_lookups_total", "hit" => hit.to_string()).increment(1);
}

pub fn record_total_latency_ms(route: &str, ms: u64) {
    metrics::histogram!("zimlex_request_latency_ms", "route" => route.to_string()).record(ms as f64);
}

pub fn record_error(kind: &str) {
    metrics::counter!("zimlex_errors_total", "kind" => kind.to_string()).increment(1);
}

pub async fn metrics_handler(
    axum::extract::State(state): axum::extract::State<crate::state::AppState>,
) -> (StatusCode, String) {
    (StatusCode::OK, state.metrics_handle.render())
}
