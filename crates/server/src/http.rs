//! REST surface: the query endpoint (spec §6) plus health/readiness/metrics.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{http::StatusCode, Json, Router};
use futures::stream::Stream;
use serde::Serialize;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use zimlex_orchestrator::{QueryRequest, StreamEvent};

use crate::metrics::{metrics_handler, record_cache_hit, record_request, record_total_latency_ms};
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/query", post(query_stream))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

/// Development default: the spec names authn as an out-of-scope external
/// collaborator (§1), so this crate trusts whatever reverse proxy terminates
/// auth and only controls which origins may call it directly.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

#[derive(Debug, Serialize)]
struct SseToken<'a> {
    text: &'a str,
}

/// `POST /api/query` — the only externally specified operation (§6):
/// consumes a [`QueryRequest`], streams back the typed event sequence the
/// orchestrator produces, framed as server-sent events. `meta` is always
/// first, `final` is always last and always present (§4.1, §7).
async fn query_stream(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    record_request("query");
    let start = std::time::Instant::now();
    let route = request
        .jurisdiction
        .clone()
        .unwrap_or_else(|| "ZW".to_string());

    let rx = state.orchestrator.run_query_streaming(request).await;
    let stream = ReceiverStream::new(rx).map(move |event| {
        let sse = to_sse_event(&event);
        if let StreamEvent::Final(final_payload) = &event {
            record_cache_hit(final_payload.from_cache);
            record_total_latency_ms(&route, start.elapsed().as_millis() as u64);
        }
        Ok(sse)
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keep-alive"))
}

fn to_sse_event(event: &StreamEvent) -> Event {
    match event {
        StreamEvent::Meta(payload) => Event::default().event("meta").json_data(payload).unwrap(),
        StreamEvent::Token(text) => Event::default()
            .event("token")
            .json_data(SseToken { text })
            .unwrap(),
        StreamEvent::Citation(citation) => Event::default()
            .event("citation")
            .json_data(citation)
            .unwrap(),
        StreamEvent::Warning(message) => Event::default()
            .event("warning")
            .json_data(serde_json::json!({ "message": message }))
            .unwrap(),
        StreamEvent::Final(payload) => Event::default().event("final").json_data(payload).unwrap(),
    }
}

/// Liveness: the process is up and able to serve HTTP. Does not probe
/// external collaborators — that's `/ready`'s job.
async fn health_check() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

/// Readiness: reports which external backends are configured, per §6's
/// "every backend has a safe disabled mode" — a backend being disabled is
/// reported, not treated as a readiness failure, since the orchestrator
/// degrades gracefully around it.
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let settings = &state.settings;
    let checks = serde_json::json!({
        "dense_index": settings.retrieval.dense_index.is_configured(),
        "sparse_index": settings.retrieval.sparse_index.is_configured(),
        "object_store": settings.retrieval.object_store.is_configured(),
        "cross_encoder": settings.retrieval.cross_encoder.is_configured(),
        "embedding_model": settings.retrieval.embedding_model.is_configured(),
        "cache_store": settings.cache.store.is_configured(),
        "small_model": settings.llm.small.backend.is_configured(),
        "large_model": settings.llm.large.backend.is_configured(),
    });

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ready",
            "backends": checks,
        })),
    )
}

impl IntoResponse for crate::ServerError {
    fn into_response(self) -> axum::response::Response {
        let message = self.to_string();
        let status: StatusCode = self.into();
        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zimlex_config::Settings;
    use zimlex_orchestrator::{Dependencies, Orchestrator};

    #[test]
    fn router_builds() {
        let settings = Settings::default();
        let deps = Dependencies::build(settings.clone()).expect("deps build with disabled backends");
        let orchestrator = Orchestrator::new(deps);
        let metrics_handle = crate::metrics::init_metrics();
        let state = AppState::new(orchestrator, settings, metrics_handle);
        let _ = create_router(state);
    }
}
