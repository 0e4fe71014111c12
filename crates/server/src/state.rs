//! Shared application state, the way the teacher's `server::state::AppState`
//! wraps one `Settings` plus its process-wide singletons behind `Arc`.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use zimlex_config::Settings;
use zimlex_orchestrator::Orchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub settings: Arc<Settings>,
    pub metrics_handle: Arc<PrometheusHandle>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, settings: Settings, metrics_handle: PrometheusHandle) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            settings: Arc::new(settings),
            metrics_handle: Arc::new(metrics_handle),
        }
    }
}
