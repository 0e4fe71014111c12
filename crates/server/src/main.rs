//! Server entry point: load configuration, wire the orchestrator's
//! process-wide singletons, and serve the HTTP/SSE surface.

use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use zimlex_config::{load_settings, Settings};
use zimlex_orchestrator::{Dependencies, Orchestrator};
use zimlex_server::{create_router, init_metrics, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = std::env::var("ZIMLEX_ENV").ok();
    let settings = match load_settings(env.as_deref()) {
        Ok(settings) => {
            eprintln!(
                "Loaded configuration from files (env: {})",
                env.as_deref().unwrap_or("default")
            );
            settings
        }
        Err(e) => {
            eprintln!("Warning: failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };

    init_tracing(&settings);

    tracing::info!("Starting zimlex-server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?settings.environment,
        config_path = env.as_deref().unwrap_or("default"),
        "Configuration loaded"
    );

    let metrics_handle = init_metrics();
    tracing::info!("Initialized Prometheus metrics at /metrics");

    let port = settings.server.port;
    let deps = Dependencies::build(settings.clone())?;
    tracing::info!(
        dense_index = settings.retrieval.dense_index.is_configured(),
        sparse_index = settings.retrieval.sparse_index.is_configured(),
        object_store = settings.retrieval.object_store.is_configured(),
        cache_store = settings.cache.store.is_configured(),
        "Wired orchestrator dependencies"
    );

    let orchestrator = Orchestrator::new(deps);
    let state = AppState::new(orchestrator, settings, metrics_handle);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

#[cfg(feature = "telemetry")]
fn init_tracing(settings: &Settings) {
    use opentelemetry_otlp::WithExportConfig;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("zimlex={},tower_http=debug", settings.observability.log_level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if settings.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    if let Some(otlp_endpoint) = &settings.observability.otlp_endpoint {
        if settings.observability.tracing_enabled {
            match opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(
                    opentelemetry_otlp::new_exporter()
                        .tonic()
                        .with_endpoint(otlp_endpoint),
                )
                .with_trace_config(opentelemetry_sdk::trace::Config::default().with_resource(
                    opentelemetry_sdk::Resource::new(vec![
                        opentelemetry::KeyValue::new("service.name", "zimlex-server"),
                        opentelemetry::KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                    ]),
                ))
                .install_batch(opentelemetry_sdk::runtime::Tokio)
            {
                Ok(tracer) => {
                    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
                    subscriber.with(fmt_layer).with(otel_layer).init();
                    tracing::info!(endpoint = %otlp_endpoint, "OpenTelemetry tracing enabled");
                    return;
                }
                Err(e) => eprintln!("Failed to initialize OpenTelemetry: {}. Falling back.", e),
            }
        }
    }
    subscriber.with(fmt_layer).init();
}

#[cfg(not(feature = "telemetry"))]
fn init_tracing(settings: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("zimlex={},tower_http=debug", settings.observability.log_level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if settings.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
