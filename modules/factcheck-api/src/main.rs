use std::sync::Arc;

use anyhow::Result;
use axum::{
    http::{header, HeaderName, HeaderValue},
    routing::get,
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{info, warn};

use factcheck_common::{Config, SourceLimits};
use factcheck_pipeline::{orchestrator_from_config, telemetry, Orchestrator};

mod rest;

pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub source_limits: SourceLimits,
}

pub fn router(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(rest::health))
        .route(
            "/fact-check",
            get(rest::fact_check::fact_check_get).post(rest::fact_check::fact_check_post),
        )
        .with_state(state)
        .layer(cors_layer(allowed_origins))
        // Streamed responses must reach the client as they are produced.
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        ))
        // Logging layer: method + path only (claims travel in query strings)
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = origin.as_str(), "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    telemetry::init_tracing();
    config.log_summary();

    let orchestrator = Arc::new(orchestrator_from_config(&config)?);
    let state = Arc::new(AppState {
        orchestrator,
        source_limits: config.source_limits,
    });
    let app = router(state, &config.allowed_origins);

    let addr = format!("{}:{}", config.host, config.port);
    info!(
        %addr,
        min_sources = config.source_limits.min,
        max_sources = config.source_limits.max,
        "Fact-check API starting"
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
