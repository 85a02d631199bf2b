//! HTTP server for exposing Prometheus metrics.
//!
//! This module provides an Axum-based HTTP server that serves the `/metrics`
//! endpoint for Prometheus scraping, a landing page on `/` and a `/health`
//! endpoint for health checks.

use crate::client::TelemetrySource;
use crate::error::{Result, SolarmanError};
use crate::metrics::ScrapeCollector;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const LANDING_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Solarman Exporter</title>
    <style>
        body { font-family: Arial, sans-serif; margin: 40px; }
        h1 { color: #333; }
        a { color: #0066cc; text-decoration: none; }
        a:hover { text-decoration: underline; }
    </style>
</head>
<body>
    <h1>Solarman Exporter</h1>
    <p><a href="/metrics">Metrics</a></p>
</body>
</html>
"#;

/// Shared application state.
struct AppState<S: TelemetrySource> {
    collector: Arc<ScrapeCollector<S>>,
}

impl<S: TelemetrySource> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            collector: Arc::clone(&self.collector),
        }
    }
}

/// Turn a Go-style `:9230` bind flag into an address tokio can bind.
pub fn normalize_listen_address(address: &str) -> String {
    if address.starts_with(':') {
        format!("0.0.0.0{}", address)
    } else {
        address.to_string()
    }
}

/// Build the exporter's router.
pub fn router<S: TelemetrySource>(collector: Arc<ScrapeCollector<S>>) -> Router {
    let state = AppState { collector };

    Router::new()
        .route("/metrics", get(metrics_handler::<S>))
        .route("/health", get(health_handler))
        .route("/", get(root_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the exporter on an already bound listener.
pub async fn serve<S: TelemetrySource>(
    listener: TcpListener,
    collector: Arc<ScrapeCollector<S>>,
) -> Result<()> {
    axum::serve(listener, router(collector))
        .await
        .map_err(|e| SolarmanError::Server(e.to_string()))
}

/// Start the HTTP server.
///
/// # Examples
///
/// ```no_run
/// use solarman_exporter::client::SolarmanClient;
/// use solarman_exporter::config::Settings;
/// use solarman_exporter::metrics::ScrapeCollector;
/// use solarman_exporter::server::start_server;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() {
///     let settings = Settings::load(None).unwrap();
///     let sn = settings.inverter_sn.clone();
///     let client = SolarmanClient::new(settings).await.unwrap();
///     let collector = ScrapeCollector::new(Arc::new(client), sn).unwrap();
///     start_server(":9230", collector).await.unwrap();
/// }
/// ```
pub async fn start_server<S: TelemetrySource>(
    listen_address: &str,
    collector: ScrapeCollector<S>,
) -> Result<()> {
    let address = normalize_listen_address(listen_address);
    info!("Starting HTTP server on {}", address);

    let listener = TcpListener::bind(&address).await?;
    serve(listener, Arc::new(collector)).await
}

/// Handler for /metrics endpoint.
async fn metrics_handler<S: TelemetrySource>(State(state): State<AppState<S>>) -> Response {
    info!("Received metrics scrape request");

    // Upstream failures are already folded into `up`; only encoding can fail here.
    match state.collector.scrape().await {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
                .into_response()
        }
    }
}

/// Handler for /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "OK").into_response()
}

/// Handler for root endpoint.
async fn root_handler() -> Response {
    (StatusCode::OK, Html(LANDING_PAGE)).into_response()
}
