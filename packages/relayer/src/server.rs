//! HTTP server for health and metrics endpoints

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use eyre::eyre;
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use tracing::info;

use crate::checkpoint::CheckpointStore;
use crate::metrics::Metrics;
use crate::registry::ChainRegistry;

/// Shared state for the HTTP server
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ChainRegistry>,
    pub checkpoints: Arc<CheckpointStore>,
    pub metrics: Arc<Metrics>,
    pub started_at: Instant,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub checkpoints: usize,
    pub chains: Vec<u64>,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        uptime_secs: state.started_at.elapsed().as_secs(),
        checkpoints: state.checkpoints.len().await,
        chains: state.registry.chain_ids().await,
    })
}

/// Liveness probe
async fn liveness() -> &'static str {
    "OK"
}

/// Prometheus metrics endpoint
async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry.gather();
    let mut buffer = Vec::new();

    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response();
    }

    match Response::builder()
        .header(header::CONTENT_TYPE, encoder.format_type())
        .body(axum::body::Body::from(buffer))
    {
        Ok(resp) => resp,
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to build metrics response",
        )
            .into_response(),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state)
}

/// Start the HTTP server for health and metrics
pub async fn start_server(bind_address: &str, port: u16, state: AppState) -> eyre::Result<()> {
    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .map_err(|e| eyre!("Invalid bind address {}:{}: {}", bind_address, port, e))?;
    info!("Health server listening on {}", addr);
    info!("  /health  - Full health status (JSON)");
    info!("  /metrics - Prometheus metrics");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Validator;

    async fn state(dir: &tempfile::TempDir) -> AppState {
        let validator = Arc::new(Validator::default());
        let checkpoints = CheckpointStore::open(dir.path().join("checkpoints.bin"), validator.clone())
            .await
            .unwrap();
        checkpoints
            .record_progress(1, "0x1111111111111111111111111111111111111111", 42)
            .await;
        AppState {
            registry: Arc::new(ChainRegistry::new(validator)),
            checkpoints: Arc::new(checkpoints),
            metrics: Arc::new(Metrics::new()),
            started_at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn test_health_reports_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let Json(health) = health_check(State(state(&dir).await)).await;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.checkpoints, 1);
        assert!(health.chains.is_empty());

        let body = serde_json::to_value(&health).unwrap();
        assert_eq!(body["status"], "healthy");
        assert!(body["uptime_secs"].is_u64());
    }

    #[tokio::test]
    async fn test_metrics_endpoint_encodes_registry() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir).await;
        state.metrics.record_poll(1, "caught_up");

        let response = prometheus_metrics(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            TextEncoder::new().format_type()
        );
    }
}
