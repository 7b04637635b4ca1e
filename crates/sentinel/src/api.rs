//! HTTP API: prediction, health checks, and Prometheus metrics

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use sentinel_lib::{
    health::{components, ComponentHealth, ComponentStatus, HealthRegistry},
    InferenceEngine, InferenceError, MetricsSnapshot,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<InferenceEngine>,
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(engine: Arc<InferenceEngine>, health_registry: HealthRegistry) -> Self {
        Self {
            engine,
            health_registry,
        }
    }
}

/// Run inference on one telemetry snapshot
///
/// Returns 503 when the TTF model is unavailable and 422 when the
/// snapshot fails validation.
async fn predict(
    State(state): State<Arc<AppState>>,
    Json(snapshot): Json<MetricsSnapshot>,
) -> Response {
    match state.engine.infer(&snapshot) {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(err @ InferenceError::ModelUnavailable(_)) => {
            state
                .health_registry
                .update(
                    components::TTF_MODEL,
                    ComponentHealth::unhealthy(err.to_string()),
                )
                .await;
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
        Err(err @ InferenceError::InvalidSnapshot(_)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

/// Health check response - returns 200 if healthy/degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder.encode(&metric_families, &mut buffer).unwrap();

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
