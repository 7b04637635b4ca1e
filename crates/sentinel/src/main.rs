//! ttf-sentinel - predictive-maintenance inference service
//!
//! Hosts the inference fusion pipeline behind a small HTTP surface:
//! telemetry snapshots in, risk verdicts out.

use anyhow::Result;
use sentinel_lib::{
    features::FEATURE_SCHEMA_VERSION,
    health::{components, ComponentHealth, HealthRegistry},
    InferenceEngine, ModelRegistry, ServiceMetrics, StructuredLogger,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const SERVICE_NAME: &str = "ttf-sentinel";
const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting ttf-sentinel");

    // Load configuration
    let config = config::ServiceConfig::load()?;
    let paths = config.artifact_paths();
    info!(model_dir = %config.model_dir, "Service configured");

    // Initialize health registry from artifact presence; models load
    // lazily on the first request, but a missing regression artifact
    // is already a known-unready condition.
    let health_registry = HealthRegistry::new();
    if paths.ttf_model.exists() {
        health_registry
            .update(components::TTF_MODEL, ComponentHealth::healthy())
            .await;
    } else {
        health_registry
            .update(
                components::TTF_MODEL,
                ComponentHealth::unhealthy(format!(
                    "TTF model not found: {}",
                    paths.ttf_model.display()
                )),
            )
            .await;
    }
    if paths.anomaly_model.exists() {
        health_registry
            .update(components::ANOMALY_MODEL, ComponentHealth::healthy())
            .await;
    } else {
        health_registry
            .update(
                components::ANOMALY_MODEL,
                ComponentHealth::degraded("anomaly model absent, scoring disabled"),
            )
            .await;
    }

    // Initialize metrics
    let metrics = ServiceMetrics::new();
    metrics.set_model_info(FEATURE_SCHEMA_VERSION);

    // Initialize structured logger
    let logger = StructuredLogger::new(SERVICE_NAME);
    logger.log_startup(SERVICE_VERSION, FEATURE_SCHEMA_VERSION);

    // Model registry and inference engine shared by all requests
    let registry = Arc::new(ModelRegistry::from_paths(paths));
    let engine = Arc::new(InferenceEngine::new(registry));

    let app_state = Arc::new(api::AppState::new(engine, health_registry));

    // Start API server
    let api_handle = tokio::spawn(api::serve(config.listen_port, app_state));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    info!("Shutting down");
    api_handle.abort();

    Ok(())
}
