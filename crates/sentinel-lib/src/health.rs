//! Health tracking for the inference service
//!
//! Reports per-model health for liveness and readiness probes. The
//! regression model is the only critical component: its absence makes
//! the service unready, while a missing anomaly model only degrades
//! the overall status.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a tracked component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Component names tracked by the service
pub mod components {
    pub const TTF_MODEL: &str = "ttf_model";
    pub const ANOMALY_MODEL: &str = "anomaly_model";
}

/// Health of a single component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Tracks component health and overall readiness
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), health);
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let mut status = ComponentStatus::Healthy;
        for health in components.values() {
            match health.status {
                ComponentStatus::Unhealthy => {
                    status = ComponentStatus::Unhealthy;
                    break;
                }
                ComponentStatus::Degraded => status = ComponentStatus::Degraded,
                ComponentStatus::Healthy => {}
            }
        }
        HealthResponse { status, components }
    }

    /// Ready only while the TTF model component is not unhealthy
    pub async fn readiness(&self) -> ReadinessResponse {
        let components = self.components.read().await;
        match components.get(components::TTF_MODEL) {
            None => ReadinessResponse {
                ready: false,
                reason: Some("Service not yet initialized".to_string()),
            },
            Some(h) if h.status == ComponentStatus::Unhealthy => ReadinessResponse {
                ready: false,
                reason: h.message.clone().or_else(|| Some("TTF model unavailable".to_string())),
            },
            Some(_) => ReadinessResponse {
                ready: true,
                reason: None,
            },
        }
    }
}
