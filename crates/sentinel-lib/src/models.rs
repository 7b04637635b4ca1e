//! Core data models for the inference service

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single telemetry snapshot submitted for inference
///
/// Only `cpu` is mandatory; the remaining gauges default to zero and
/// the lagged CPU readings are imputed from the current value when the
/// caller has no history available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub cpu: f64,
    #[serde(default)]
    pub memory: f64,
    #[serde(default)]
    pub disk: f64,
    #[serde(default)]
    pub latency: f64,
    #[serde(default)]
    pub requests: f64,
    #[serde(default)]
    pub errors: i64,
    #[serde(default)]
    pub cpu_lag_1: Option<f64>,
    #[serde(default)]
    pub cpu_lag_5: Option<f64>,
    #[serde(default)]
    pub cpu_lag_15: Option<f64>,
}

/// Discrete risk verdict produced by the fusion cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    VeryLow,
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::VeryLow => "very_low",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        f.write_str(s)
    }
}

/// Final inference output returned to the transport layer
///
/// `anomaly_score` and `anomaly_label` are null whenever the anomaly
/// capability is unavailable or degraded; the rest of the result is
/// still populated from the TTF and CPU signals alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    /// Predicted hours to failure, rounded to 4 decimals for display
    pub predicted_hours_to_failure: f64,
    pub anomaly_score: Option<f64>,
    /// 1 = anomalous, 0 = normal
    pub anomaly_label: Option<u8>,
    pub current_cpu: f64,
    pub risk_level: RiskLevel,
    pub recommended_action: String,
}
