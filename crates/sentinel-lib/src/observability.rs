//! Observability infrastructure for the inference service
//!
//! Provides:
//! - Prometheus metrics (inference latency, verdict counts, degraded
//!   anomaly scoring, model info)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_gauge, register_int_gauge_vec, GaugeVec,
    Histogram, IntGauge, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    inference_latency_seconds: Histogram,
    inferences_total: IntGauge,
    inference_errors_total: IntGauge,
    anomaly_degraded_total: IntGauge,
    risk_verdicts_total: IntGaugeVec,
    model_info: GaugeVec,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            inference_latency_seconds: register_histogram!(
                "ttf_sentinel_inference_latency_seconds",
                "Time spent running the full inference pipeline",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register inference_latency_seconds"),

            inferences_total: register_int_gauge!(
                "ttf_sentinel_inferences_total",
                "Total number of successful inferences"
            )
            .expect("Failed to register inferences_total"),

            inference_errors_total: register_int_gauge!(
                "ttf_sentinel_inference_errors_total",
                "Total number of failed inference requests"
            )
            .expect("Failed to register inference_errors_total"),

            anomaly_degraded_total: register_int_gauge!(
                "ttf_sentinel_anomaly_degraded_total",
                "Inferences completed without an anomaly verdict"
            )
            .expect("Failed to register anomaly_degraded_total"),

            risk_verdicts_total: register_int_gauge_vec!(
                "ttf_sentinel_risk_verdicts_total",
                "Risk verdicts produced, by level",
                &["level"]
            )
            .expect("Failed to register risk_verdicts_total"),

            model_info: register_gauge_vec!(
                "ttf_sentinel_model_info",
                "Information about the loaded model contract",
                &["feature_schema"]
            )
            .expect("Failed to register model_info"),
        }
    }
}

/// Service metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_inference_latency(&self, duration_secs: f64) {
        self.inner().inference_latency_seconds.observe(duration_secs);
    }

    pub fn inc_inferences(&self) {
        self.inner().inferences_total.inc();
    }

    pub fn inc_inference_errors(&self) {
        self.inner().inference_errors_total.inc();
    }

    pub fn inc_anomaly_degraded(&self) {
        self.inner().anomaly_degraded_total.inc();
    }

    pub fn inc_risk_verdict(&self, level: &str) {
        self.inner().risk_verdicts_total.with_label_values(&[level]).inc();
    }

    pub fn set_model_info(&self, feature_schema: &str) {
        self.inner().model_info.reset();
        self.inner()
            .model_info
            .with_label_values(&[feature_schema])
            .set(1.0);
    }
}

/// Structured logger for inference events
#[derive(Clone)]
pub struct StructuredLogger {
    service_name: String,
}

impl StructuredLogger {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    pub fn log_inference(
        &self,
        predicted_hours: f64,
        anomaly_label: Option<u8>,
        risk_level: &str,
        recommended_action: &str,
    ) {
        info!(
            event = "inference_completed",
            service = %self.service_name,
            predicted_hours_to_failure = predicted_hours,
            anomaly_label = ?anomaly_label,
            risk_level = %risk_level,
            recommended_action = %recommended_action,
            "Inference completed"
        );
    }

    pub fn log_anomaly_degraded(&self, reason: &str) {
        warn!(
            event = "anomaly_degraded",
            service = %self.service_name,
            reason = %reason,
            "Anomaly scoring unavailable, fusing on TTF and CPU only"
        );
    }

    pub fn log_model_unavailable(&self, detail: &str) {
        warn!(
            event = "model_unavailable",
            service = %self.service_name,
            detail = %detail,
            "TTF model unavailable, request rejected"
        );
    }

    pub fn log_startup(&self, version: &str, feature_schema: &str) {
        info!(
            event = "service_started",
            service = %self.service_name,
            service_version = %version,
            feature_schema = %feature_schema,
            "Inference service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service_name,
            reason = %reason,
            "Inference service shutting down"
        );
    }
}
