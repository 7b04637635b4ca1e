//! Feature construction for model inference
//!
//! Turns a raw telemetry snapshot into the fixed-order vectors the
//! trained models expect. The TTF ordering below is an external
//! contract with the training pipeline: the model was fitted on
//! columns in exactly this order and nothing at runtime re-checks it
//! beyond vector width, so any change here silently corrupts
//! predictions.

use crate::error::InferenceError;
use crate::models::MetricsSnapshot;

/// Version tag of the feature schema shared with the training pipeline
pub const FEATURE_SCHEMA_VERSION: &str = "v1";

/// Width of the TTF regression feature vector
pub const TTF_FEATURE_COUNT: usize = 11;

/// Width of the anomaly detection feature vector
pub const ANOMALY_FEATURE_COUNT: usize = 6;

/// Column order the TTF model was trained on
pub const TTF_FEATURE_NAMES: [&str; TTF_FEATURE_COUNT] = [
    "cpu",
    "cpu_lag_1",
    "cpu_lag_5",
    "cpu_lag_15",
    "rolling_mean_3",
    "rolling_std_3",
    "memory",
    "disk",
    "latency",
    "requests",
    "errors",
];

/// Column order the anomaly model was trained on
pub const ANOMALY_FEATURE_NAMES: [&str; ANOMALY_FEATURE_COUNT] =
    ["cpu", "memory", "disk", "latency", "requests", "errors"];

/// Fixed-order input vector for the TTF regression model
#[derive(Debug, Clone, PartialEq)]
pub struct TtfFeatureVector(pub [f64; TTF_FEATURE_COUNT]);

/// Fixed-order input vector for the anomaly model
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyFeatureVector(pub [f64; ANOMALY_FEATURE_COUNT]);

impl TtfFeatureVector {
    pub fn to_f32(&self) -> Vec<f32> {
        self.0.iter().map(|v| *v as f32).collect()
    }
}

impl AnomalyFeatureVector {
    pub fn to_f32(&self) -> Vec<f32> {
        self.0.iter().map(|v| *v as f32).collect()
    }
}

/// Build both model input vectors from a snapshot
///
/// Absent lag readings are imputed from the current CPU value, which
/// flattens the temporal signal when no history is available; the
/// trained model expects exactly this behavior. The rolling statistics
/// use only `{cpu, lag_1, lag_5}` - `lag_15` is passed through as its
/// own feature but excluded from the window, matching training.
pub fn build(
    snapshot: &MetricsSnapshot,
) -> Result<(TtfFeatureVector, AnomalyFeatureVector), InferenceError> {
    validate(snapshot)?;

    let cpu = snapshot.cpu;
    let cpu_lag_1 = snapshot.cpu_lag_1.unwrap_or(cpu);
    let cpu_lag_5 = snapshot.cpu_lag_5.unwrap_or(cpu);
    let cpu_lag_15 = snapshot.cpu_lag_15.unwrap_or(cpu);

    let window = [cpu, cpu_lag_1, cpu_lag_5];
    let rolling_mean_3 = mean(&window);
    let rolling_std_3 = population_std(&window);

    let ttf = TtfFeatureVector([
        cpu,
        cpu_lag_1,
        cpu_lag_5,
        cpu_lag_15,
        rolling_mean_3,
        rolling_std_3,
        snapshot.memory,
        snapshot.disk,
        snapshot.latency,
        snapshot.requests,
        snapshot.errors as f64,
    ]);

    let anomaly = AnomalyFeatureVector([
        cpu,
        snapshot.memory,
        snapshot.disk,
        snapshot.latency,
        snapshot.requests,
        snapshot.errors as f64,
    ]);

    Ok((ttf, anomaly))
}

fn validate(snapshot: &MetricsSnapshot) -> Result<(), InferenceError> {
    let fields = [
        ("cpu", Some(snapshot.cpu)),
        ("memory", Some(snapshot.memory)),
        ("disk", Some(snapshot.disk)),
        ("latency", Some(snapshot.latency)),
        ("requests", Some(snapshot.requests)),
        ("cpu_lag_1", snapshot.cpu_lag_1),
        ("cpu_lag_5", snapshot.cpu_lag_5),
        ("cpu_lag_15", snapshot.cpu_lag_15),
    ];
    for (name, value) in fields {
        if let Some(v) = value {
            if !v.is_finite() {
                return Err(InferenceError::InvalidSnapshot(format!(
                    "field '{}' is not a finite number: {}",
                    name, v
                )));
            }
        }
    }
    Ok(())
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by n, not n-1)
fn population_std(values: &[f64]) -> f64 {
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (sum_sq / values.len() as f64).sqrt()
}
