//! Model capability adapters
//!
//! Wraps the trained artifacts behind two narrow traits so the fusion
//! logic never touches artifact-specific quirks. The regression
//! capability is mandatory; the anomaly capability is optional and its
//! absence is modeled in the type (`Option<Arc<dyn AnomalyDetector>>`)
//! rather than probed per call.

mod onnx;
mod registry;

pub use onnx::{OnnxAnomalyDetector, OnnxTtfRegressor};
pub use registry::{ArtifactPaths, ArtifactStore, DiskArtifactStore, ModelRegistry};

use crate::features::{AnomalyFeatureVector, TtfFeatureVector};
use anyhow::Result;

/// Time-to-failure regression capability
pub trait TtfRegressor: Send + Sync {
    /// Predict hours to failure from the 11-wide feature vector
    fn predict(&self, features: &TtfFeatureVector) -> Result<f64>;
}

/// Anomaly scoring capability
pub trait AnomalyDetector: Send + Sync {
    /// Score one snapshot; errors are downgraded by the orchestrator,
    /// never propagated to the caller
    fn evaluate(&self, features: &AnomalyFeatureVector) -> Result<AnomalyAssessment>;
}

/// Outcome of one anomaly evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyAssessment {
    /// Raw decision score, absent when the artifact has no score output
    pub score: Option<f64>,
    pub anomalous: bool,
}

/// Normalize raw model labels to an anomalous/normal verdict
///
/// Binary classifiers emit {0,1} with 1 = anomalous; isolation-style
/// detectors emit {1,-1} with -1 = anomalous. Both conventions are
/// accepted without configuration: 1 or -1 means anomalous, anything
/// else means normal.
pub fn is_anomalous_label(raw: f64) -> bool {
    raw == 1.0 || raw == -1.0
}
