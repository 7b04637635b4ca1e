//! Inference orchestrator
//!
//! Sequences feature construction, model invocation, and risk fusion
//! into the single `infer` operation exposed to the transport layer.
//! The regression path is mandatory and its failures propagate; the
//! anomaly path degrades to null fields without failing the request.

use crate::error::InferenceError;
use crate::features;
use crate::model::ModelRegistry;
use crate::models::{InferenceResult, MetricsSnapshot};
use crate::observability::ServiceMetrics;
use crate::risk;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Runs the full inference pipeline against the shared model registry
pub struct InferenceEngine {
    registry: Arc<ModelRegistry>,
    metrics: ServiceMetrics,
}

impl InferenceEngine {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            metrics: ServiceMetrics::new(),
        }
    }

    /// Produce a risk verdict for one telemetry snapshot
    ///
    /// Fails with `ModelUnavailable` when the regression artifact
    /// cannot be loaded or executed, and `InvalidSnapshot` on
    /// malformed input. The anomaly capability being absent or
    /// failing never fails the call.
    pub fn infer(&self, snapshot: &MetricsSnapshot) -> Result<InferenceResult, InferenceError> {
        let start = Instant::now();

        let (ttf_features, anomaly_features) = features::build(snapshot)?;

        let regressor = match self.registry.regressor() {
            Ok(r) => r,
            Err(e) => {
                self.metrics.inc_inference_errors();
                return Err(e);
            }
        };
        let ttf_hours = regressor.predict(&ttf_features).map_err(|e| {
            self.metrics.inc_inference_errors();
            InferenceError::ModelUnavailable(format!("{:#}", e))
        })?;

        let assessment = match self.registry.detector() {
            Some(detector) => match detector.evaluate(&anomaly_features) {
                Ok(a) => Some(a),
                Err(e) => {
                    warn!(error = %e, "Anomaly evaluation failed, continuing without verdict");
                    self.metrics.inc_anomaly_degraded();
                    None
                }
            },
            None => {
                self.metrics.inc_anomaly_degraded();
                None
            }
        };

        let anomalous = assessment.as_ref().map(|a| a.anomalous);
        // Fusion sees the raw estimate; rounding is presentation only
        let (risk_level, action) = risk::fuse(anomalous, ttf_hours, snapshot.cpu);

        let elapsed = start.elapsed();
        self.metrics.observe_inference_latency(elapsed.as_secs_f64());
        self.metrics.inc_inferences();
        self.metrics.inc_risk_verdict(&risk_level.to_string());
        debug!(
            elapsed_us = elapsed.as_micros(),
            risk_level = %risk_level,
            "Inference completed"
        );

        Ok(InferenceResult {
            predicted_hours_to_failure: round4(ttf_hours),
            anomaly_score: assessment.as_ref().and_then(|a| a.score),
            anomaly_label: anomalous.map(u8::from),
            current_cpu: snapshot.cpu,
            risk_level,
            recommended_action: action.to_string(),
        })
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{AnomalyFeatureVector, TtfFeatureVector};
    use crate::model::{
        AnomalyAssessment, AnomalyDetector, ArtifactStore, TtfRegressor,
    };
    use crate::models::RiskLevel;
    use anyhow::Result;

    struct FixedRegressor(f64);

    impl TtfRegressor for FixedRegressor {
        fn predict(&self, _features: &TtfFeatureVector) -> Result<f64> {
            Ok(self.0)
        }
    }

    struct FixedDetector(AnomalyAssessment);

    impl AnomalyDetector for FixedDetector {
        fn evaluate(&self, _features: &AnomalyFeatureVector) -> Result<AnomalyAssessment> {
            Ok(self.0.clone())
        }
    }

    struct FailingDetector;

    impl AnomalyDetector for FailingDetector {
        fn evaluate(&self, _features: &AnomalyFeatureVector) -> Result<AnomalyAssessment> {
            anyhow::bail!("simulated scoring failure")
        }
    }

    enum DetectorSetup {
        Absent,
        Failing,
        Fixed(AnomalyAssessment),
    }

    struct TestStore {
        ttf_hours: Option<f64>,
        detector: DetectorSetup,
    }

    impl ArtifactStore for TestStore {
        fn load_regressor(&self) -> Result<Box<dyn TtfRegressor>> {
            match self.ttf_hours {
                Some(hours) => Ok(Box::new(FixedRegressor(hours))),
                None => anyhow::bail!("TTF model not found"),
            }
        }

        fn load_detector(&self) -> Result<Option<Box<dyn AnomalyDetector>>> {
            match &self.detector {
                DetectorSetup::Absent => Ok(None),
                DetectorSetup::Failing => Ok(Some(Box::new(FailingDetector))),
                DetectorSetup::Fixed(a) => Ok(Some(Box::new(FixedDetector(a.clone())))),
            }
        }
    }

    fn engine(ttf_hours: Option<f64>, detector: DetectorSetup) -> InferenceEngine {
        let registry = ModelRegistry::new(Box::new(TestStore {
            ttf_hours,
            detector,
        }));
        InferenceEngine::new(Arc::new(registry))
    }

    fn snapshot(cpu: f64) -> MetricsSnapshot {
        MetricsSnapshot {
            cpu,
            memory: 30.0,
            disk: 40.0,
            latency: 120.0,
            requests: 200.0,
            errors: 2,
            cpu_lag_1: None,
            cpu_lag_5: None,
            cpu_lag_15: None,
        }
    }

    #[test]
    fn test_full_pipeline_with_anomaly_verdict() {
        let engine = engine(
            Some(5.0),
            DetectorSetup::Fixed(AnomalyAssessment {
                score: Some(-0.23),
                anomalous: true,
            }),
        );
        let result = engine.infer(&snapshot(50.0)).unwrap();

        assert_eq!(result.predicted_hours_to_failure, 5.0);
        assert_eq!(result.anomaly_score, Some(-0.23));
        assert_eq!(result.anomaly_label, Some(1));
        assert_eq!(result.current_cpu, 50.0);
        assert_eq!(result.risk_level, RiskLevel::High);
        assert_eq!(result.recommended_action, "Restart server immediately");
    }

    #[test]
    fn test_normal_verdict_reported_as_zero_label() {
        let engine = engine(
            Some(5.0),
            DetectorSetup::Fixed(AnomalyAssessment {
                score: Some(0.4),
                anomalous: false,
            }),
        );
        let result = engine.infer(&snapshot(50.0)).unwrap();

        assert_eq!(result.anomaly_label, Some(0));
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert_eq!(result.recommended_action, "All good");
    }

    #[test]
    fn test_missing_regressor_is_model_unavailable() {
        let engine = engine(None, DetectorSetup::Absent);
        let err = engine.infer(&snapshot(50.0)).unwrap_err();
        assert!(matches!(err, InferenceError::ModelUnavailable(_)));
    }

    #[test]
    fn test_absent_detector_degrades_to_null_fields() {
        let engine = engine(Some(5.0), DetectorSetup::Absent);
        let result = engine.infer(&snapshot(50.0)).unwrap();

        assert!(result.anomaly_score.is_none());
        assert!(result.anomaly_label.is_none());
        assert_eq!(result.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_failing_detector_degrades_to_null_fields() {
        let engine = engine(Some(5.0), DetectorSetup::Failing);
        let result = engine.infer(&snapshot(50.0)).unwrap();

        assert!(result.anomaly_score.is_none());
        assert!(result.anomaly_label.is_none());
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert_eq!(result.recommended_action, "All good");
    }

    #[test]
    fn test_fusion_uses_unrounded_estimate() {
        // 0.05004 rounds to 0.05 for display, but fusion must see the
        // raw value, which is above the high bucket edge
        let engine = engine(Some(0.05004), DetectorSetup::Absent);
        let result = engine.infer(&snapshot(50.0)).unwrap();

        assert_eq!(result.predicted_hours_to_failure, 0.05);
        assert_eq!(result.risk_level, RiskLevel::Medium);
        assert_eq!(result.recommended_action, "Monitor closely");
    }

    #[test]
    fn test_prediction_rounded_to_four_decimals() {
        let engine = engine(Some(1.23456789), DetectorSetup::Absent);
        let result = engine.infer(&snapshot(50.0)).unwrap();
        assert_eq!(result.predicted_hours_to_failure, 1.2346);
    }

    #[test]
    fn test_cpu_override_with_degraded_anomaly() {
        let engine = engine(Some(5.0), DetectorSetup::Absent);
        let result = engine.infer(&snapshot(95.0)).unwrap();

        assert_eq!(result.risk_level, RiskLevel::High);
        assert_eq!(result.recommended_action, "Critical CPU load — restart soon");
    }

    #[test]
    fn test_invalid_snapshot_rejected_before_models() {
        // Regressor would fail to load, but validation must win
        let engine = engine(None, DetectorSetup::Absent);
        let mut bad = snapshot(50.0);
        bad.cpu = f64::NAN;
        let err = engine.infer(&bad).unwrap_err();
        assert!(matches!(err, InferenceError::InvalidSnapshot(_)));
    }

    #[test]
    fn test_idempotence_for_identical_snapshots() {
        let engine = engine(
            Some(0.12),
            DetectorSetup::Fixed(AnomalyAssessment {
                score: Some(0.05),
                anomalous: false,
            }),
        );
        let s = snapshot(42.0);
        let first = engine.infer(&s).unwrap();
        let second = engine.infer(&s).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_round4_behavior() {
        assert_eq!(round4(0.123449), 0.1234);
        assert_eq!(round4(0.123456), 0.1235);
        assert_eq!(round4(2.0), 2.0);
    }
}
