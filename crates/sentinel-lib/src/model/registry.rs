//! Process-wide model registry with lazy, at-most-once artifact loading
//!
//! Models are loaded on first use and cached for the process lifetime;
//! there is no hot reload of an already-loaded artifact. Only
//! successful loads are cached: a missing or corrupt artifact is
//! re-attempted on the next request, so a model placed on disk after
//! startup is picked up without a restart. Load attempts are
//! serialized behind a lock, keeping the at-most-once guarantee for
//! successful loads even when concurrent first requests race during
//! cold start. A failing regression load surfaces as
//! `ModelUnavailable`; a missing or corrupt anomaly artifact is
//! downgraded to "unavailable" and never treated as a fault.

use super::{AnomalyDetector, OnnxAnomalyDetector, OnnxTtfRegressor, TtfRegressor};
use crate::error::InferenceError;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::{debug, info, warn};

/// Filesystem locations of the trained artifacts
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub ttf_model: PathBuf,
    pub anomaly_model: PathBuf,
    pub anomaly_normalizer: PathBuf,
}

impl ArtifactPaths {
    /// Resolve standard artifact file names under a model directory
    pub fn in_dir(model_dir: impl Into<PathBuf>) -> Self {
        let dir = model_dir.into();
        Self {
            ttf_model: dir.join("ttf_model.onnx"),
            anomaly_model: dir.join("anomaly_model.onnx"),
            anomaly_normalizer: dir.join("anomaly_scaler.onnx"),
        }
    }
}

/// Source of trained model artifacts
///
/// `load_detector` returns `Ok(None)` when the optional anomaly
/// artifact is simply absent; an `Err` means the artifact exists but
/// could not be loaded, which the registry downgrades to unavailable.
pub trait ArtifactStore: Send + Sync {
    fn load_regressor(&self) -> Result<Box<dyn TtfRegressor>>;
    fn load_detector(&self) -> Result<Option<Box<dyn AnomalyDetector>>>;
}

/// Loads ONNX artifacts from configured filesystem paths
pub struct DiskArtifactStore {
    paths: ArtifactPaths,
}

impl DiskArtifactStore {
    pub fn new(paths: ArtifactPaths) -> Self {
        Self { paths }
    }

    /// Whether the mandatory regression artifact is present on disk
    pub fn regressor_present(&self) -> bool {
        self.paths.ttf_model.exists()
    }
}

impl ArtifactStore for DiskArtifactStore {
    fn load_regressor(&self) -> Result<Box<dyn TtfRegressor>> {
        if !self.paths.ttf_model.exists() {
            anyhow::bail!("TTF model not found: {}", self.paths.ttf_model.display());
        }
        let regressor = OnnxTtfRegressor::from_path(&self.paths.ttf_model)?;
        info!(path = %self.paths.ttf_model.display(), "TTF model loaded");
        Ok(Box::new(regressor))
    }

    fn load_detector(&self) -> Result<Option<Box<dyn AnomalyDetector>>> {
        if !self.paths.anomaly_model.exists() {
            return Ok(None);
        }
        let normalizer = self
            .paths
            .anomaly_normalizer
            .exists()
            .then_some(self.paths.anomaly_normalizer.as_path());
        let detector = OnnxAnomalyDetector::from_paths(&self.paths.anomaly_model, normalizer)?;
        info!(
            path = %self.paths.anomaly_model.display(),
            normalizer = normalizer.is_some(),
            "Anomaly model loaded"
        );
        Ok(Some(Box::new(detector)))
    }
}

/// Holds at most one regression model and one anomaly detector,
/// each loaded at most once
pub struct ModelRegistry {
    store: Box<dyn ArtifactStore>,
    regressor: OnceLock<Arc<dyn TtfRegressor>>,
    regressor_load: Mutex<()>,
    detector: OnceLock<Arc<dyn AnomalyDetector>>,
    detector_load: Mutex<()>,
}

impl ModelRegistry {
    pub fn new(store: Box<dyn ArtifactStore>) -> Self {
        Self {
            store,
            regressor: OnceLock::new(),
            regressor_load: Mutex::new(()),
            detector: OnceLock::new(),
            detector_load: Mutex::new(()),
        }
    }

    pub fn from_paths(paths: ArtifactPaths) -> Self {
        Self::new(Box::new(DiskArtifactStore::new(paths)))
    }

    /// Get the regression capability, loading it on first use
    ///
    /// A failing load is retried on the next call; the capability
    /// becomes available as soon as a valid artifact is in place.
    pub fn regressor(&self) -> Result<Arc<dyn TtfRegressor>, InferenceError> {
        if let Some(r) = self.regressor.get() {
            return Ok(Arc::clone(r));
        }
        let _guard = self
            .regressor_load
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // A racing call may have finished the load while we waited
        if let Some(r) = self.regressor.get() {
            return Ok(Arc::clone(r));
        }
        match self.store.load_regressor() {
            Ok(r) => {
                let regressor: Arc<dyn TtfRegressor> = Arc::from(r);
                let _ = self.regressor.set(Arc::clone(&regressor));
                Ok(regressor)
            }
            Err(e) => Err(InferenceError::ModelUnavailable(format!("{:#}", e))),
        }
    }

    /// Get the anomaly capability if one is available, loading it on
    /// first use; an absent or failing artifact downgrades to `None`
    /// and is re-checked on the next call
    pub fn detector(&self) -> Option<Arc<dyn AnomalyDetector>> {
        if let Some(d) = self.detector.get() {
            return Some(Arc::clone(d));
        }
        let _guard = self
            .detector_load
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(d) = self.detector.get() {
            return Some(Arc::clone(d));
        }
        match self.store.load_detector() {
            Ok(Some(d)) => {
                let detector: Arc<dyn AnomalyDetector> = Arc::from(d);
                let _ = self.detector.set(Arc::clone(&detector));
                Some(detector)
            }
            Ok(None) => {
                debug!("Anomaly model absent, running without anomaly scoring");
                None
            }
            Err(e) => {
                warn!(error = %e, "Anomaly model failed to load, running without anomaly scoring");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{AnomalyFeatureVector, TtfFeatureVector};
    use crate::model::AnomalyAssessment;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

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

    /// Counts load invocations to pin the at-most-once guarantee;
    /// artifact availability can be flipped mid-test to exercise the
    /// retry-until-present behavior
    struct CountingStore {
        regressor_loads: AtomicUsize,
        detector_loads: AtomicUsize,
        regressor_available: AtomicBool,
        detector_available: AtomicBool,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                regressor_loads: AtomicUsize::new(0),
                detector_loads: AtomicUsize::new(0),
                regressor_available: AtomicBool::new(true),
                detector_available: AtomicBool::new(true),
            }
        }
    }

    impl ArtifactStore for &'static CountingStore {
        fn load_regressor(&self) -> Result<Box<dyn TtfRegressor>> {
            self.regressor_loads.fetch_add(1, Ordering::SeqCst);
            if !self.regressor_available.load(Ordering::SeqCst) {
                anyhow::bail!("simulated missing artifact");
            }
            Ok(Box::new(FixedRegressor(1.5)))
        }

        fn load_detector(&self) -> Result<Option<Box<dyn AnomalyDetector>>> {
            self.detector_loads.fetch_add(1, Ordering::SeqCst);
            if !self.detector_available.load(Ordering::SeqCst) {
                return Ok(None);
            }
            Ok(Some(Box::new(FixedDetector(AnomalyAssessment {
                score: Some(-0.1),
                anomalous: false,
            }))))
        }
    }

    fn leak(store: CountingStore) -> &'static CountingStore {
        Box::leak(Box::new(store))
    }

    #[test]
    fn test_regressor_loaded_once_across_calls() {
        let store = leak(CountingStore::new());
        let registry = ModelRegistry::new(Box::new(store));

        for _ in 0..5 {
            assert!(registry.regressor().is_ok());
        }
        assert_eq!(store.regressor_loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_detector_loaded_once_across_calls() {
        let store = leak(CountingStore::new());
        let registry = ModelRegistry::new(Box::new(store));

        for _ in 0..5 {
            assert!(registry.detector().is_some());
        }
        assert_eq!(store.detector_loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_cold_start_loads_once() {
        let store = leak(CountingStore::new());
        let registry = ModelRegistry::new(Box::new(store));

        std::thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| {
                    assert!(registry.regressor().is_ok());
                    assert!(registry.detector().is_some());
                });
            }
        });

        assert_eq!(store.regressor_loads.load(Ordering::SeqCst), 1);
        assert_eq!(store.detector_loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_regressor_load_failure_surfaced_and_retried() {
        let store = leak(CountingStore::new());
        store.regressor_available.store(false, Ordering::SeqCst);
        let registry = ModelRegistry::new(Box::new(store));

        for _ in 0..3 {
            match registry.regressor() {
                Err(InferenceError::ModelUnavailable(msg)) => {
                    assert!(msg.contains("simulated missing artifact"));
                }
                other => panic!("expected ModelUnavailable, got {:?}", other.is_ok()),
            }
        }
        // Only successes are cached; each call re-attempted the load
        assert_eq!(store.regressor_loads.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_regressor_recovers_when_artifact_appears() {
        let store = leak(CountingStore::new());
        store.regressor_available.store(false, Ordering::SeqCst);
        let registry = ModelRegistry::new(Box::new(store));

        assert!(registry.regressor().is_err());

        // Artifact placed on disk after the failed first request
        store.regressor_available.store(true, Ordering::SeqCst);
        let regressor = registry.regressor().expect("load retried after failure");
        let features = TtfFeatureVector([0.0; crate::features::TTF_FEATURE_COUNT]);
        assert_eq!(regressor.predict(&features).unwrap(), 1.5);

        // Once loaded, the success is cached and never reloaded
        assert!(registry.regressor().is_ok());
        assert_eq!(store.regressor_loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_absent_detector_is_not_an_error_and_rechecked() {
        let store = leak(CountingStore::new());
        store.detector_available.store(false, Ordering::SeqCst);
        let registry = ModelRegistry::new(Box::new(store));

        assert!(registry.detector().is_none());
        assert!(registry.detector().is_none());
        assert_eq!(store.detector_loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_detector_recovers_when_artifact_appears() {
        let store = leak(CountingStore::new());
        store.detector_available.store(false, Ordering::SeqCst);
        let registry = ModelRegistry::new(Box::new(store));

        assert!(registry.detector().is_none());

        store.detector_available.store(true, Ordering::SeqCst);
        assert!(registry.detector().is_some());

        // Cached from here on
        assert!(registry.detector().is_some());
        assert_eq!(store.detector_loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_disk_store_missing_regressor_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskArtifactStore::new(ArtifactPaths::in_dir(dir.path()));
        assert!(!store.regressor_present());
        assert!(store.load_regressor().is_err());
    }

    #[test]
    fn test_disk_store_missing_detector_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskArtifactStore::new(ArtifactPaths::in_dir(dir.path()));
        let detector = store.load_detector().unwrap();
        assert!(detector.is_none());
    }

    #[test]
    fn test_disk_store_corrupt_detector_downgraded_by_registry() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        std::fs::write(&paths.anomaly_model, b"garbage").unwrap();

        let registry = ModelRegistry::from_paths(paths);
        assert!(registry.detector().is_none());
    }

    #[test]
    fn test_artifact_paths_standard_names() {
        let paths = ArtifactPaths::in_dir("/var/lib/sentinel/models");
        assert!(paths.ttf_model.ends_with("ttf_model.onnx"));
        assert!(paths.anomaly_model.ends_with("anomaly_model.onnx"));
        assert!(paths.anomaly_normalizer.ends_with("anomaly_scaler.onnx"));
    }
}
