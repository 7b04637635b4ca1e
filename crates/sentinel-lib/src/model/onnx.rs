//! ONNX-backed model adapters using tract
//!
//! Loads the trained artifacts once at startup or first use and runs
//! them on the request path. Input shapes are pinned at load time so a
//! model trained against a different feature schema fails fast instead
//! of silently mis-predicting.

use super::{is_anomalous_label, AnomalyAssessment, AnomalyDetector, TtfRegressor};
use crate::features::{
    AnomalyFeatureVector, TtfFeatureVector, ANOMALY_FEATURE_COUNT, TTF_FEATURE_COUNT,
};
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

fn load_plan(path: &Path, input_width: usize) -> Result<TractModel> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read model artifact {:?}", path))?;
    debug!(
        path = %path.display(),
        size = bytes.len(),
        sha256 = %checksum(&bytes),
        "Loading ONNX artifact"
    );
    let model = tract_onnx::onnx()
        .model_for_read(&mut std::io::Cursor::new(&bytes))
        .with_context(|| format!("Failed to parse ONNX model {:?}", path))?
        .with_input_fact(0, f32::fact([1, input_width]).into())
        .context("Failed to set input shape")?
        .into_optimized()
        .context("Failed to optimize model")?
        .into_runnable()
        .context("Failed to create runnable model")?;
    Ok(model)
}

fn to_tensor(data: Vec<f32>, width: usize) -> Result<Tensor> {
    let array = tract_ndarray::Array2::from_shape_vec((1, width), data)
        .context("Feature data does not match tensor shape")?;
    Ok(array.into())
}

fn first_value(plan_output: &Tensor) -> Result<f64> {
    let cast = plan_output
        .cast_to::<f32>()
        .context("Failed to cast model output to f32")?;
    let view = cast.to_array_view::<f32>()?;
    let value = view.iter().next().context("Model produced empty output")?;
    Ok(*value as f64)
}

/// SHA256 checksum of artifact bytes, logged at load for traceability
fn checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// tract-backed TTF regression adapter
pub struct OnnxTtfRegressor {
    plan: TractModel,
}

impl OnnxTtfRegressor {
    pub fn from_path(path: &Path) -> Result<Self> {
        let plan = load_plan(path, TTF_FEATURE_COUNT)?;
        Ok(Self { plan })
    }
}

impl TtfRegressor for OnnxTtfRegressor {
    fn predict(&self, features: &TtfFeatureVector) -> Result<f64> {
        anyhow::ensure!(
            features.0.len() == TTF_FEATURE_COUNT,
            "TTF feature vector has width {}, model expects {}",
            features.0.len(),
            TTF_FEATURE_COUNT
        );
        let input = to_tensor(features.to_f32(), TTF_FEATURE_COUNT)?;
        let result = self.plan.run(tvec!(input.into()))?;
        let output = result.first().context("No output from TTF model")?;
        first_value(output)
    }
}

/// tract-backed anomaly detection adapter with optional normalizer
///
/// Artifacts exported from isolation-style detectors carry two
/// outputs (label, score); plain binary classifiers carry one. The
/// score is reported only when the second output exists.
pub struct OnnxAnomalyDetector {
    plan: TractModel,
    normalizer: Option<TractTransform>,
    has_score: bool,
}

/// Seam for the fitted feature normalizer, so the fallback policy can
/// be exercised without a real artifact
trait FeatureTransform: Send + Sync {
    fn transform(&self, data: Vec<f32>) -> Result<Vec<f32>>;
}

struct TractTransform {
    plan: TractModel,
}

impl FeatureTransform for TractTransform {
    fn transform(&self, data: Vec<f32>) -> Result<Vec<f32>> {
        let input = to_tensor(data, ANOMALY_FEATURE_COUNT)?;
        let out = self.plan.run(tvec!(input.into()))?;
        let view = out
            .first()
            .context("No output from normalizer")?
            .to_array_view::<f32>()?;
        Ok(view.iter().copied().collect())
    }
}

/// Apply the fitted normalizer, falling back to the raw vector if the
/// transform fails at call time or produces the wrong width
fn apply_normalizer(normalizer: Option<&dyn FeatureTransform>, raw: Vec<f32>) -> Vec<f32> {
    let Some(normalizer) = normalizer else {
        return raw;
    };
    match normalizer.transform(raw.clone()) {
        Ok(values) if values.len() == ANOMALY_FEATURE_COUNT => values,
        Ok(values) => {
            warn!(
                width = values.len(),
                "Normalizer output has wrong width, using raw features"
            );
            raw
        }
        Err(e) => {
            warn!(error = %e, "Normalizer failed, using raw features");
            raw
        }
    }
}

impl OnnxAnomalyDetector {
    pub fn from_paths(model_path: &Path, normalizer_path: Option<&Path>) -> Result<Self> {
        let plan = load_plan(model_path, ANOMALY_FEATURE_COUNT)?;
        let has_score = plan.model().outputs.len() > 1;
        let normalizer = match normalizer_path {
            Some(p) => Some(TractTransform {
                plan: load_plan(p, ANOMALY_FEATURE_COUNT)
                    .with_context(|| format!("Failed to load normalizer {:?}", p))?,
            }),
            None => None,
        };
        Ok(Self {
            plan,
            normalizer,
            has_score,
        })
    }
}

impl AnomalyDetector for OnnxAnomalyDetector {
    fn evaluate(&self, features: &AnomalyFeatureVector) -> Result<AnomalyAssessment> {
        let data = apply_normalizer(
            self.normalizer.as_ref().map(|t| t as &dyn FeatureTransform),
            features.to_f32(),
        );
        let input = to_tensor(data, ANOMALY_FEATURE_COUNT)?;
        let result = self.plan.run(tvec!(input.into()))?;

        let label_output = result.first().context("No label output from anomaly model")?;
        let raw_label = first_value(label_output)?;

        let score = if self.has_score {
            let score_output = result
                .get(1)
                .context("Anomaly model advertised a score output but produced none")?;
            Some(first_value(score_output)?)
        } else {
            None
        };

        Ok(AnomalyAssessment {
            score,
            anomalous: is_anomalous_label(raw_label),
        })
    }
}
