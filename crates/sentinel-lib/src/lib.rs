//! Core library for the predictive-maintenance inference service
//!
//! This crate provides the inference fusion pipeline:
//! - Feature construction from raw telemetry snapshots
//! - Model capability adapters (TTF regression + optional anomaly)
//!   over ONNX artifacts, behind a lazily-initialized registry
//! - The rule-based risk fusion engine
//! - Health tracking and observability

pub mod error;
pub mod features;
pub mod health;
pub mod inference;
pub mod model;
pub mod models;
pub mod observability;
pub mod risk;

pub use error::InferenceError;
pub use health::{ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse};
pub use inference::InferenceEngine;
pub use model::{ArtifactPaths, ModelRegistry};
pub use models::{InferenceResult, MetricsSnapshot, RiskLevel};
pub use observability::{ServiceMetrics, StructuredLogger};
