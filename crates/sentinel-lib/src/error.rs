//! Error taxonomy for the inference core
//!
//! Only two conditions are fatal to a request: the regression model
//! being unavailable, and a malformed input snapshot. A missing or
//! failing anomaly capability is deliberately not an error; the
//! pipeline degrades to TTF/CPU signals instead.

use thiserror::Error;

/// Errors surfaced to the caller of the inference pipeline
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The TTF regression artifact could not be located, deserialized,
    /// or executed. Maps to a service-unavailable condition.
    #[error("TTF model unavailable: {0}")]
    ModelUnavailable(String),

    /// The input snapshot failed validation before any model call.
    #[error("invalid metrics snapshot: {0}")]
    InvalidSnapshot(String),
}
