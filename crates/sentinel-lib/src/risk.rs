//! Risk fusion engine
//!
//! Combines the anomaly verdict, the TTF estimate, and the raw CPU
//! reading into a risk level and operator action via an ordered rule
//! cascade: the first matching rule wins. The anomaly signal and
//! extreme CPU outrank the regression estimate; the TTF buckets
//! discriminate the common case; a low-CPU catch-all keeps a plainly
//! idle system from landing in the default bucket.
//!
//! The thresholds and action strings here are pinned by the test
//! suite - reordering rules or editing strings changes observable
//! behavior for every consumer.

use crate::models::RiskLevel;

/// CPU percentage at or above which the system is considered critical
pub const CPU_CRITICAL: f64 = 90.0;

/// CPU percentage at or below which the system is considered idle
pub const CPU_IDLE: f64 = 20.0;

/// TTF bucket edges in hours (inclusive upper bounds)
pub const TTF_HIGH_HOURS: f64 = 0.05;
pub const TTF_MEDIUM_HOURS: f64 = 0.15;
pub const TTF_LOW_HOURS: f64 = 0.30;

/// Fuse model outputs into a risk verdict
///
/// Total over all inputs; `anomaly` is `None` when the anomaly
/// capability is unavailable, which simply skips the first rule.
pub fn fuse(anomaly: Option<bool>, ttf_hours: f64, cpu: f64) -> (RiskLevel, &'static str) {
    if anomaly == Some(true) {
        (RiskLevel::High, "Restart server immediately")
    } else if cpu >= CPU_CRITICAL {
        (RiskLevel::High, "Critical CPU load — restart soon")
    } else if ttf_hours <= TTF_HIGH_HOURS {
        (RiskLevel::High, "Restart server now")
    } else if ttf_hours <= TTF_MEDIUM_HOURS {
        (RiskLevel::Medium, "Monitor closely")
    } else if ttf_hours <= TTF_LOW_HOURS {
        (RiskLevel::Low, "System healthy")
    } else if cpu <= CPU_IDLE {
        (RiskLevel::VeryLow, "System idle — no issues")
    } else {
        (RiskLevel::Low, "All good")
    }
}
