//! # Health Checks
//!
//! Liveness reporting for the node, served on the primary domain.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Health status values.
///
/// The node has no dependency whose loss it can detect, so a process that
/// answers is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Serving requests.
    Up,
}

/// Liveness probe response.
#[derive(Debug, Clone, Serialize)]
pub struct LivenessResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Crate version.
    pub version: &'static str,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Shared health state.
#[derive(Debug, Clone)]
pub struct HealthState {
    started: Arc<Instant>,
}

impl HealthState {
    /// Starts the uptime clock.
    pub fn new() -> Self {
        Self {
            started: Arc::new(Instant::now()),
        }
    }

    /// Current liveness.
    pub fn liveness(&self) -> LivenessResponse {
        LivenessResponse {
            status: HealthStatus::Up,
            version: env!("CARGO_PKG_VERSION"),
            uptime_seconds: self.started.elapsed().as_secs(),
        }
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}
