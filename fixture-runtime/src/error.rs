//! Fixture runtime error types

use std::time::Duration;
use thiserror::Error;

use crate::runtime::ExitStatus;

#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Invalid service configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Service '{service}' has no readiness check configured (expected an output marker or a health endpoint)")]
    MissingReadiness { service: String },

    #[error("Service '{service}' requires a {requirement} but none was detected; skip this test explicitly on machines without one")]
    HardwareUnavailable { service: String, requirement: String },

    #[error("Failed to spawn service '{service}': {source}")]
    SpawnFailed {
        service: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Service '{service}' did not become ready within {timeout:?}\n--- recent output ---\n{output_tail}")]
    ReadinessTimeout {
        service: String,
        timeout: Duration,
        output_tail: String,
    },

    #[error("Service '{service}' exited before becoming ready ({status})\n--- recent output ---\n{output_tail}")]
    EarlyExit {
        service: String,
        status: ExitStatus,
        output_tail: String,
    },

    #[error("Failed to signal service '{service}' (pid {pid}): {source}")]
    SignalFailed {
        service: String,
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Service '{service}' exceeded its {metric} bound: observed {observed}, allowed {allowed}")]
    PerformanceViolation {
        service: String,
        metric: String,
        observed: String,
        allowed: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl FixtureError {
    /// Shorthand for [`FixtureError::InvalidConfig`]
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether the error was raised before any process was spawned
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. } | Self::MissingReadiness { .. } | Self::HardwareUnavailable { .. }
        )
    }
}

/// Result type for fixture operations
pub type FixtureResult<T> = Result<T, FixtureError>;
