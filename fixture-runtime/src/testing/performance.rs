//! Performance Assertions
//!
//! Bounds on startup time and resident memory, and a timer for arbitrary futures.

use std::future::Future;
use std::time::Instant;
use tracing::debug;

use crate::error::{FixtureError, FixtureResult};
use crate::runtime::ServiceHandle;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerformanceBounds {
    /// Maximum spawn-to-ready time, inclusive
    pub max_startup_ms: Option<u64>,
    /// Maximum resident memory, inclusive
    pub max_memory_mb: Option<f64>,
}

impl PerformanceBounds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound startup time (fluent API)
    pub fn max_startup_ms(mut self, ms: u64) -> Self {
        self.max_startup_ms = Some(ms);
        self
    }

    /// Bound resident memory (fluent API)
    pub fn max_memory_mb(mut self, mb: f64) -> Self {
        self.max_memory_mb = Some(mb);
        self
    }

    /// No bound set
    pub fn is_empty(&self) -> bool {
        self.max_startup_ms.is_none() && self.max_memory_mb.is_none()
    }
}

/// Check a started service against `bounds`.
///
/// Fails if and only if a bound is exceeded. A memory bound is skipped when the
/// platform cannot report resident memory.
pub fn assert_performance(handle: &ServiceHandle, bounds: &PerformanceBounds) -> FixtureResult<()> {
    let memory_mb = match bounds.max_memory_mb {
        Some(_) => handle.stats().memory_mb,
        None => None,
    };
    check_bounds(handle.name(), handle.startup_ms(), memory_mb, bounds)
}

fn check_bounds(service: &str, startup_ms: u64, memory_mb: Option<f64>, bounds: &PerformanceBounds) -> FixtureResult<()> {
    if let Some(max) = bounds.max_startup_ms {
        if startup_ms > max {
            return Err(FixtureError::PerformanceViolation {
                service: service.to_string(),
                metric: "startup time".to_string(),
                observed: format!("{startup_ms}ms"),
                allowed: format!("{max}ms"),
            });
        }
    }

    if let Some(max) = bounds.max_memory_mb {
        match memory_mb {
            Some(observed) if observed > max => {
                return Err(FixtureError::PerformanceViolation {
                    service: service.to_string(),
                    metric: "resident memory".to_string(),
                    observed: format!("{observed:.1}MB"),
                    allowed: format!("{max:.1}MB"),
                });
            }
            Some(_) => {}
            None => debug!("Memory of '{}' unavailable, bound of {:.1}MB not checked", service, max),
        }
    }

    Ok(())
}

/// Result of [`measure_ms`]
#[derive(Debug, Clone, PartialEq)]
pub struct Measured<T> {
    /// Output of the measured future
    pub result: T,
    /// Elapsed wall time in milliseconds
    pub ms: u64,
}

/// Await `future` and report how long it took
pub async fn measure_ms<F: Future>(future: F) -> Measured<F::Output> {
    let started = Instant::now();
    let result = future.await;
    let ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    Measured { result, ms }
}
