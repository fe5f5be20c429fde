//! Testing Helpers
//!
//! Performance assertions, ad-hoc timing and end-of-test cleanup for fixtures.

pub mod cleanup;
pub mod performance;

// Re-export main types
pub use cleanup::{Cleanup, CleanupGuard, auto_cleanup};
pub use performance::{Measured, PerformanceBounds, assert_performance, measure_ms};
