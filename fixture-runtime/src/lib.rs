//! Fixture Service Runtime
//!
//! Lifecycle management for the external processes that integration tests
//! depend on: spawn, wait for readiness, health checks, resource stats and
//! orderly shutdown, including reverse-order teardown of whole clusters.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fixture_runtime::*;
//!
//! # async fn demo() -> FixtureResult<()> {
//! let db = ServiceConfig::builder("db", "./bin/fake-db")
//!     .ready_on_marker("listening")
//!     .build();
//! let api = ServiceConfig::builder("api", "./bin/api")
//!     .ready_on_endpoint("http://127.0.0.1:8080/health")
//!     .health_endpoint("http://127.0.0.1:8080/health")
//!     .build();
//!
//! // Started in order, stopped in reverse order
//! let cluster = start_cluster(vec![db, api]).await?;
//! let guard = auto_cleanup(cluster.clone());
//!
//! assert!(cluster.is_healthy().await);
//! if let Some(api) = cluster.get("api") {
//!     assert_performance(api, &PerformanceBounds::new().max_startup_ms(5_000))?;
//! }
//!
//! guard.run().await;
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod config;
pub mod error;
pub mod runtime;
pub mod testing;
pub mod traits;

// Main interfaces - re-exported at crate root for convenience
pub use config::{ClusterFile, HardwareRequirements, ReadinessSpec, ServiceConfig, ServiceConfigBuilder, ServiceDefinition};
pub use error::{FixtureError, FixtureResult};
pub use runtime::{Cluster, ServiceHandle, start_cluster, start_service};

// Supporting types
pub use runtime::{
    ExitStatus, ManagedProcess, NvidiaSmiProbe, ProcessLauncher, ProcessRegistry, ServiceStats, ShutdownState,
    StopOutcome,
};
pub use traits::{ClusterMember, HardwareProbe, ServiceLauncher};
pub use testing::{CleanupGuard, Measured, PerformanceBounds, assert_performance, auto_cleanup, measure_ms};
