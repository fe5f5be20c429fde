//! Trait definitions for the runtime's seams
//!
//! Clusters are generic over how members are launched and stopped, so the
//! ordering guarantees can be exercised without real processes. Hardware
//! probing sits behind a trait so tests can pretend a GPU is (or isn't) there.

use crate::config::ServiceConfig;
use crate::error::FixtureResult;
use crate::runtime::StopOutcome;

/// Something a cluster can own, stop and health-check
#[async_trait::async_trait]
pub trait ClusterMember: Send + Sync {
    fn name(&self) -> &str;

    /// Stop the member; must be a no-op when already stopped
    async fn stop(&self) -> FixtureResult<StopOutcome>;

    async fn is_healthy(&self) -> bool;
}

/// Starts one cluster member from its configuration
///
/// `launch` returns only once the member is ready (or has failed to become so).
#[async_trait::async_trait]
pub trait ServiceLauncher: Send + Sync {
    type Member: ClusterMember;

    async fn launch(&self, config: &ServiceConfig) -> FixtureResult<Self::Member>;
}

/// Best-effort detection of hardware a fixture depends on
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait HardwareProbe: Send + Sync {
    /// Whether a usable GPU is present. Any probe failure counts as "no".
    async fn gpu_available(&self) -> bool;
}
