//! Process Launcher
//!
//! Turns a [`ServiceConfig`] into a ready [`ServiceHandle`]: preconditions,
//! spawn, readiness, startup measurement.

use std::sync::Arc;
use tracing::{info, warn};

use super::cluster::Cluster;
use super::hardware::NvidiaSmiProbe;
use super::process::ManagedProcess;
use super::readiness::wait_until_ready;
use super::registry::ProcessRegistry;
use super::service::ServiceHandle;
use super::shutdown::StopOutcome;
use crate::config::ServiceConfig;
use crate::error::{FixtureError, FixtureResult};
use crate::traits::{ClusterMember, HardwareProbe, ServiceLauncher};

#[derive(Clone)]
pub struct ProcessLauncher {
    registry: Arc<ProcessRegistry>,
    probe: Arc<dyn HardwareProbe>,
}

impl ProcessLauncher {
    /// Launcher tracking processes in `registry` and checking hardware with `probe`
    pub fn new(registry: Arc<ProcessRegistry>, probe: Arc<dyn HardwareProbe>) -> Self {
        Self { registry, probe }
    }

    /// Use a specific registry (fluent API)
    pub fn with_registry(mut self, registry: Arc<ProcessRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Use a specific hardware probe (fluent API)
    pub fn with_probe(mut self, probe: Arc<dyn HardwareProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Registry the launched processes are tracked in
    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    /// Start one service and wait until it is ready
    pub async fn start(&self, config: &ServiceConfig) -> FixtureResult<ServiceHandle> {
        config.validate()?;

        if config.hardware.gpu && !self.probe.gpu_available().await {
            return Err(FixtureError::HardwareUnavailable {
                service: config.name.clone(),
                requirement: "GPU".to_string(),
            });
        }

        info!("🚀 Starting service '{}': {}", config.name, config.command_line());

        let process = ManagedProcess::spawn(config, self.registry.clone())?;

        if let Err(e) = wait_until_ready(&process, config.readiness.as_ref(), config.startup_timeout).await {
            // Timeouts and early exits already leave the process dead; anything else must not leak it
            if process.is_alive() {
                if let Err(kill_err) = process.force_kill() {
                    warn!("⚠️ Failed to kill '{}' after startup failure: {}", config.name, kill_err);
                }
            }
            warn!("❌ Service '{}' failed to start: {}", config.name, first_line(&e));
            return Err(e);
        }

        let startup = process.spawned_at().elapsed();
        info!(
            "✅ Service '{}' ready in {}ms (PID: {})",
            config.name,
            startup.as_millis(),
            process.pid()
        );

        ServiceHandle::new(config, process, startup)
    }

    /// Start services in order; see [`Cluster::start_with`]
    pub async fn start_cluster(&self, configs: Vec<ServiceConfig>) -> FixtureResult<Cluster> {
        Cluster::start_with(self, configs).await
    }
}

impl Default for ProcessLauncher {
    /// Process-wide registry (with exit hooks) and the `nvidia-smi` probe
    fn default() -> Self {
        Self::new(ProcessRegistry::global(), Arc::new(NvidiaSmiProbe::new()))
    }
}

#[async_trait::async_trait]
impl ServiceLauncher for ProcessLauncher {
    type Member = ServiceHandle;

    async fn launch(&self, config: &ServiceConfig) -> FixtureResult<ServiceHandle> {
        self.start(config).await
    }
}

#[async_trait::async_trait]
impl ClusterMember for ServiceHandle {
    fn name(&self) -> &str {
        ServiceHandle::name(self)
    }

    async fn stop(&self) -> FixtureResult<StopOutcome> {
        ServiceHandle::stop(self).await
    }

    async fn is_healthy(&self) -> bool {
        ServiceHandle::is_healthy(self).await
    }
}

/// Start a single fixture service with the process-wide registry
pub async fn start_service(config: ServiceConfig) -> FixtureResult<ServiceHandle> {
    ProcessLauncher::default().start(&config).await
}

/// Start services strictly in order with the process-wide registry.
///
/// If any member fails, the ones already started are stopped in reverse
/// order and that member's error is returned.
pub async fn start_cluster(configs: Vec<ServiceConfig>) -> FixtureResult<Cluster> {
    ProcessLauncher::default().start_cluster(configs).await
}

fn first_line(err: &FixtureError) -> String {
    err.to_string().lines().next().unwrap_or_default().to_string()
}
