//! Service Handle
//!
//! The queryable view of a started fixture. Clones share the same process
//! and the same shutdown state.

use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, System};

use super::process::{ExitStatus, ManagedProcess};
use super::readiness::probe_endpoint;
use super::shutdown::{ShutdownProtocol, ShutdownState, StopOutcome};
use crate::config::ServiceConfig;
use crate::config::service::DEFAULT_REQUEST_TIMEOUT;
use crate::error::FixtureResult;

/// Point-in-time resource usage of a service
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceStats {
    /// OS process id
    pub pid: u32,
    /// Time since spawn
    pub uptime: Duration,
    /// Resident memory, `None` when the platform does not expose it
    pub memory_mb: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ServiceHandle {
    inner: Arc<ServiceInner>,
}

#[derive(Debug)]
struct ServiceInner {
    process: Arc<ManagedProcess>,
    health_endpoint: Option<String>,
    http: reqwest::Client,
    shutdown: ShutdownProtocol,
    startup: Duration,
}

impl ServiceHandle {
    pub(crate) fn new(config: &ServiceConfig, process: Arc<ManagedProcess>, startup: Duration) -> FixtureResult<Self> {
        let http = reqwest::Client::builder().timeout(DEFAULT_REQUEST_TIMEOUT).build()?;

        Ok(Self {
            inner: Arc::new(ServiceInner {
                process,
                health_endpoint: config.health_endpoint.clone(),
                http,
                shutdown: ShutdownProtocol::new(config.shutdown_grace),
                startup,
            }),
        })
    }

    /// Service name from the configuration
    pub fn name(&self) -> &str {
        self.inner.process.name()
    }

    /// OS process id
    pub fn pid(&self) -> u32 {
        self.inner.process.pid()
    }

    /// Underlying process, for lower-level inspection
    pub fn process(&self) -> &ManagedProcess {
        &self.inner.process
    }

    /// Time from spawn until readiness was confirmed
    pub fn startup(&self) -> Duration {
        self.inner.startup
    }

    /// Startup time in whole milliseconds
    pub fn startup_ms(&self) -> u64 {
        u64::try_from(self.inner.startup.as_millis()).unwrap_or(u64::MAX)
    }

    /// Output captured so far on stdout
    pub fn stdout(&self) -> String {
        self.inner.process.stdout()
    }

    /// Output captured so far on stderr
    pub fn stderr(&self) -> String {
        self.inner.process.stderr()
    }

    /// Both streams interleaved
    pub fn output(&self) -> String {
        self.inner.process.output()
    }

    /// How the process ended, once it has
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.inner.process.exit_status()
    }

    /// Neither exited nor force-killed
    pub fn is_alive(&self) -> bool {
        self.inner.process.is_alive()
    }

    /// Probe the health endpoint if one is configured, otherwise fall back to liveness
    pub async fn is_healthy(&self) -> bool {
        match self.inner.health_endpoint {
            Some(ref url) => probe_endpoint(&self.inner.http, url).await,
            None => self.is_alive(),
        }
    }

    /// Snapshot of pid, uptime and resident memory
    pub fn stats(&self) -> ServiceStats {
        let process = &self.inner.process;
        let memory_mb = if process.is_alive() {
            resident_memory_mb(process.pid())
        } else {
            None
        };

        ServiceStats {
            pid: process.pid(),
            uptime: process.spawned_at().elapsed(),
            memory_mb,
        }
    }

    /// Where the handle is in the stop sequence
    pub fn shutdown_state(&self) -> ShutdownState {
        self.inner.shutdown.state()
    }

    /// Graceful-then-forceful stop. Calling it again is a no-op.
    pub async fn stop(&self) -> FixtureResult<StopOutcome> {
        self.inner.shutdown.stop(&self.inner.process).await
    }

    /// Immediate forceful kill without waiting, for synchronous teardown paths
    pub(crate) fn abort(&self) {
        if let Err(e) = self.inner.process.force_kill() {
            tracing::warn!("⚠️ Failed to kill '{}': {}", self.name(), e);
        }
    }
}

fn resident_memory_mb(pid: u32) -> Option<f64> {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    if !system.refresh_process(pid) {
        return None;
    }
    system.process(pid).map(|p| p.memory() as f64 / (1024.0 * 1024.0))
}
