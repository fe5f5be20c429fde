//! Service Configuration Builder
//!
//! Fluent construction of a [`ServiceConfig`] with the runtime defaults filled in

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use super::service::{DEFAULT_SHUTDOWN_GRACE, DEFAULT_STARTUP_TIMEOUT};
use super::{HardwareRequirements, ReadinessSpec, ServiceConfig};

/// Fluent builder for [`ServiceConfig`]; start with [`ServiceConfig::builder`]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    /// Builder with every default applied and no readiness check yet
    pub fn new<N: Into<String>, C: Into<String>>(name: N, command: C) -> Self {
        Self {
            config: ServiceConfig {
                name: name.into(),
                command: command.into(),
                args: Vec::new(),
                working_dir: None,
                env: HashMap::new(),
                readiness: None,
                health_endpoint: None,
                startup_timeout: DEFAULT_STARTUP_TIMEOUT,
                shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
                hardware: HardwareRequirements::default(),
            },
        }
    }

    /// Append a single argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.config.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run the process in `dir` instead of the current directory
    pub fn working_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.working_dir = Some(dir.into());
        self
    }

    /// Set an environment override for the spawned process
    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.config.env.insert(key.into(), value.into());
        self
    }

    /// Set the readiness check, replacing any earlier one
    pub fn readiness(mut self, readiness: ReadinessSpec) -> Self {
        self.config.readiness = Some(readiness);
        self
    }

    /// Ready once `marker` appears in the process output
    pub fn ready_on_marker<S: Into<String>>(self, marker: S) -> Self {
        self.readiness(ReadinessSpec::marker(marker))
    }

    /// Ready once `url` answers a GET with a success status
    pub fn ready_on_endpoint<S: Into<String>>(self, url: S) -> Self {
        self.readiness(ReadinessSpec::endpoint(url))
    }

    /// Override the poll interval of the readiness check already set
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.readiness = self.config.readiness.map(|r| r.with_poll_interval(interval));
        self
    }

    /// URL probed by `is_healthy` once the service is running
    pub fn health_endpoint<S: Into<String>>(mut self, url: S) -> Self {
        self.config.health_endpoint = Some(url.into());
        self
    }

    /// Upper bound on spawn-to-ready
    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.config.startup_timeout = timeout;
        self
    }

    /// How long `stop` waits after the graceful signal before killing
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    /// Refuse to start unless a GPU is detected
    pub fn requires_gpu(mut self) -> Self {
        self.config.hardware.gpu = true;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> ServiceConfig {
        self.config
    }
}
