//! Service Configuration
//!
//! Declarative description of a fixture process and how to tell when it is ready.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{FixtureError, FixtureResult};

/// Spawn-to-ready limit when none is configured
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);
/// Time between the graceful and the forceful signal
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
/// Output scan interval in marker mode
pub const DEFAULT_MARKER_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Request interval in endpoint mode
pub const DEFAULT_ENDPOINT_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Per-request timeout for readiness and health probes
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// How to decide that a spawned process is ready to serve
#[derive(Debug, Clone, PartialEq)]
pub enum ReadinessSpec {
    /// Ready once `marker` shows up in captured stdout or stderr
    Marker { marker: String, poll_interval: Duration },
    /// Ready once a GET on `url` answers with a success status
    Endpoint {
        url: String,
        poll_interval: Duration,
        request_timeout: Duration,
    },
}

impl ReadinessSpec {
    /// Marker readiness with the default poll interval
    pub fn marker<S: Into<String>>(marker: S) -> Self {
        ReadinessSpec::Marker {
            marker: marker.into(),
            poll_interval: DEFAULT_MARKER_POLL_INTERVAL,
        }
    }

    /// Endpoint readiness with the default poll interval and request timeout
    pub fn endpoint<S: Into<String>>(url: S) -> Self {
        ReadinessSpec::Endpoint {
            url: url.into(),
            poll_interval: DEFAULT_ENDPOINT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Same check, different poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        match &mut self {
            ReadinessSpec::Marker { poll_interval, .. } | ReadinessSpec::Endpoint { poll_interval, .. } => {
                *poll_interval = interval;
            }
        }
        self
    }

    pub fn poll_interval(&self) -> Duration {
        match self {
            ReadinessSpec::Marker { poll_interval, .. } | ReadinessSpec::Endpoint { poll_interval, .. } => {
                *poll_interval
            }
        }
    }

    /// Short label used in log lines
    pub fn describe(&self) -> String {
        match self {
            ReadinessSpec::Marker { marker, .. } => format!("marker '{marker}'"),
            ReadinessSpec::Endpoint { url, .. } => format!("endpoint {url}"),
        }
    }
}

/// Hardware a service needs before it is worth spawning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HardwareRequirements {
    /// Needs a GPU (detected through `nvidia-smi`)
    pub gpu: bool,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Unique service name, used in logs and errors
    pub name: String,
    /// Program to run, resolved through `PATH`
    pub command: String,
    /// Arguments passed verbatim, no shell involved
    pub args: Vec<String>,
    /// Working directory; inherits ours when `None`
    pub working_dir: Option<PathBuf>,
    /// Variables added on top of the inherited environment
    pub env: HashMap<String, String>,
    /// How to tell the service is ready; required to start
    pub readiness: Option<ReadinessSpec>,
    /// Health URL; without one, health falls back to liveness
    pub health_endpoint: Option<String>,
    /// Spawn-to-ready limit
    pub startup_timeout: Duration,
    /// Wait between the graceful and the forceful signal on stop
    pub shutdown_grace: Duration,
    /// Hardware checked before spawning
    pub hardware: HardwareRequirements,
}

impl ServiceConfig {
    /// Create a new builder
    pub fn builder<N: Into<String>, C: Into<String>>(name: N, command: C) -> crate::config::builder::ServiceConfigBuilder {
        crate::config::builder::ServiceConfigBuilder::new(name, command)
    }

    /// Check everything that can be checked before a process is spawned
    pub fn validate(&self) -> FixtureResult<()> {
        if self.name.trim().is_empty() {
            return Err(FixtureError::config("service name must not be empty"));
        }

        if self.command.trim().is_empty() {
            return Err(FixtureError::config(format!(
                "service '{}' has an empty command",
                self.name
            )));
        }

        match &self.readiness {
            None => {
                return Err(FixtureError::MissingReadiness {
                    service: self.name.clone(),
                });
            }
            Some(ReadinessSpec::Marker { marker, .. }) if marker.is_empty() => {
                return Err(FixtureError::config(format!(
                    "service '{}' has an empty readiness marker",
                    self.name
                )));
            }
            Some(ReadinessSpec::Endpoint { url, .. }) if url.is_empty() => {
                return Err(FixtureError::config(format!(
                    "service '{}' has an empty readiness endpoint",
                    self.name
                )));
            }
            Some(_) => {}
        }

        if let Some(ref readiness) = self.readiness {
            if readiness.poll_interval().is_zero() {
                return Err(FixtureError::config(format!(
                    "service '{}' has a zero readiness poll interval",
                    self.name
                )));
            }
            if let ReadinessSpec::Endpoint { request_timeout, .. } = readiness {
                if request_timeout.is_zero() {
                    return Err(FixtureError::config(format!(
                        "service '{}' has a zero readiness request timeout",
                        self.name
                    )));
                }
            }
        }

        if self.startup_timeout.is_zero() {
            return Err(FixtureError::config(format!(
                "service '{}' has a zero startup timeout",
                self.name
            )));
        }

        Ok(())
    }

    /// Full command line, for logs and error messages
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Names within one cluster start must be non-empty and unique
pub fn validate_cluster(configs: &[ServiceConfig]) -> FixtureResult<()> {
    let mut seen = HashSet::new();
    for config in configs {
        if config.name.trim().is_empty() {
            return Err(FixtureError::config("service name must not be empty"));
        }
        if !seen.insert(config.name.as_str()) {
            return Err(FixtureError::config(format!(
                "duplicate service name '{}' in cluster",
                config.name
            )));
        }
    }
    Ok(())
}
