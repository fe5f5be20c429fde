//! Cluster File
//!
//! JSON description of a cluster, one entry per service in start order:
//!
//! ```json
//! {
//!   "services": [
//!     { "name": "db", "command": "./fake-db", "ready_marker": "listening" },
//!     { "name": "api", "command": "./api", "args": ["--port", "8080"],
//!       "ready_url": "http://127.0.0.1:8080/health", "max_startup_ms": 3000 }
//!   ]
//! }
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{ReadinessSpec, ServiceConfig};
use crate::error::{FixtureError, FixtureResult};
use crate::testing::PerformanceBounds;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterFile {
    /// Services in start order
    pub services: Vec<ServiceDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceDefinition {
    /// Unique name within the cluster
    pub name: String,
    /// Program to run, resolved through `PATH`
    pub command: String,
    /// Arguments passed verbatim
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Extra environment variables
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Output marker that signals readiness
    #[serde(default)]
    pub ready_marker: Option<String>,
    /// URL that answers 2xx once ready
    #[serde(default)]
    pub ready_url: Option<String>,
    /// Readiness poll interval
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    /// Health URL probed after startup
    #[serde(default)]
    pub health_url: Option<String>,
    /// Spawn-to-ready limit
    #[serde(default)]
    pub startup_timeout_ms: Option<u64>,
    /// Grace period on stop
    #[serde(default)]
    pub shutdown_grace_ms: Option<u64>,
    /// Skip-worthy unless a GPU is present
    #[serde(default)]
    pub requires_gpu: bool,
    /// Startup bound checked by `fixturectl check`
    #[serde(default)]
    pub max_startup_ms: Option<u64>,
    /// Memory bound checked by `fixturectl check`
    #[serde(default)]
    pub max_memory_mb: Option<f64>,
}

impl ClusterFile {
    /// Read and parse a cluster file from disk
    pub fn load<P: AsRef<Path>>(path: P) -> FixtureResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parse a cluster file; unknown fields are rejected
    pub fn from_json(raw: &str) -> FixtureResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Service configs in file order
    pub fn service_configs(&self) -> FixtureResult<Vec<ServiceConfig>> {
        self.services.iter().map(ServiceDefinition::to_config).collect()
    }
}

impl ServiceDefinition {
    /// Convert to a [`ServiceConfig`]; exactly one of `ready_marker` / `ready_url` must be set
    pub fn to_config(&self) -> FixtureResult<ServiceConfig> {
        let readiness = match (&self.ready_marker, &self.ready_url) {
            (Some(marker), None) => ReadinessSpec::marker(marker.clone()),
            (None, Some(url)) => ReadinessSpec::endpoint(url.clone()),
            (Some(_), Some(_)) => {
                return Err(FixtureError::config(format!(
                    "service '{}' sets both ready_marker and ready_url; pick one",
                    self.name
                )));
            }
            (None, None) => {
                return Err(FixtureError::MissingReadiness {
                    service: self.name.clone(),
                });
            }
        };

        let mut builder = ServiceConfig::builder(self.name.clone(), self.command.clone())
            .args(self.args.iter().cloned())
            .readiness(readiness);

        if let Some(ms) = self.poll_interval_ms {
            builder = builder.poll_interval(Duration::from_millis(ms));
        }
        if let Some(ref cwd) = self.cwd {
            builder = builder.working_dir(cwd.clone());
        }
        for (key, value) in &self.env {
            builder = builder.env(key.clone(), value.clone());
        }
        if let Some(ref url) = self.health_url {
            builder = builder.health_endpoint(url.clone());
        }
        if let Some(ms) = self.startup_timeout_ms {
            builder = builder.startup_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.shutdown_grace_ms {
            builder = builder.shutdown_grace(Duration::from_millis(ms));
        }
        if self.requires_gpu {
            builder = builder.requires_gpu();
        }

        Ok(builder.build())
    }

    /// Performance bounds declared for this service, if any
    pub fn bounds(&self) -> PerformanceBounds {
        PerformanceBounds {
            max_startup_ms: self.max_startup_ms,
            max_memory_mb: self.max_memory_mb,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "services": [
            { "name": "db", "command": "sh", "args": ["-c", "echo ready; exec sleep 30"], "ready_marker": "ready" },
            {
                "name": "api",
                "command": "./api",
                "env": { "PORT": "8080" },
                "ready_url": "http://127.0.0.1:8080/health",
                "poll_interval_ms": 100,
                "health_url": "http://127.0.0.1:8080/health",
                "startup_timeout_ms": 3000,
                "shutdown_grace_ms": 250,
                "max_startup_ms": 2000,
                "max_memory_mb": 128.5
            }
        ]
    }"#;

    #[test]
    fn test_parse_cluster_file() {
        let file = ClusterFile::from_json(SAMPLE).unwrap();
        let configs = file.service_configs().unwrap();

        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].name, "db");
        assert_eq!(configs[0].readiness, Some(ReadinessSpec::marker("ready")));

        let api = &configs[1];
        assert_eq!(api.env.get("PORT").map(String::as_str), Some("8080"));
        assert_eq!(api.readiness.as_ref().map(ReadinessSpec::poll_interval), Some(Duration::from_millis(100)));
        assert_eq!(api.startup_timeout, Duration::from_millis(3000));
        assert_eq!(api.shutdown_grace, Duration::from_millis(250));

        let bounds = file.services[1].bounds();
        assert_eq!(bounds.max_startup_ms, Some(2000));
        assert_eq!(bounds.max_memory_mb, Some(128.5));
    }

    #[test]
    fn test_both_readiness_modes_rejected() {
        let raw = r#"{ "services": [ { "name": "x", "command": "x", "ready_marker": "a", "ready_url": "http://b" } ] }"#;
        let file = ClusterFile::from_json(raw).unwrap();
        assert_matches!(file.service_configs(), Err(FixtureError::InvalidConfig { .. }));
    }

    #[test]
    fn test_missing_readiness_rejected() {
        let raw = r#"{ "services": [ { "name": "x", "command": "x" } ] }"#;
        let file = ClusterFile::from_json(raw).unwrap();
        assert_matches!(file.service_configs(), Err(FixtureError::MissingReadiness { service }) if service == "x");
    }

    #[test]
    fn test_zero_poll_interval_fails_validation() {
        let raw = r#"{ "services": [ { "name": "x", "command": "x", "ready_marker": "a", "poll_interval_ms": 0 } ] }"#;
        let configs = ClusterFile::from_json(raw).unwrap().service_configs().unwrap();
        assert_matches!(configs[0].validate(), Err(FixtureError::InvalidConfig { .. }));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let raw = r#"{ "services": [ { "name": "x", "command": "x", "ready_marker": "a", "restart": true } ] }"#;
        assert_matches!(ClusterFile::from_json(raw), Err(FixtureError::Json(_)));
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let loaded = ClusterFile::load(file.path()).unwrap();
        assert_eq!(loaded.services.len(), 2);
    }
}
