//! Common test utilities
//!
//! Shell-script fixtures shared by the integration suites.

#![allow(dead_code)]

use fixture_runtime::ServiceConfig;
use std::time::Duration;

/// A service that prints `READY` right away and then idles
pub fn ready_service(name: &str) -> ServiceConfig {
    script_service(name, "echo READY; exec sleep 30")
}

/// A `sh -c` service ready on the `READY` marker
pub fn script_service(name: &str, script: &str) -> ServiceConfig {
    ServiceConfig::builder(name, "sh")
        .args(["-c", script])
        .ready_on_marker("READY")
        .startup_timeout(Duration::from_secs(10))
        .shutdown_grace(Duration::from_secs(2))
        .build()
}

/// A service that exits with `code` before ever printing the marker
pub fn failing_service(name: &str, code: i32) -> ServiceConfig {
    script_service(name, &format!("echo 'fatal: {name} cannot start' 1>&2; exit {code}"))
}
