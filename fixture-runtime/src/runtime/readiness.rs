//! Readiness Detection
//!
//! Blocks service startup until the process reports ready, exits, or runs out of time.
//! The process exiting early fails detection immediately instead of waiting out the timeout,
//! and a process that is already gone when readiness is confirmed is never reported ready.

use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use super::process::{ExitStatus, ManagedProcess};
use crate::config::ReadinessSpec;
use crate::error::{FixtureError, FixtureResult};

/// Wait until `process` satisfies `readiness`, bounded by `startup_timeout`.
///
/// On timeout the process is force-killed before the error is returned.
pub async fn wait_until_ready(
    process: &ManagedProcess,
    readiness: Option<&ReadinessSpec>,
    startup_timeout: Duration,
) -> FixtureResult<()> {
    let Some(readiness) = readiness else {
        return Err(FixtureError::MissingReadiness {
            service: process.name().to_string(),
        });
    };

    debug!("⏳ Waiting for '{}' to report ready via {}", process.name(), readiness.describe());

    let detection = async {
        match readiness {
            ReadinessSpec::Marker { marker, poll_interval } => poll_marker(process, marker, *poll_interval).await,
            ReadinessSpec::Endpoint {
                url,
                poll_interval,
                request_timeout,
            } => poll_endpoint(process, url, *poll_interval, *request_timeout).await,
        }
    };

    match tokio::time::timeout(startup_timeout, detection).await {
        Ok(Ok(())) => match process.exit_status() {
            // Printed the marker (or answered once) and then died
            Some(_) => {
                let status = process.wait_for_exit().await;
                Err(early_exit(process, status))
            }
            None => Ok(()),
        },
        Ok(Err(e)) => Err(e),
        Err(_) => {
            if let Err(e) = process.force_kill() {
                warn!("⚠️ Could not kill '{}' after readiness timeout: {}", process.name(), e);
            }
            Err(FixtureError::ReadinessTimeout {
                service: process.name().to_string(),
                timeout: startup_timeout,
                output_tail: process.output_tail(),
            })
        }
    }
}

async fn poll_marker(process: &ManagedProcess, marker: &str, poll_interval: Duration) -> FixtureResult<()> {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let exited = process.wait_for_exit();
    tokio::pin!(exited);

    loop {
        tokio::select! {
            status = &mut exited => return Err(early_exit(process, status)),
            _ = ticker.tick() => {
                if process.output_contains(marker) {
                    return Ok(());
                }
            }
        }
    }
}

async fn poll_endpoint(
    process: &ManagedProcess,
    url: &str,
    poll_interval: Duration,
    request_timeout: Duration,
) -> FixtureResult<()> {
    let client = reqwest::Client::builder().timeout(request_timeout).build()?;
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let exited = process.wait_for_exit();
    tokio::pin!(exited);

    loop {
        tokio::select! {
            status = &mut exited => return Err(early_exit(process, status)),
            _ = ticker.tick() => {
                if probe_endpoint(&client, url).await {
                    return Ok(());
                }
            }
        }
    }
}

/// One GET against `url`; transport errors and non-2xx both count as "not ready"
pub(crate) async fn probe_endpoint(client: &reqwest::Client, url: &str) -> bool {
    match client.get(url).send().await {
        Ok(response) => {
            let ok = response.status().is_success();
            if !ok {
                debug!("🔍 {} answered {}", url, response.status());
            }
            ok
        }
        Err(e) => {
            debug!("🔍 {} unreachable: {}", url, e);
            false
        }
    }
}

fn early_exit(process: &ManagedProcess, status: ExitStatus) -> FixtureError {
    FixtureError::EarlyExit {
        service: process.name().to_string(),
        status,
        output_tail: process.output_tail(),
    }
}
