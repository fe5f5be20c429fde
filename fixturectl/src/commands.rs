//! Subcommand implementations
//!
//! Every command runs against a registry owned by the CLI. Until a cluster is
//! fully up (and for the whole of `check`) an interrupt kills everything in that
//! registry before the process exits; once `up` is holding a ready cluster, an
//! interrupt instead triggers the ordered, graceful `stop_all`.

use anyhow::{Context, bail};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use fixture_runtime::{
    Cluster, ClusterFile, NvidiaSmiProbe, ProcessLauncher, ProcessRegistry, assert_performance, measure_ms,
};

/// A termination signal arrived while fixtures were being started or checked
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("interrupted by {signal}; all fixture processes were killed")]
pub struct Interrupted {
    /// Signal name, for logs
    pub signal: &'static str,
    /// Conventional `128 + signo` exit code for the CLI
    pub exit_code: i32,
}

/// Outcome of `fixturectl check`
#[derive(Debug)]
pub struct CheckReport {
    /// Every member answered its health check
    pub healthy: bool,
    /// Wall time of the aggregate health check
    pub health_check_ms: u64,
    /// One message per exceeded performance bound
    pub violations: Vec<String>,
}

impl CheckReport {
    /// Healthy and within every bound
    pub fn passed(&self) -> bool {
        self.healthy && self.violations.is_empty()
    }
}

/// Start the cluster and keep it up until interrupted or the hold elapses
pub async fn up(path: &Path, hold_secs: Option<u64>, registry: Arc<ProcessRegistry>) -> anyhow::Result<()> {
    let (_, cluster) = interruptible(&registry, start(path, registry.clone()), termination_signal()).await?;

    for member in cluster.members() {
        let stats = member.stats();
        match stats.memory_mb {
            Some(mb) => info!(
                "📊 {} | PID {} | ready in {}ms | {:.1}MB",
                member.name(),
                stats.pid,
                member.startup_ms(),
                mb
            ),
            None => info!("📊 {} | PID {} | ready in {}ms", member.name(), stats.pid, member.startup_ms()),
        }
    }

    match hold_secs {
        Some(secs) => info!("⏳ Holding cluster for {}s (Ctrl+C to stop early)", secs),
        None => info!("⏳ Cluster running, press Ctrl+C to stop"),
    }

    let reason = wait_for_shutdown(hold_secs.map(Duration::from_secs)).await;
    info!("🛑 Shutting down ({})", reason);

    cluster.stop_all().await;
    info!("🏁 All services stopped");
    Ok(())
}

/// Run [`run_check`] and turn a failed report into an error
pub async fn check(path: &Path, registry: Arc<ProcessRegistry>) -> anyhow::Result<()> {
    let report = interruptible(&registry, run_check(path, registry.clone()), termination_signal()).await?;

    if !report.passed() {
        for violation in &report.violations {
            warn!("❌ {}", violation);
        }
        if !report.healthy {
            bail!("cluster unhealthy after startup");
        }
        bail!("{} performance bound(s) exceeded", report.violations.len());
    }

    info!("✅ Cluster healthy (health check took {}ms), all bounds met", report.health_check_ms);
    Ok(())
}

/// Start the cluster, check health and bounds, stop it, and report
pub async fn run_check(path: &Path, registry: Arc<ProcessRegistry>) -> anyhow::Result<CheckReport> {
    let (file, cluster) = start(path, registry).await?;

    let health = measure_ms(cluster.is_healthy()).await;
    info!(
        "🩺 Health check: {} in {}ms",
        if health.result { "healthy" } else { "UNHEALTHY" },
        health.ms
    );

    let mut violations = Vec::new();
    for definition in &file.services {
        let bounds = definition.bounds();
        if bounds.is_empty() {
            continue;
        }
        let Some(member) = cluster.get(&definition.name) else {
            continue;
        };
        if let Err(e) = assert_performance(member, &bounds) {
            violations.push(e.to_string());
        }
    }

    cluster.stop_all().await;

    Ok(CheckReport {
        healthy: health.result,
        health_check_ms: health.ms,
        violations,
    })
}

/// Run `work` unless `interrupt` resolves first, in which case every process in
/// `registry` is killed and [`Interrupted`] is returned.
pub async fn interruptible<T, W, I>(registry: &ProcessRegistry, work: W, interrupt: I) -> anyhow::Result<T>
where
    W: Future<Output = anyhow::Result<T>>,
    I: Future<Output = (&'static str, i32)>,
{
    tokio::select! {
        result = work => result,
        (signal, exit_code) = interrupt => {
            // `work` is dropped here, so nothing else will stop what it started
            let killed = registry.kill_all();
            warn!("🚨 {} received, killed {} fixture processes", signal, killed);
            Err(Interrupted { signal, exit_code }.into())
        }
    }
}

/// Load the cluster file and start it on the CLI's registry
async fn start(path: &Path, registry: Arc<ProcessRegistry>) -> anyhow::Result<(ClusterFile, Cluster)> {
    let file = ClusterFile::load(path).with_context(|| format!("failed to read cluster file {}", path.display()))?;
    let configs = file
        .service_configs()
        .with_context(|| format!("invalid cluster file {}", path.display()))?;

    info!("🧪 Starting {} services from {}", configs.len(), path.display());

    let launcher = ProcessLauncher::new(registry, Arc::new(NvidiaSmiProbe::new()));
    let cluster = launcher.start_cluster(configs).await.context("cluster failed to start")?;

    Ok((file, cluster))
}

async fn wait_for_shutdown(hold: Option<Duration>) -> &'static str {
    let hold = async {
        match hold {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        (signal, _) = termination_signal() => signal,
        _ = hold => "hold elapsed",
    }
}

/// Resolves with the signal name and exit code on SIGINT or SIGTERM
pub async fn termination_signal() -> (&'static str, i32) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => tokio::select! {
                _ = ctrl_c() => ("SIGINT", 130),
                _ = terminate.recv() => ("SIGTERM", 143),
            },
            Err(e) => {
                warn!("⚠️ Could not listen for SIGTERM: {}", e);
                ctrl_c().await;
                ("SIGINT", 130)
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c().await;
        ("Ctrl+C", 130)
    }
}

/// Ctrl+C; never resolves if the handler cannot be installed
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("⚠️ Could not listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
