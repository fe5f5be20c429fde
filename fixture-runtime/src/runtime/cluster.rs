//! Cluster Coordination
//!
//! Starts services one after another (each fully ready before the next) and
//! stops them in exact reverse order. A cluster is only ever handed out fully
//! started: if member N fails, members N-1..1 are stopped before N's error is returned.

use futures_util::future::join_all;
use tracing::{info, warn};

use super::service::ServiceHandle;
use crate::config::ServiceConfig;
use crate::config::service::validate_cluster;
use crate::error::FixtureResult;
use crate::traits::{ClusterMember, ServiceLauncher};

#[derive(Debug, Clone)]
pub struct Cluster<M = ServiceHandle> {
    members: Vec<M>,
}

impl<M: ClusterMember> Cluster<M> {
    /// Start `configs` in order using `launcher`
    pub async fn start_with<L>(launcher: &L, configs: Vec<ServiceConfig>) -> FixtureResult<Self>
    where
        L: ServiceLauncher<Member = M>,
    {
        validate_cluster(&configs)?;
        info!("🌐 Starting cluster of {} services", configs.len());

        let mut members: Vec<M> = Vec::with_capacity(configs.len());
        for config in &configs {
            match launcher.launch(config).await {
                Ok(member) => members.push(member),
                Err(e) => {
                    warn!(
                        "❌ '{}' failed to start; unwinding {} started services",
                        config.name,
                        members.len()
                    );
                    stop_in_reverse(&members).await;
                    return Err(e);
                }
            }
        }

        info!("✅ Cluster ready: {}", names(&members).join(" -> "));
        Ok(Self { members })
    }

    /// Stop every member, last started first. Stop errors are logged and skipped.
    pub async fn stop_all(&self) {
        info!("🛑 Stopping cluster: {}", names(&self.members).into_iter().rev().collect::<Vec<_>>().join(" -> "));
        stop_in_reverse(&self.members).await;
    }

    /// Member by name
    pub fn get(&self, name: &str) -> Option<&M> {
        self.members.iter().find(|m| m.name() == name)
    }

    /// True only if every member reports healthy; members are probed concurrently
    pub async fn is_healthy(&self) -> bool {
        let results = join_all(self.members.iter().map(|m| m.is_healthy())).await;
        results.into_iter().all(|healthy| healthy)
    }

    /// Members in start order
    pub fn members(&self) -> &[M] {
        &self.members
    }

    /// Member names in start order
    pub fn names(&self) -> Vec<&str> {
        names(&self.members)
    }

    /// Number of started members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

fn names<M: ClusterMember>(members: &[M]) -> Vec<&str> {
    members.iter().map(|m| m.name()).collect()
}

async fn stop_in_reverse<M: ClusterMember>(members: &[M]) {
    for member in members.iter().rev() {
        if let Err(e) = member.stop().await {
            warn!("⚠️ Failed to stop '{}': {}", member.name(), e);
        }
    }
}
