//! End-of-test Cleanup
//!
//! [`auto_cleanup`] wraps a service or cluster in a guard that stops it exactly once:
//! gracefully when [`CleanupGuard::run`] is awaited, or by an immediate kill if the
//! guard is dropped first (a failed assertion unwinding past the test body).

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use crate::runtime::{Cluster, ServiceHandle};

/// Something that can be torn down at the end of a test
#[async_trait::async_trait]
pub trait Cleanup: Send + Sync {
    fn label(&self) -> String;

    /// Graceful teardown
    async fn cleanup(&self);

    /// Immediate teardown for synchronous contexts
    fn abort(&self);
}

#[async_trait::async_trait]
impl Cleanup for ServiceHandle {
    fn label(&self) -> String {
        format!("service '{}'", self.name())
    }

    async fn cleanup(&self) {
        if let Err(e) = self.stop().await {
            warn!("⚠️ Cleanup of '{}' failed: {}", self.name(), e);
        }
    }

    fn abort(&self) {
        ServiceHandle::abort(self);
    }
}

#[async_trait::async_trait]
impl Cleanup for Cluster<ServiceHandle> {
    fn label(&self) -> String {
        format!("cluster [{}]", self.names().join(", "))
    }

    async fn cleanup(&self) {
        self.stop_all().await;
    }

    fn abort(&self) {
        for member in self.members().iter().rev() {
            member.abort();
        }
    }
}

/// Stops its target exactly once; see [`auto_cleanup`]
pub struct CleanupGuard {
    target: Box<dyn Cleanup>,
    done: AtomicBool,
}

/// Register `target` for teardown at the end of the test
pub fn auto_cleanup<T: Cleanup + 'static>(target: T) -> CleanupGuard {
    CleanupGuard {
        target: Box::new(target),
        done: AtomicBool::new(false),
    }
}

impl CleanupGuard {
    /// Stop the target; only the first call does anything
    pub async fn run(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }
        self.target.cleanup().await;
    }

    /// Whether the target has already been torn down
    pub fn has_run(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if !self.done.swap(true, Ordering::SeqCst) {
            warn!("🚨 Cleanup guard for {} dropped before running, killing", self.target.label());
            self.target.abort();
        }
    }
}
