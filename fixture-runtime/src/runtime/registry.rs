//! Process Registry
//!
//! Process-wide set of live fixture processes. Anything still in the set when the
//! test run ends (normally or not) is force-killed, so no fixture outlives the run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::{debug, info, warn};

use super::{hooks, signals};

/// One tracked process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredProcess {
    /// OS process id
    pub pid: u32,
    /// Service name, for logs
    pub name: String,
}

#[derive(Debug, Default)]
pub struct ProcessRegistry {
    live: Mutex<HashMap<u32, RegisteredProcess>>,
}

static GLOBAL: OnceLock<Arc<ProcessRegistry>> = OnceLock::new();

impl ProcessRegistry {
    /// Independent registry with no exit hooks attached
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry. First access installs the exit, signal and
    /// panic hooks that call [`ProcessRegistry::kill_all`].
    pub fn global() -> Arc<ProcessRegistry> {
        GLOBAL
            .get_or_init(|| {
                let registry = Arc::new(ProcessRegistry::new());
                hooks::install(registry.clone());
                registry
            })
            .clone()
    }

    fn live(&self) -> MutexGuard<'_, HashMap<u32, RegisteredProcess>> {
        // A panic while holding the lock cannot leave the map half-updated
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track a live process
    pub fn register(&self, pid: u32, name: &str) {
        debug!("📝 Tracking '{}' (PID: {})", name, pid);
        self.live().insert(
            pid,
            RegisteredProcess {
                pid,
                name: name.to_string(),
            },
        );
    }

    /// Drop a process from the live set; returns whether it was tracked
    pub fn unregister(&self, pid: u32) -> bool {
        let removed = self.live().remove(&pid);
        if let Some(ref entry) = removed {
            debug!("📤 Untracked '{}' (PID: {})", entry.name, pid);
        }
        removed.is_some()
    }

    /// Whether `pid` is currently tracked
    pub fn contains(&self, pid: u32) -> bool {
        self.live().contains_key(&pid)
    }

    /// Number of tracked processes
    pub fn len(&self) -> usize {
        self.live().len()
    }

    pub fn is_empty(&self) -> bool {
        self.live().is_empty()
    }

    /// Currently tracked processes, ordered by PID
    pub fn snapshot(&self) -> Vec<RegisteredProcess> {
        let mut entries: Vec<_> = self.live().values().cloned().collect();
        entries.sort_by_key(|e| e.pid);
        entries
    }

    /// Force-kill every tracked process and clear the set.
    ///
    /// Never fails: errors for individual processes are logged and skipped.
    /// Returns the number of processes that were signalled.
    pub fn kill_all(&self) -> usize {
        let entries: Vec<RegisteredProcess> = self.live().drain().map(|(_, entry)| entry).collect();
        if entries.is_empty() {
            return 0;
        }

        info!("🔪 Killing {} fixture processes", entries.len());

        let mut killed = 0;
        for entry in entries {
            match signals::force_kill(entry.pid) {
                Ok(()) => {
                    killed += 1;
                    debug!("🔨 Killed '{}' (PID: {})", entry.name, entry.pid);
                }
                Err(e) => {
                    warn!("⚠️ Failed to kill '{}' (PID: {}): {}", entry.name, entry.pid, e);
                }
            }
        }

        killed
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn test_register_and_unregister() {
        let registry = ProcessRegistry::new();
        assert!(registry.is_empty());

        registry.register(4242, "db");
        registry.register(4243, "api");
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(4242));

        assert!(registry.unregister(4242));
        assert!(!registry.unregister(4242));
        assert_eq!(
            registry.snapshot(),
            vec![RegisteredProcess {
                pid: 4243,
                name: "api".to_string()
            }]
        );
    }

    #[test]
    fn test_kill_all_terminates_live_processes() {
        let registry = ProcessRegistry::new();
        let mut first = Command::new("sleep").arg("30").spawn().unwrap();
        let mut second = Command::new("sleep").arg("30").spawn().unwrap();
        registry.register(first.id(), "first");
        registry.register(second.id(), "second");

        assert_eq!(registry.kill_all(), 2);
        assert!(registry.is_empty());

        assert!(!first.wait().unwrap().success());
        assert!(!second.wait().unwrap().success());
    }

    #[test]
    fn test_kill_all_tolerates_dead_processes() {
        let registry = ProcessRegistry::new();
        let mut gone = Command::new("true").spawn().unwrap();
        gone.wait().unwrap();
        registry.register(gone.id(), "gone");

        // Must not panic, and the set is cleared either way
        registry.kill_all();
        assert!(registry.is_empty());
        assert_eq!(registry.kill_all(), 0);
    }
}
