//! Shutdown Protocol
//!
//! `Running -> Terminating -> Stopped`. A graceful signal is sent first, then
//! process exit races the grace timer; if the timer wins the process is
//! force-killed. Each signal is sent at most once and nothing is restarted.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::process::ManagedProcess;
use crate::error::FixtureResult;

/// Upper bound on waiting for the kernel to reap a force-killed process
const REAP_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Terminating,
    Stopped,
}

/// What a call to `stop` actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Already stopped earlier; no signal sent
    AlreadyStopped,
    /// The process had exited on its own; no signal sent
    AlreadyExited,
    /// Exited within the grace period after the graceful signal
    Graceful,
    /// Grace period elapsed and the process was force-killed
    Forced,
}

#[derive(Debug)]
pub struct ShutdownProtocol {
    grace: Duration,
    state: Mutex<ShutdownState>,
}

impl ShutdownProtocol {
    /// Protocol in the `Running` state
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            state: Mutex::new(ShutdownState::Running),
        }
    }

    /// Wait between the graceful and the forceful signal
    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Current state; a stop in progress reads as `Terminating`
    pub fn state(&self) -> ShutdownState {
        self.state
            .try_lock()
            .map(|state| *state)
            .unwrap_or(ShutdownState::Terminating)
    }

    /// Stop `process`. Concurrent callers are serialized; every caller after
    /// the first gets `AlreadyStopped`.
    pub async fn stop(&self, process: &ManagedProcess) -> FixtureResult<StopOutcome> {
        let mut state = self.state.lock().await;

        if *state == ShutdownState::Stopped {
            return Ok(StopOutcome::AlreadyStopped);
        }

        if process.exit_status().is_some() {
            *state = ShutdownState::Stopped;
            return Ok(StopOutcome::AlreadyExited);
        }

        *state = ShutdownState::Terminating;
        debug!("🛑 Stopping '{}' (PID: {}), grace {:?}", process.name(), process.pid(), self.grace);

        let outcome = match process.terminate() {
            Ok(()) => {
                tokio::select! {
                    _ = process.wait_for_exit() => StopOutcome::Graceful,
                    _ = sleep(self.grace) => {
                        warn!("🔨 '{}' ignored the graceful signal for {:?}, force killing", process.name(), self.grace);
                        self.force(process).await?
                    }
                }
            }
            Err(e) => {
                // No second graceful attempt; go straight to the forceful phase
                warn!("⚠️ Graceful signal to '{}' failed: {}", process.name(), e);
                self.force(process).await?
            }
        };

        *state = ShutdownState::Stopped;
        info!("✅ '{}' stopped ({:?})", process.name(), outcome);
        Ok(outcome)
    }

    async fn force(&self, process: &ManagedProcess) -> FixtureResult<StopOutcome> {
        // On failure the state stays `Terminating` so a later stop can try again
        process.force_kill()?;
        let _ = tokio::time::timeout(REAP_TIMEOUT, process.wait_for_exit()).await;
        Ok(StopOutcome::Forced)
    }
}
