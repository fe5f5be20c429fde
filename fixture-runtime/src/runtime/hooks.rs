//! Automatic cleanup triggers for the process-wide registry
//!
//! `kill_all` fires on exactly these events: normal process exit, SIGINT,
//! SIGTERM, and a panic on the main thread.

use std::sync::mpsc;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::warn;

use super::registry::ProcessRegistry;

static HOOKED: OnceLock<Arc<ProcessRegistry>> = OnceLock::new();

/// Attach the hooks to `registry`. Only the first call has any effect.
pub(crate) fn install(registry: Arc<ProcessRegistry>) {
    if HOOKED.set(registry).is_err() {
        return;
    }

    install_exit_hook();
    install_panic_hook();
    spawn_signal_listener();
}

fn kill_hooked(trigger: &str) {
    if let Some(registry) = HOOKED.get() {
        if !registry.is_empty() {
            warn!("🚨 {}: killing {} remaining fixture processes", trigger, registry.len());
        }
        registry.kill_all();
    }
}

#[cfg(unix)]
fn install_exit_hook() {
    extern "C" fn on_exit() {
        kill_hooked("Process exit");
    }

    // SAFETY: `on_exit` is a plain extern "C" fn with no captured state
    let rc = unsafe { libc::atexit(on_exit) };
    if rc != 0 {
        warn!("⚠️ Could not register exit hook; fixtures may outlive the test run");
    }
}

#[cfg(not(unix))]
fn install_exit_hook() {
    // Child handles are spawned with kill_on_drop, which covers orderly exits here
}

fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        // Panics on worker threads are caught by their owners (the test harness
        // included); only a main-thread panic takes the whole process down
        if std::thread::current().name() == Some("main") {
            kill_hooked("Uncaught panic");
        }
        previous(info);
    }));
}

/// Upper bound on waiting for the listener thread to install its handlers
const LISTENER_READY_TIMEOUT: Duration = Duration::from_secs(1);

/// Signals are handled on a dedicated thread with its own runtime, so the
/// handler stays alive regardless of which test runtime is currently running.
/// Returns once the handlers are installed.
fn spawn_signal_listener() {
    let (ready_tx, ready_rx) = mpsc::channel();
    let spawned = std::thread::Builder::new()
        .name("fixture-signals".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!("⚠️ Signal listener unavailable: {}", e);
                    return;
                }
            };

            if let Some((trigger, exit_code)) = runtime.block_on(wait_for_termination(ready_tx)) {
                kill_hooked(trigger);
                std::process::exit(exit_code);
            }
        });

    match spawned {
        Ok(_) => {
            if ready_rx.recv_timeout(LISTENER_READY_TIMEOUT).is_err() {
                warn!("⚠️ Signal listener did not confirm its handlers");
            }
        }
        Err(e) => warn!("⚠️ Failed to start signal listener thread: {}", e),
    }
}

#[cfg(unix)]
async fn wait_for_termination(ready: mpsc::Sender<()>) -> Option<(&'static str, i32)> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt()).ok()?;
    let mut terminate = signal(SignalKind::terminate()).ok()?;
    let _ = ready.send(());

    tokio::select! {
        Some(()) = interrupt.recv() => Some(("SIGINT", 130)),
        Some(()) = terminate.recv() => Some(("SIGTERM", 143)),
        else => None,
    }
}

#[cfg(not(unix))]
async fn wait_for_termination(ready: mpsc::Sender<()>) -> Option<(&'static str, i32)> {
    let ctrl_c = tokio::signal::ctrl_c();
    let _ = ready.send(());
    ctrl_c.await.ok()?;
    Some(("Ctrl+C", 130))
}
