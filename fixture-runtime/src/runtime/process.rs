//! Managed Process
//!
//! One spawned fixture process: captured output, exit notification and the
//! signals used to stop it. The child itself is owned by a watcher task which
//! reaps it, publishes the exit status and drops the registry entry.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::registry::ProcessRegistry;
use super::signals;
use crate::config::ServiceConfig;
use crate::error::{FixtureError, FixtureResult};

/// Characters of output quoted in startup errors
pub const OUTPUT_TAIL_CHARS: usize = 500;

/// How long the watcher waits for the output pipes to drain after exit
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(200);

/// How a fixture process ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitStatus {
    /// Exit code if the process exited normally
    pub code: Option<i32>,
    /// Signal that terminated the process (unix only)
    pub signal: Option<i32>,
}

impl ExitStatus {
    /// Exited normally with code 0
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "terminated by signal {signal}"),
            (None, None) => write!(f, "unknown exit status"),
        }
    }
}

/// Append-only capture of one output stream
#[derive(Debug, Default)]
struct OutputBuffer {
    bytes: Mutex<Vec<u8>>,
}

impl OutputBuffer {
    fn append(&self, chunk: &[u8]) {
        self.bytes.lock().unwrap_or_else(PoisonError::into_inner).extend_from_slice(chunk);
    }

    fn contents(&self) -> String {
        let bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

#[derive(Debug)]
pub struct ManagedProcess {
    name: String,
    pid: u32,
    command: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    env: HashMap<String, String>,
    stdout: Arc<OutputBuffer>,
    stderr: Arc<OutputBuffer>,
    combined: Arc<OutputBuffer>,
    /// Set the moment the child is reaped
    reaped: Arc<OnceLock<ExitStatus>>,
    /// Published once the output pipes have drained as well
    exit: watch::Receiver<Option<ExitStatus>>,
    killed: AtomicBool,
    spawned_at: Instant,
}

impl ManagedProcess {
    /// Spawn the configured command with piped output and track it in `registry`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(config: &ServiceConfig, registry: Arc<ProcessRegistry>) -> FixtureResult<Arc<Self>> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| FixtureError::SpawnFailed {
            service: config.name.clone(),
            source,
        })?;
        let spawned_at = Instant::now();

        let pid = child.id().ok_or_else(|| FixtureError::SpawnFailed {
            service: config.name.clone(),
            source: std::io::Error::other("process exited before its pid could be read"),
        })?;

        let stdout = Arc::new(OutputBuffer::default());
        let stderr = Arc::new(OutputBuffer::default());
        let combined = Arc::new(OutputBuffer::default());

        let mut readers = Vec::with_capacity(2);
        if let Some(pipe) = child.stdout.take() {
            readers.push(tokio::spawn(capture(pipe, stdout.clone(), combined.clone())));
        }
        if let Some(pipe) = child.stderr.take() {
            readers.push(tokio::spawn(capture(pipe, stderr.clone(), combined.clone())));
        }

        let (exit_tx, exit_rx) = watch::channel(None);
        let reaped = Arc::new(OnceLock::new());

        registry.register(pid, &config.name);
        let entry = RegistryEntry { registry, pid };
        tokio::spawn(watch_exit(
            child,
            readers,
            reaped.clone(),
            exit_tx,
            entry,
            config.name.clone(),
        ));

        debug!("🏭 Spawned '{}' (PID: {}): {}", config.name, pid, config.command_line());

        Ok(Arc::new(Self {
            name: config.name.clone(),
            pid,
            command: config.command.clone(),
            args: config.args.clone(),
            working_dir: config.working_dir.clone(),
            env: config.env.clone(),
            stdout,
            stderr,
            combined,
            reaped,
            exit: exit_rx,
            killed: AtomicBool::new(false),
            spawned_at,
        }))
    }

    /// Service name from the configuration
    pub fn name(&self) -> &str {
        &self.name
    }

    /// OS process id
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Program that was spawned
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Arguments it was spawned with
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Working directory override, if any
    pub fn working_dir(&self) -> Option<&PathBuf> {
        self.working_dir.as_ref()
    }

    /// Environment overrides it was spawned with
    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// When the spawn returned; startup time is measured from here
    pub fn spawned_at(&self) -> Instant {
        self.spawned_at
    }

    /// Everything written to stdout so far
    pub fn stdout(&self) -> String {
        self.stdout.contents()
    }

    /// Everything written to stderr so far
    pub fn stderr(&self) -> String {
        self.stderr.contents()
    }

    /// Both streams, interleaved in arrival order
    pub fn output(&self) -> String {
        self.combined.contents()
    }

    /// Last `OUTPUT_TAIL_CHARS` characters of combined output
    pub fn output_tail(&self) -> String {
        tail_chars(&self.output(), OUTPUT_TAIL_CHARS)
    }

    /// Whether `needle` appears in stdout or in stderr.
    ///
    /// Each stream is searched on its own so interleaved writes from the other
    /// stream cannot split a match.
    pub fn output_contains(&self, needle: &str) -> bool {
        self.stdout().contains(needle) || self.stderr().contains(needle)
    }

    /// Exit status, available as soon as the child has been reaped
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.reaped.get().copied()
    }

    /// Not force-killed and not yet exited
    pub fn is_alive(&self) -> bool {
        !self.killed.load(Ordering::SeqCst) && self.exit_status().is_none()
    }

    /// Resolve once the process has been reaped and its output drained
    pub async fn wait_for_exit(&self) -> ExitStatus {
        let mut exit = self.exit.clone();
        match exit.wait_for(Option::is_some).await {
            Ok(status) => (*status).unwrap_or_default(),
            // Watcher torn down with its runtime; the child was killed on drop
            Err(_) => ExitStatus::default(),
        }
    }

    /// Send the graceful termination signal; a no-op once the child is reaped
    pub fn terminate(&self) -> FixtureResult<()> {
        if self.exit_status().is_some() {
            return Ok(());
        }
        signals::terminate(self.pid).map_err(|source| self.signal_error(source))
    }

    /// Send the forceful termination signal; a no-op once the child is reaped
    pub fn force_kill(&self) -> FixtureResult<()> {
        if self.exit_status().is_some() {
            return Ok(());
        }
        signals::force_kill(self.pid).map_err(|source| self.signal_error(source))?;
        self.killed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn signal_error(&self, source: std::io::Error) -> FixtureError {
        FixtureError::SignalFailed {
            service: self.name.clone(),
            pid: self.pid,
            source,
        }
    }
}

/// Removes the registry entry when the watcher finishes or is dropped
struct RegistryEntry {
    registry: Arc<ProcessRegistry>,
    pid: u32,
}

impl Drop for RegistryEntry {
    fn drop(&mut self) {
        self.registry.unregister(self.pid);
    }
}

async fn capture<R: AsyncRead + Unpin>(mut pipe: R, own: Arc<OutputBuffer>, combined: Arc<OutputBuffer>) {
    let mut buf = [0u8; 4096];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                own.append(&buf[..n]);
                combined.append(&buf[..n]);
            }
        }
    }
}

async fn watch_exit(
    mut child: Child,
    readers: Vec<JoinHandle<()>>,
    reaped: Arc<OnceLock<ExitStatus>>,
    exit_tx: watch::Sender<Option<ExitStatus>>,
    entry: RegistryEntry,
    name: String,
) {
    let status = match child.wait().await {
        Ok(status) => ExitStatus::from(status),
        Err(e) => {
            warn!("⚠️ Failed to wait on '{}' (PID: {}): {}", name, entry.pid, e);
            ExitStatus::default()
        }
    };

    // The pid may be reused from here on: stop signalling and tracking it
    let _ = reaped.set(status);
    debug!("🏁 '{}' (PID: {}) exited: {}", name, entry.pid, status);
    drop(entry);

    // Grandchildren may keep the pipes open, so the drain is bounded
    let _ = tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, futures_util::future::join_all(readers)).await;
    let _ = exit_tx.send(Some(status));
}

/// Last `limit` characters of `text`, respecting char boundaries
pub(crate) fn tail_chars(text: &str, limit: usize) -> String {
    let count = text.chars().count();
    if count <= limit {
        return text.to_string();
    }
    text.chars().skip(count - limit).collect()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;

    fn shell(name: &str, script: &str) -> ServiceConfig {
        ServiceConfig::builder(name, "sh")
            .args(["-c", script])
            .ready_on_marker("READY")
            .build()
    }

    #[test]
    fn test_tail_chars() {
        assert_eq!(tail_chars("abc", 5), "abc");
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("ééééé", 2), "éé");
    }

    #[test]
    fn test_exit_status_display() {
        let code = ExitStatus { code: Some(3), signal: None };
        let signal = ExitStatus { code: None, signal: Some(9) };
        assert_eq!(code.to_string(), "exit code 3");
        assert_eq!(signal.to_string(), "terminated by signal 9");
        assert_eq!(ExitStatus::default().to_string(), "unknown exit status");
    }

    #[tokio::test]
    async fn test_captures_both_streams_and_exit_code() {
        let registry = Arc::new(ProcessRegistry::new());
        let process = ManagedProcess::spawn(&shell("echo", "echo out; echo err 1>&2; exit 3"), registry.clone()).unwrap();

        let status = process.wait_for_exit().await;

        assert_eq!(status.code, Some(3));
        assert_eq!(process.stdout(), "out\n");
        assert_eq!(process.stderr(), "err\n");
        assert!(process.output().contains("out"));
        assert!(process.output().contains("err"));
        assert!(!process.is_alive());
        assert!(!registry.contains(process.pid()));
    }

    #[tokio::test]
    async fn test_env_and_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig::builder("env", "sh")
            .args(["-c", "echo \"$FIXTURE_GREETING\"; pwd"])
            .env("FIXTURE_GREETING", "hello")
            .working_dir(dir.path())
            .ready_on_marker("hello")
            .build();
        let process = ManagedProcess::spawn(&config, Arc::new(ProcessRegistry::new())).unwrap();

        process.wait_for_exit().await;

        let stdout = process.stdout();
        assert!(stdout.starts_with("hello\n"));
        let dir_name = dir.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(stdout.contains(&dir_name));
        assert_eq!(process.env().get("FIXTURE_GREETING").map(String::as_str), Some("hello"));
    }

    #[tokio::test]
    async fn test_registered_while_running() {
        let registry = Arc::new(ProcessRegistry::new());
        let process = ManagedProcess::spawn(&shell("sleeper", "exec sleep 30"), registry.clone()).unwrap();

        assert!(process.is_alive());
        assert!(registry.contains(process.pid()));

        process.force_kill().unwrap();
        assert!(!process.is_alive());

        let status = process.wait_for_exit().await;
        assert_eq!(status.signal, Some(9));
        assert!(!registry.contains(process.pid()));
    }

    #[tokio::test]
    async fn test_exit_visible_before_output_drains() {
        let registry = Arc::new(ProcessRegistry::new());
        // The backgrounded sleep inherits the pipes and holds them open
        let process = ManagedProcess::spawn(&shell("forking", "sleep 1 & exit 3"), registry.clone()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while process.exit_status().is_none() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(process.exit_status().and_then(|s| s.code), Some(3));
        assert!(!process.is_alive());
        assert!(!registry.contains(process.pid()));
        // Signalling a reaped pid is skipped entirely
        assert!(process.force_kill().is_ok());
        assert!(process.terminate().is_ok());
        // The drain is still running
        assert!(
            tokio::time::timeout(Duration::from_millis(50), process.wait_for_exit())
                .await
                .is_err()
        );

        assert_eq!(process.wait_for_exit().await.code, Some(3));
    }

    #[tokio::test]
    async fn test_output_contains_searches_streams_separately() {
        let process = ManagedProcess::spawn(
            &shell("split", "printf REA; sleep 0.1; printf x 1>&2; sleep 0.1; printf 'DY\\n'"),
            Arc::new(ProcessRegistry::new()),
        )
        .unwrap();

        process.wait_for_exit().await;

        assert_eq!(process.stdout(), "READY\n");
        assert!(!process.output().contains("READY"));
        assert!(process.output_contains("READY"));
        assert!(process.output_contains("x"));
        assert!(!process.output_contains("READYx"));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let config = ServiceConfig::builder("missing", "/definitely/not/a/binary")
            .ready_on_marker("READY")
            .build();
        let err = ManagedProcess::spawn(&config, Arc::new(ProcessRegistry::new())).unwrap_err();
        assert!(matches!(err, FixtureError::SpawnFailed { ref service, .. } if service == "missing"));
    }
}
