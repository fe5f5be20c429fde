//! Termination signals
//!
//! Graceful is SIGTERM and forceful is SIGKILL on unix. Elsewhere both map to
//! `taskkill`, forceful adding `/F`. A process that is already gone is not an error.

use std::io;

/// Ask the process to shut down
pub(crate) fn terminate(pid: u32) -> io::Result<()> {
    imp::terminate(pid)
}

/// Kill the process immediately
pub(crate) fn force_kill(pid: u32) -> io::Result<()> {
    imp::force_kill(pid)
}

#[cfg(unix)]
mod imp {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;
    use std::io;

    pub(super) fn terminate(pid: u32) -> io::Result<()> {
        send(pid, Signal::SIGTERM)
    }

    pub(super) fn force_kill(pid: u32) -> io::Result<()> {
        send(pid, Signal::SIGKILL)
    }

    fn send(pid: u32, sig: Signal) -> io::Result<()> {
        let raw = i32::try_from(pid).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

        match signal::kill(Pid::from_raw(raw), sig) {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => {
                tracing::debug!("Process {} already gone, {:?} not sent", pid, sig);
                Ok(())
            }
            Err(e) => Err(io::Error::from(e)),
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use std::io;
    use std::process::{Command, Stdio};

    pub(super) fn terminate(pid: u32) -> io::Result<()> {
        taskkill(pid, false)
    }

    pub(super) fn force_kill(pid: u32) -> io::Result<()> {
        taskkill(pid, true)
    }

    fn taskkill(pid: u32, force: bool) -> io::Result<()> {
        let mut cmd = Command::new("taskkill");
        cmd.arg("/PID").arg(pid.to_string()).arg("/T");
        if force {
            cmd.arg("/F");
        }
        // Non-zero status usually means the process is already gone
        cmd.stdout(Stdio::null()).stderr(Stdio::null()).status().map(|_| ())
    }
}
