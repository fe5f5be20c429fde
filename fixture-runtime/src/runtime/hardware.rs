//! Hardware precondition probes

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::traits::HardwareProbe;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Asks `nvidia-smi` to list GPUs
#[derive(Debug, Clone)]
pub struct NvidiaSmiProbe {
    program: String,
}

impl NvidiaSmiProbe {
    /// Probe using `nvidia-smi` from `PATH`
    pub fn new() -> Self {
        Self::with_program("nvidia-smi")
    }

    /// Use a different diagnostic binary (it must accept `-L`)
    pub fn with_program<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for NvidiaSmiProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HardwareProbe for NvidiaSmiProbe {
    async fn gpu_available(&self) -> bool {
        let probe = Command::new(&self.program)
            .arg("-L")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(PROBE_TIMEOUT, probe).await {
            Ok(Ok(output)) => {
                let found = output.status.success() && !output.stdout.is_empty();
                debug!("🔍 {} -L: success={}, gpu={}", self.program, output.status.success(), found);
                found
            }
            Ok(Err(e)) => {
                debug!("🔍 {} not runnable: {}", self.program, e);
                false
            }
            Err(_) => {
                debug!("🔍 {} timed out after {:?}", self.program, PROBE_TIMEOUT);
                false
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_tool_means_no_gpu() {
        let probe = NvidiaSmiProbe::with_program("/definitely/not/nvidia-smi");
        assert!(!probe.gpu_available().await);
    }

    #[tokio::test]
    async fn test_failing_tool_means_no_gpu() {
        let probe = NvidiaSmiProbe::with_program("false");
        assert!(!probe.gpu_available().await);
    }

    #[tokio::test]
    async fn test_listing_tool_means_gpu() {
        // `echo -L` prints a non-empty line and exits 0
        let probe = NvidiaSmiProbe::with_program("echo");
        assert!(probe.gpu_available().await);
    }
}
