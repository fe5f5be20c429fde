//! Runtime Management
//!
//! Spawning, readiness, health, shutdown and cluster coordination of fixture processes.

pub mod cluster;
pub mod hardware;
mod hooks;
pub mod launcher;
pub mod process;
pub mod readiness;
pub mod registry;
pub mod service;
pub mod shutdown;
mod signals;

// Re-export main types
pub use cluster::Cluster;
pub use hardware::NvidiaSmiProbe;
pub use launcher::{ProcessLauncher, start_cluster, start_service};
pub use process::{ExitStatus, ManagedProcess};
pub use registry::{ProcessRegistry, RegisteredProcess};
pub use service::{ServiceHandle, ServiceStats};
pub use shutdown::{ShutdownProtocol, ShutdownState, StopOutcome};
