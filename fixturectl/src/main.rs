//! Fixture Control
//!
//! Command-line front end for the fixture runtime:
//! - `up` starts a cluster file and holds it until interrupted
//! - `check` starts a cluster file, verifies health and performance bounds, and tears it down

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use fixture_runtime::ProcessRegistry;

mod commands;

#[derive(Parser)]
#[command(name = "fixturectl")]
#[command(about = "Start, hold and check clusters of external test services")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose tracing output
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Start every service in the cluster file and keep them running
    Up {
        /// Cluster file (JSON)
        file: PathBuf,

        /// Stop automatically after this many seconds
        #[arg(long)]
        hold_secs: Option<u64>,
    },

    /// Start the cluster, check health and performance bounds, then stop it
    Check {
        /// Cluster file (JSON)
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(args.verbose);

    // Services inherit our environment, including anything in .env
    if dotenv::dotenv().is_ok() {
        tracing::debug!("📄 Loaded .env file");
    }

    // Private registry: the CLI handles signals itself instead of relying on the exit hooks
    let registry = Arc::new(ProcessRegistry::new());

    let result = match args.command {
        Command::Up { file, hold_secs } => commands::up(&file, hold_secs, registry).await,
        Command::Check { file } => commands::check(&file, registry).await,
    };

    if let Err(ref e) = result {
        if let Some(interrupted) = e.downcast_ref::<commands::Interrupted>() {
            tracing::error!("❌ {}", interrupted);
            std::process::exit(interrupted.exit_code);
        }
    }
    result
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = if verbose {
        EnvFilter::new("fixturectl=debug,fixture_runtime=debug,info")
    } else {
        EnvFilter::new("fixturectl=info,fixture_runtime=info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_up_with_hold() {
        let args = Args::parse_from(["fixturectl", "up", "cluster.json", "--hold-secs", "5"]);
        match args.command {
            Command::Up { file, hold_secs } => {
                assert_eq!(file, PathBuf::from("cluster.json"));
                assert_eq!(hold_secs, Some(5));
            }
            Command::Check { .. } => panic!("expected up"),
        }
        assert!(!args.verbose);
    }

    #[test]
    fn test_parse_check_verbose() {
        let args = Args::parse_from(["fixturectl", "check", "cluster.json", "--verbose"]);
        assert!(args.verbose);
        assert!(matches!(args.command, Command::Check { .. }));
    }

    #[test]
    fn test_file_is_required() {
        assert!(Args::try_parse_from(["fixturectl", "check"]).is_err());
    }
}
