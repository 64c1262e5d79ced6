//! sync-configs: apply one natural-language edit to a fleet of plugin
//! configuration repositories.
//!
//! # Usage
//!
//! ```text
//! sync-configs [URLS...] [--instruction TEXT] [--push] [--dry-run] [--branch NAME]
//! sync-configs targets [URLS...] [--json]
//! sync-configs cleanup [URLS...] [--dry-run]
//! ```
//!
//! Exit status: 0 when every target succeeded, 1 when any target failed,
//! 2 on a configuration error detected before any network activity.

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use commands::{cleanup::CleanupArgs, run::RunArgs, targets::TargetsArgs};
use confsync_core::ConfigError;
use confsync_sync::SyncError;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "sync-configs",
    version,
    about = "Apply one instruction to every plugin configuration repository",
    long_about = None,
    args_conflicts_with_subcommands = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the resolved targets without touching git or the network.
    Targets(TargetsArgs),

    /// Delete stale sync-configs-* topic branches.
    Cleanup(CleanupArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    match dispatch(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            if is_preflight(&err) {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn dispatch(cli: Cli) -> Result<ExitCode> {
    // Listing is pure and needs no runtime.
    if let Some(Commands::Targets(args)) = &cli.command {
        return args.run();
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        match cli.command {
            Some(Commands::Cleanup(args)) => args.run().await,
            Some(Commands::Targets(args)) => args.run(),
            None => cli.run.run().await,
        }
    })
}

/// Configuration errors anywhere in the chain map to exit status 2.
fn is_preflight(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause.is::<ConfigError>()
            || matches!(
                cause.downcast_ref::<SyncError>(),
                Some(SyncError::Configuration(_))
            )
    })
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
