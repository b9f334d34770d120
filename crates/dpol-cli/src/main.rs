//! # drivepolicy CLI entry point
//!
//! Parses command-line arguments, initialises tracing, and runs the audit.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dpol_cli::audit::{run_audit, AuditArgs};

/// Drive folder sharing policy checker.
///
/// Walks every folder below the root, works out which domains each item may
/// be shared with from the folder policy file, and reports (or with --fix,
/// removes) permissions granted to anyone else.
#[derive(Parser, Debug)]
#[command(name = "drivepolicy", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,

    #[command(flatten)]
    audit: AuditArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v when set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "drivepolicy starting");

    match run_audit(&cli.audit).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(2)
        }
    }
}
