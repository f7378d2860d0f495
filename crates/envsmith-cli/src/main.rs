//! Envsmith CLI - developer-environment provisioning core.
//!
//! The CLI wires the engines together: catalogue in, dependency
//! resolution, storage planning, verified downloads, the install
//! executor port, and the operation ledger recording every phase.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod catalog;
mod commands;
mod exit;
mod ports;

use clap::Parser;
use commands::{Cli, Commands};
use directories::ProjectDirs;
use envsmith_ledger::{OperationLedger, SqliteStore};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 if cli.quiet => Level::ERROR,
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let ledger = match open_ledger(cli.history_db.clone()) {
        Ok(ledger) => ledger,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: failed to create runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run_command(&cli, &ledger));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(exit::exit_code_for(&e))
        }
    }
}

async fn run_command(cli: &Cli, ledger: &OperationLedger) -> anyhow::Result<()> {
    match &cli.command {
        Commands::List(args) => commands::list::run(args, &cli.catalog),
        Commands::Install(args) => commands::install::run(args, &cli.catalog, ledger).await,
        Commands::Verify(args) => commands::verify::run(args, &cli.catalog, ledger).await,
        Commands::Cleanup(args) => commands::cleanup::run(args, ledger),
        Commands::ExportHistory(args) => commands::export_history::run(args, ledger),
    }
}

fn open_ledger(explicit: Option<PathBuf>) -> anyhow::Result<OperationLedger> {
    let path = explicit.unwrap_or_else(|| {
        ProjectDirs::from("", "", "envsmith").map_or_else(
            || PathBuf::from("envsmith-history.db"),
            |dirs| dirs.data_dir().join("history.db"),
        )
    });
    let store = SqliteStore::open(&path)?;
    Ok(OperationLedger::with_defaults(store))
}
