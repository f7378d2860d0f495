//! CLI argument definitions and command modules.

pub mod cleanup;
pub mod export_history;
pub mod install;
pub mod list;
pub mod verify;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Envsmith - developer-environment provisioning core
#[derive(Parser, Debug)]
#[command(name = "envsmith")]
#[command(author = "Envsmith Contributors")]
#[command(version)]
#[command(about = "Resolve, fetch and place developer-environment components", long_about = None)]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Do not output any message
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to the component catalogue
    #[arg(long, global = true, default_value = "catalog.json")]
    pub catalog: PathBuf,

    /// Path to the operation history database
    #[arg(long, global = true)]
    pub history_db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the components the catalogue knows about
    List(list::ListArgs),
    /// Resolve, download and install one or more components
    Install(install::InstallArgs),
    /// Verify installed components against the catalogue
    Verify(verify::VerifyArgs),
    /// Remove stale temporary files and prune old history
    Cleanup(cleanup::CleanupArgs),
    /// Export operation history for troubleshooting
    ExportHistory(export_history::ExportArgs),
}
