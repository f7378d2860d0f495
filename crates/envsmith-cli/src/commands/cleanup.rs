//! `envsmith cleanup` - remove stale temp files, compress cold data and
//! prune history.

use clap::Args;
use envsmith_compress::CompressionEngine;
use envsmith_ledger::{OperationKind, OperationLedger, OperationProgress};
use envsmith_storage::{CLEANUP_MIN_AGE, DistributionPlanner, format_bytes};
use owo_colors::OwoColorize;
use std::path::PathBuf;

/// Arguments for `cleanup`.
#[derive(Args, Debug, Clone)]
pub struct CleanupArgs {
    /// Installation paths to scan (repeatable)
    #[arg(long = "path")]
    pub paths: Vec<PathBuf>,

    /// Also compress cold files under the given paths
    #[arg(long)]
    pub compress: bool,

    /// Days of operation history to keep
    #[arg(long, default_value_t = 90)]
    pub retention_days: i64,
}

/// Run the command.
pub fn run(args: &CleanupArgs, ledger: &OperationLedger) -> anyhow::Result<()> {
    let planner = DistributionPlanner::new();
    let cleanup = planner.cleanup_temp_files(&args.paths, CLEANUP_MIN_AGE, true);
    println!(
        "removed {} temporary files ({})",
        cleanup.removed_files.len(),
        format_bytes(cleanup.space_freed)
    );
    for error in &cleanup.errors {
        eprintln!("{} {error}", "warning:".yellow());
    }

    if args.compress && !args.paths.is_empty() {
        let engine = CompressionEngine::default();
        let result = engine.compress_paths(&args.paths, None);
        println!(
            "compressed {} files, saved {} (ratio {:.2})",
            result.compressed_files.len(),
            format_bytes(result.space_saved),
            result.compression_ratio,
        );
        for error in &result.errors {
            eprintln!("{} {error}", "warning:".yellow());
        }
    }

    let pruned = ledger.cleanup_old_records(args.retention_days);
    println!("pruned {pruned} history records older than {} days", args.retention_days);

    let mut progress = OperationProgress::begin("cleanup", OperationKind::Cleanup, "cleanup run");
    progress.details.push(format!(
        "{} temp files removed, {pruned} history records pruned",
        cleanup.removed_files.len()
    ));
    progress.warnings = cleanup.errors;
    progress.is_completed = true;
    progress.progress_percent = 100.0;
    ledger.track(&progress);

    Ok(())
}
