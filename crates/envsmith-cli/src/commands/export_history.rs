//! `envsmith export-history` - export the operation ledger.

use clap::Args;
use envsmith_ledger::{
    HistoryFilters, OperationLedger, OperationStatus, ReportFormat, export_records,
};
use std::path::PathBuf;

use crate::exit::{CliError, EXIT_BAD_INPUT, EXIT_FAILURE};

/// Arguments for `export-history`.
#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Output format: json, csv, html, xml or zip
    #[arg(long, default_value = "json")]
    pub format: String,

    /// Output path (defaults to reports/operation_history_<timestamp>)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Only records with this status
    #[arg(long)]
    pub status: Option<String>,

    /// Only records for this component
    #[arg(long)]
    pub component: Option<String>,

    /// Maximum number of records to export
    #[arg(long, default_value_t = 10_000)]
    pub limit: usize,
}

/// Run the command.
pub fn run(args: &ExportArgs, ledger: &OperationLedger) -> anyhow::Result<()> {
    let Some(format) = ReportFormat::parse(&args.format) else {
        return Err(CliError::exit(
            EXIT_BAD_INPUT,
            anyhow::anyhow!("unknown export format '{}'", args.format),
        ));
    };

    let filters = HistoryFilters {
        status: args.status.as_deref().map(OperationStatus::parse),
        component: args.component.clone(),
        ..HistoryFilters::default()
    };
    let records = ledger.get_history(args.limit, 0, Some(&filters));

    let result = export_records(&records, format, args.output.as_deref());
    if !result.success {
        return Err(CliError::exit(
            EXIT_FAILURE,
            anyhow::anyhow!(
                "export failed: {}",
                result.error.unwrap_or_else(|| "unknown error".to_string())
            ),
        ));
    }

    println!(
        "exported {} records to {}",
        result.records_exported,
        result
            .file_path
            .map_or_else(|| "?".to_string(), |p| p.display().to_string())
    );
    Ok(())
}
