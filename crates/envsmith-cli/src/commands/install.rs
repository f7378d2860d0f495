//! `envsmith install` - resolve, plan, download and install components.

use clap::Args;
use envsmith_core::component::{ComponentSpec, ProvisionRequest};
use envsmith_downloader::{
    DownloadConfig, DownloadManager, DownloadProgress, DownloadRequest, DownloadStatus,
};
use envsmith_ledger::{OperationKind, OperationLedger, OperationProgress};
use envsmith_resolver::GraphAnalyzer;
use envsmith_storage::{
    DistributionPlanner, DriveEnumerator, StaticDrives, StorageAnalyzer,
};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::catalog::Catalog;
use crate::exit::{EXIT_BAD_INPUT, EXIT_FAILURE, EXIT_RETRIES_EXHAUSTED, CliError};
use crate::ports::{InstallActionExecutor, LoggingExecutor};

/// Arguments for `install`.
#[derive(Args, Debug, Clone)]
pub struct InstallArgs {
    /// Components to install
    #[arg(required = true)]
    pub components: Vec<String>,

    /// Maximum concurrent downloads
    #[arg(long, short = 'j', default_value_t = 4)]
    pub jobs: usize,

    /// Maximum retry attempts per URL
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Additional mirror URL (repeatable), applied to every artifact
    #[arg(long = "mirror")]
    pub mirrors: Vec<String>,

    /// Staging directory for downloads
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,

    /// Install what fits instead of failing when space is short
    #[arg(long)]
    pub allow_partial: bool,
}

/// Run the command.
pub async fn run(
    args: &InstallArgs,
    catalog_path: &Path,
    ledger: &OperationLedger,
) -> anyhow::Result<()> {
    let catalog = Catalog::load(catalog_path).map_err(|e| CliError::exit(EXIT_BAD_INPUT, e))?;

    let mut request = ProvisionRequest::new(args.components.clone());
    request.options.allow_partial = args.allow_partial;

    for name in &request.components {
        if catalog.find(name).is_none() {
            return Err(CliError::exit(
                EXIT_BAD_INPUT,
                anyhow::anyhow!("unknown component '{name}'"),
            ));
        }
    }

    // Phase 1: dependency analysis.
    let analyzer = GraphAnalyzer::new();
    analyzer.register_components(catalog.components.iter().cloned());
    let analysis = analyzer.analyze_components(&request.components);

    track_phase(
        ledger,
        "analysis",
        OperationKind::Analysis,
        "dependency analysis",
        analysis.conflicts_found == 0 && analysis.cycles_found == 0,
        analysis
            .graph
            .conflicts
            .iter()
            .map(|c| format!("version conflict on {}", c.component))
            .chain(
                analysis
                    .graph
                    .cycles
                    .iter()
                    .map(|c| format!("circular dependency: {}", c.description())),
            )
            .collect(),
    );

    if analysis.has_critical_issues() {
        eprintln!("{}", "dependency analysis found blocking issues:".red().bold());
        for conflict in &analysis.graph.conflicts {
            eprintln!(
                "  conflict on {}: required as [{}] by {}",
                conflict.component.bold(),
                conflict.required_versions.join(", "),
                conflict.conflicting_dependents.join(", ")
            );
            if let Some(ref suggestion) = conflict.suggested_resolution {
                eprintln!("    suggestion: {suggestion}");
            }
        }
        for cycle in &analysis.graph.cycles {
            eprintln!("  cycle: {}", cycle.description());
        }
        for path in &analysis.resolution_paths {
            eprintln!(
                "  plan (~{} min, {:.0}% confidence): {}",
                path.estimated_minutes,
                path.success_probability * 100.0,
                path.steps.first().map_or("", String::as_str)
            );
        }
        return Err(CliError::exit(
            EXIT_FAILURE,
            anyhow::anyhow!("resolution found blocking issues"),
        ));
    }

    // Everything reachable from the request, in the catalogue's order.
    let selected: Vec<ComponentSpec> = catalog
        .components
        .iter()
        .filter(|c| {
            request.components.contains(&c.name)
                || request
                    .components
                    .iter()
                    .any(|root| analysis.graph.transitive_deps_of(root).contains(&c.name))
        })
        .cloned()
        .collect();

    // Phase 2: storage planning.
    let enumerator: Arc<dyn DriveEnumerator> = if catalog.storage.drives.is_empty() {
        default_enumerator()
    } else {
        Arc::new(StaticDrives::new(catalog.storage.drives.clone()))
    };
    let storage = StorageAnalyzer::new(enumerator);
    let drives = storage.analyze_system_storage();
    let requirements = storage.calculate_space_requirements(&selected);

    let to_install: Vec<ComponentSpec> = if request.options.allow_partial {
        let budget: u64 = drives.iter().map(|d| d.available_bytes).sum();
        let selective = storage.selective_installation(&requirements, budget);
        for recommendation in &selective.recommendations {
            eprintln!("{} {recommendation}", "note:".yellow());
        }
        selected
            .iter()
            .filter(|c| selective.installable.contains(&c.name))
            .cloned()
            .collect()
    } else {
        selected
    };

    let plan = DistributionPlanner::new().distribute(&to_install, &drives);
    track_phase(
        ledger,
        "storage-plan",
        OperationKind::Analysis,
        "storage planning",
        plan.distribution_feasible,
        plan.warnings.clone(),
    );

    if !plan.distribution_feasible {
        eprintln!("{}", "storage planning failed:".red().bold());
        for warning in &plan.warnings {
            eprintln!("  {warning}");
        }
        let installed: Vec<ComponentSpec> = catalog
            .components
            .iter()
            .filter(|c| c.is_installed)
            .cloned()
            .collect();
        let deficit = requirements.total_required_space;
        let removals = DistributionPlanner::new().suggest_removals(&installed, deficit);
        if !removals.recommended.is_empty() {
            eprintln!("  consider removing: {}", removals.recommended.join(", "));
        }
        return Err(CliError::exit(
            EXIT_FAILURE,
            anyhow::anyhow!("insufficient storage for the requested components"),
        ));
    }

    // Phase 3: verified parallel download.
    let mut config = DownloadConfig::builder()
        .max_concurrent(args.jobs)
        .max_retries(args.max_retries)
        .build();
    if let Some(ref staging) = args.staging_dir {
        config.staging_dir = staging.clone();
    }
    let manager = DownloadManager::new(config)?;

    let requests: Vec<DownloadRequest> = to_install
        .iter()
        .filter_map(|component| {
            let artifact = component.artifact.as_ref()?;
            let mut mirrors: Vec<String> =
                artifact.mirrors.iter().map(ToString::to_string).collect();
            mirrors.extend(args.mirrors.iter().cloned());
            Some(DownloadRequest {
                url: artifact.url.to_string(),
                destination: None,
                expected_sha256: artifact.sha256.clone(),
                description: Some(component.name.clone()),
                mirrors,
            })
        })
        .collect();

    let mut artifact_paths: HashMap<String, PathBuf> = HashMap::new();
    if !requests.is_empty() {
        println!(
            "downloading {} artifacts ({} max in flight)...",
            requests.len(),
            args.jobs
        );

        let url_to_component: HashMap<String, String> = to_install
            .iter()
            .filter_map(|c| {
                c.artifact
                    .as_ref()
                    .map(|a| (a.url.to_string(), c.name.clone()))
            })
            .collect();

        let batch = manager
            .download_parallel(requests, Some(progress_bars(&url_to_component)))
            .await;

        for result in &batch.results {
            let component = url_to_component
                .get(&result.url)
                .cloned()
                .unwrap_or_else(|| result.url.clone());
            let mut progress =
                OperationProgress::begin(format!("download-{component}"), OperationKind::Download, format!("download {component}"));
            progress.component_name = Some(component.clone());
            progress.is_completed = result.status == DownloadStatus::Completed;
            if let Some(ref error) = result.error {
                progress.errors.push(error.clone());
            }
            progress.progress_percent = if progress.is_completed { 100.0 } else { 0.0 };
            ledger.track(&progress);

            if result.status == DownloadStatus::Completed {
                artifact_paths.insert(component, result.path.clone());
            }
        }

        let summary = &batch.integrity_summary;
        println!(
            "downloads: {} ok, {} failed ({:.1}% success, {:.1} MiB/s avg)",
            summary.successful.green(),
            summary.failed + summary.hash_failed,
            summary.success_rate,
            summary.average_speed_mbps,
        );

        if batch.successful == 0 && batch.failed > 0 {
            return Err(CliError::exit(
                EXIT_RETRIES_EXHAUSTED,
                anyhow::anyhow!("every download failed after exhausting retries"),
            ));
        }
        if batch.failed > 0 {
            for item in &summary.failed_items {
                eprintln!(
                    "  {} {}: {}",
                    "failed".red(),
                    item.url,
                    item.error.as_deref().unwrap_or("unknown error")
                );
            }
            return Err(CliError::exit(
                EXIT_FAILURE,
                anyhow::anyhow!("{} downloads failed", batch.failed),
            ));
        }
    }

    // Phase 4: hand verified artifacts to the install executor.
    let executor = LoggingExecutor;
    for placement in &plan.plans {
        let artifact = artifact_paths.get(&placement.component).map(PathBuf::as_path);
        executor.execute(placement, artifact)?;

        let mut progress = OperationProgress::begin(
            format!("install-{}", placement.component),
            OperationKind::Install,
            format!("install {}", placement.component),
        );
        progress.component_name = Some(placement.component.clone());
        progress.description = placement.reason.clone();
        progress.is_completed = true;
        progress.progress_percent = 100.0;
        ledger.track(&progress);

        info!(component = %placement.component, drive = %placement.drive, "component installed");
    }

    println!(
        "{} {} components installed",
        "done:".green().bold(),
        plan.plans.len()
    );
    Ok(())
}

fn default_enumerator() -> Arc<dyn DriveEnumerator> {
    #[cfg(unix)]
    {
        Arc::new(envsmith_storage::StatvfsDrives::root_only())
    }
    #[cfg(not(unix))]
    {
        Arc::new(StaticDrives::new(Vec::new()))
    }
}

/// Bridge engine progress callbacks onto indicatif bars.
fn progress_bars(
    url_to_component: &HashMap<String, String>,
) -> envsmith_downloader::ProgressCallback {
    let multi = MultiProgress::new();
    let style = ProgressStyle::default_bar()
        .template("  {msg:<24} [{bar:30.green/dim}] {bytes:>10}/{total_bytes:<10}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    let names = url_to_component.clone();
    let bars: Mutex<HashMap<String, ProgressBar>> = Mutex::new(HashMap::new());

    Arc::new(move |progress: &DownloadProgress| {
        let mut bars = bars.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let bar = bars.entry(progress.url.clone()).or_insert_with(|| {
            let bar = multi.add(ProgressBar::new(progress.total_size.max(1)));
            bar.set_style(style.clone());
            bar.set_message(
                names
                    .get(&progress.url)
                    .cloned()
                    .unwrap_or_else(|| progress.url.clone()),
            );
            bar
        });

        if progress.total_size > 0 {
            bar.set_length(progress.total_size);
        }
        bar.set_position(progress.downloaded_size);
        if progress.status.is_terminal() {
            bar.finish_and_clear();
        }
    })
}

fn track_phase(
    ledger: &OperationLedger,
    id: &str,
    kind: OperationKind,
    title: &str,
    succeeded: bool,
    warnings: Vec<String>,
) {
    let mut progress = OperationProgress::begin(id, kind, title);
    progress.warnings = warnings;
    if succeeded {
        progress.is_completed = true;
        progress.progress_percent = 100.0;
    } else {
        progress.errors.push(format!("{title} reported issues"));
    }
    ledger.track(&progress);
}
