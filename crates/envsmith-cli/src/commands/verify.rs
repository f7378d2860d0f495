//! `envsmith verify` - check installed components against the catalogue.

use clap::Args;
use envsmith_downloader::DownloadManager;
use envsmith_ledger::{OperationKind, OperationLedger, OperationProgress};
use envsmith_registry::{NpmBackend, PipBackend, Registry};
use envsmith_resolver::GraphAnalyzer;
use owo_colors::OwoColorize;
use std::path::Path;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::exit::{CliError, EXIT_BAD_INPUT, EXIT_FAILURE};

/// Arguments for `verify`.
#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// Verify only this component
    #[arg(long)]
    pub component: Option<String>,

    /// Also cross-check versions against a package manager (npm or pip)
    #[arg(long)]
    pub package_manager: Option<String>,
}

/// Run the command.
pub async fn run(
    args: &VerifyArgs,
    catalog_path: &Path,
    ledger: &OperationLedger,
) -> anyhow::Result<()> {
    let catalog = Catalog::load(catalog_path)?;
    let manager = DownloadManager::with_defaults()?;

    // Dependency satisfaction over the installed set.
    let analyzer = GraphAnalyzer::new();
    analyzer.register_components(catalog.components.iter().cloned());
    let installed: Vec<String> = catalog
        .components
        .iter()
        .filter(|c| c.is_installed)
        .filter(|c| args.component.as_deref().is_none_or(|only| only == c.name))
        .map(|c| c.name.clone())
        .collect();

    if installed.is_empty() {
        println!("nothing to verify");
        return Ok(());
    }

    let analysis = analyzer.analyze_components(&installed);
    println!(
        "dependency satisfaction: {:.1}% ({} conflicts, {} cycles)",
        analysis.satisfaction_rate(),
        analysis.conflicts_found,
        analysis.cycles_found,
    );

    // Artifact integrity for components with a recorded install path.
    let mut failures = 0usize;
    let mut checked = 0usize;
    for component in catalog
        .components
        .iter()
        .filter(|c| installed.contains(&c.name))
    {
        let (Some(artifact), Some(path)) = (&component.artifact, &component.install_path) else {
            continue;
        };
        if !path.is_file() {
            continue;
        }
        checked += 1;

        let ok = manager.verify_existing_file(path, &artifact.sha256);
        if ok {
            println!("  {} {}", "ok".green(), component.name);
        } else {
            failures += 1;
            println!("  {} {} (hash mismatch)", "BAD".red().bold(), component.name);
        }
    }

    // Optional cross-check against an external package manager.
    if let Some(ref manager_name) = args.package_manager {
        let registry = match manager_name.as_str() {
            "npm" => Registry::new(Arc::new(NpmBackend::new())),
            "pip" => Registry::new(Arc::new(PipBackend::new())),
            other => {
                return Err(CliError::exit(
                    EXIT_BAD_INPUT,
                    anyhow::anyhow!("unsupported package manager '{other}'"),
                ));
            }
        };

        if registry.is_available().await {
            for name in &installed {
                let versions = registry.available_versions(name).await;
                if versions.is_empty() {
                    println!("  {} {name}: no published versions found", "?".dimmed());
                    continue;
                }
                let constraint = catalog
                    .find(name)
                    .and_then(|c| c.installed_version.as_ref())
                    .map(|v| format!(">={v}"));
                let compatible = match constraint {
                    Some(constraint) => {
                        registry
                            .find_compatible_version(name, &[constraint])
                            .await
                    }
                    None => versions.first().cloned(),
                };
                match compatible {
                    Some(version) => {
                        println!("  {} {name}: {version} available via {manager_name}", "ok".green());
                    }
                    None => println!(
                        "  {} {name}: no {manager_name} version satisfies the installed baseline",
                        "!".yellow()
                    ),
                }
            }
        } else {
            println!("{manager_name} is not available on this system");
        }
    }

    let mut progress =
        OperationProgress::begin("verify", OperationKind::Verification, "verify environment");
    progress.details.push(format!("{checked} artifacts checked"));
    if failures == 0 && !analysis.has_critical_issues() {
        progress.is_completed = true;
        progress.progress_percent = 100.0;
    } else {
        progress.errors.push(format!("{failures} artifact failures"));
    }
    ledger.track(&progress);

    if failures > 0 || analysis.has_critical_issues() {
        return Err(CliError::exit(
            EXIT_FAILURE,
            anyhow::anyhow!("verification found problems"),
        ));
    }
    println!("{}", "environment verified".green().bold());
    Ok(())
}
