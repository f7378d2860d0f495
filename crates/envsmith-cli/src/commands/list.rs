//! `envsmith list` - show catalogue contents.

use clap::Args;
use owo_colors::OwoColorize;
use std::path::Path;

use crate::catalog::Catalog;

/// Arguments for `list`.
#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Show only installed components
    #[arg(long)]
    pub installed: bool,
}

/// Run the command.
pub fn run(args: &ListArgs, catalog_path: &Path) -> anyhow::Result<()> {
    let catalog = Catalog::load(catalog_path)?;

    let mut shown = 0usize;
    for component in &catalog.components {
        if args.installed && !component.is_installed {
            continue;
        }
        shown += 1;

        let version = component
            .version
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string);
        let installed = if component.is_installed {
            component
                .installed_version
                .as_ref()
                .map_or_else(|| "installed".to_string(), |v| format!("installed {v}"))
        } else {
            "not installed".to_string()
        };

        println!(
            "{:<24} {:<12} {:<10} {:<10} {}",
            component.name.bold(),
            version,
            component.component_type,
            component.priority,
            installed.dimmed(),
        );
    }

    println!("\n{shown} components");
    Ok(())
}
