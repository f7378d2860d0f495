//! Ports wired by the CLI.
//!
//! Concrete installer runners are outside the core; the CLI ships a
//! logging executor that records what a real executor would do.

use envsmith_storage::PlacementPlan;
use std::path::Path;
use tracing::info;

/// Executes the install action for one placed component.
///
/// Invoked only after a verified download; the executor is opaque to the
/// core.
pub trait InstallActionExecutor: Send + Sync {
    /// Execute the installation described by `plan`, consuming the
    /// verified artifact at `artifact` when one exists.
    fn execute(&self, plan: &PlacementPlan, artifact: Option<&Path>) -> anyhow::Result<()>;
}

/// Default executor: logs the action and creates the target directory.
#[derive(Debug, Default)]
pub struct LoggingExecutor;

impl InstallActionExecutor for LoggingExecutor {
    fn execute(&self, plan: &PlacementPlan, artifact: Option<&Path>) -> anyhow::Result<()> {
        std::fs::create_dir_all(&plan.install_path)?;
        info!(
            component = %plan.component,
            path = %plan.install_path.display(),
            artifact = ?artifact,
            "install action executed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn logging_executor_creates_target() {
        let dir = tempfile::tempdir().unwrap();
        let plan = PlacementPlan {
            component: "git".into(),
            drive: dir.path().display().to_string(),
            install_path: dir.path().join("envsmith").join("git"),
            space_required: 0,
            reason: "test".into(),
        };

        LoggingExecutor.execute(&plan, Some(&PathBuf::from("/tmp/a.zip"))).unwrap();
        assert!(plan.install_path.exists());
    }
}
