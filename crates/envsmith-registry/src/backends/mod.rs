//! Subprocess-backed package-manager ports.

mod npm;
mod pip;

pub use npm::NpmBackend;
pub use pip::PipBackend;

use std::time::Duration;
use tokio::process::Command;
use tracing::trace;

/// Timeout for availability probes; metadata calls get the registry's
/// longer deadline on top.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Run a command and return its stdout on success.
///
/// Any failure - missing executable, non-zero exit, timeout, bad UTF-8 -
/// yields `None`; backends treat all of them as "no data".
async fn run_command(program: &str, args: &[&str], timeout: Duration) -> Option<String> {
    trace!(program, ?args, "running package-manager command");

    let output = tokio::time::timeout(
        timeout,
        Command::new(program).args(args).kill_on_drop(true).output(),
    )
    .await
    .ok()?
    .ok()?;

    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()
}

/// Probe a manager by running `<cmd> --version`.
async fn probe_command(program: &str) -> bool {
    run_command(program, &["--version"], PROBE_TIMEOUT)
        .await
        .is_some()
}
