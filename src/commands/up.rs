// ABOUTME: Up command implementation.
// ABOUTME: Runs a single reconcile pass under the supervisor lock.

use super::connection::{acquire_lock, build_supervisor, release_lock};
use nestkeeper::config::Config;
use nestkeeper::diagnostics::Diagnostics;
use nestkeeper::error::{Error, Result};
use nestkeeper::output::Output;

pub async fn up(config: Config, force: bool, mut output: Output) -> Result<()> {
    output.start_timer();
    let mut diag = Diagnostics::default();

    let supervisor = build_supervisor(&config, &output).await?;
    let lock = acquire_lock(&config, force, &output)?;

    output.progress("  → Reconciling...");
    let result = supervisor.reconcile_once().await;
    release_lock(lock, &mut diag);
    let summary = result?;

    for action in &summary.performed {
        output.progress(&format!("  ✓ {action}"));
    }
    for action in &summary.deferred {
        output.progress(&format!("  … {action} (waiting for back-off)"));
    }
    for failure in &summary.failures {
        output.error(&format!("{}: {}", failure.action, failure.error));
    }
    diag.cleanup_failures(&summary.orphans);

    output.report(&supervisor.report());
    output.diagnostics(&diag);

    if !summary.failures.is_empty() {
        return Err(Error::ActionsFailed(summary.failures.len()));
    }
    if summary.is_converged() {
        output.success("Converged");
    } else {
        output.success("Reconcile pass finished; run again or use `supervise` to converge");
    }
    Ok(())
}
