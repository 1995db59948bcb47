// ABOUTME: Down command implementation.
// ABOUTME: Removes every managed container under the supervisor lock.

use super::connection::{acquire_lock, build_supervisor, release_lock};
use nestkeeper::config::Config;
use nestkeeper::diagnostics::Diagnostics;
use nestkeeper::error::Result;
use nestkeeper::output::Output;

pub async fn down(config: Config, force: bool, mut output: Output) -> Result<()> {
    output.start_timer();
    let mut diag = Diagnostics::default();

    let supervisor = build_supervisor(&config, &output).await?;
    let lock = acquire_lock(&config, force, &output)?;

    output.progress("  → Removing managed containers...");
    let result = supervisor.remove_all().await;
    release_lock(lock, &mut diag);
    let cleanup = result?;

    for container in &cleanup.removed {
        output.progress(&format!("  ✓ removed {}", container.name));
    }
    diag.cleanup_failures(&cleanup);
    output.diagnostics(&diag);
    output.success(&format!("Removed {} container(s)", cleanup.removed.len()));
    Ok(())
}
