// ABOUTME: Status command implementation.
// ABOUTME: Observes managed containers and prints their health without changing anything.

use super::connection::build_supervisor;
use nestkeeper::config::Config;
use nestkeeper::error::Result;
use nestkeeper::output::Output;

pub async fn status(config: Config, output: Output) -> Result<()> {
    let supervisor = build_supervisor(&config, &output).await?;
    let report = supervisor.refresh().await?;
    output.report(&report);
    Ok(())
}
