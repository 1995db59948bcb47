// ABOUTME: Logs command implementation.
// ABOUTME: Streams a managed container's output to the terminal.

use super::connection::{connect_to_runtime, ensure_configured, find_container};
use futures::StreamExt;
use nestkeeper::config::Config;
use nestkeeper::error::{Error, Result};
use nestkeeper::output::Output;
use nestkeeper::runtime::{LogOps, LogOptions, LogStream};

pub async fn logs(
    config: Config,
    name: &str,
    tail: Option<u64>,
    follow: bool,
    output: Output,
) -> Result<()> {
    ensure_configured(&config, name)?;
    let connection = connect_to_runtime(&config, &output).await?;

    let container = find_container(&connection.runtime, name)
        .await?
        .ok_or_else(|| Error::Missing(name.to_string()))?;

    let mut opts = tail.map(LogOptions::tail).unwrap_or_default();
    if follow {
        opts = opts.following();
    }

    let mut stream = connection.runtime.container_logs(&container.id, &opts).await?;
    while let Some(line) = stream.next().await {
        let line = line?;
        match line.stream {
            LogStream::Stdout => print!("{}", line.content),
            LogStream::Stderr => eprint!("{}", line.content),
        }
    }
    Ok(())
}
