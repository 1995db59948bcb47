// ABOUTME: Exec command implementation.
// ABOUTME: Runs a command inside a running managed container and relays its output.

use super::connection::{connect_to_runtime, ensure_configured, find_container};
use nestkeeper::config::Config;
use nestkeeper::error::{Error, Result};
use nestkeeper::output::Output;
use nestkeeper::shell::{ShellCommand, run_shell};

/// Execute `command` in managed container `name`; returns its exit code.
pub async fn exec_command(
    config: Config,
    name: &str,
    command: Vec<String>,
    output: Output,
) -> Result<i32> {
    ensure_configured(&config, name)?;
    let connection = connect_to_runtime(&config, &output).await?;

    let container = find_container(&connection.runtime, name)
        .await?
        .filter(|c| c.state.is_running())
        .ok_or_else(|| Error::NotRunning(name.to_string()))?;

    let cmd = ShellCommand::argv(command.as_slice()).keep_final_newline();
    let result = run_shell(connection.runtime.as_ref(), &container.id, &cmd).await?;

    print!("{}", result.stdout);
    eprint!("{}", result.stderr);
    Ok(i32::try_from(result.exit_code).unwrap_or(1))
}
