// ABOUTME: Entry point for the nestkeeper CLI application.
// ABOUTME: Parses arguments, sets up tracing and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use nestkeeper::config::{self, CONFIG_FILENAME, Config};
use nestkeeper::error::Result;
use nestkeeper::output::{Output, OutputMode};
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    match run(cli, mode).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let output = Output::new(mode);
            output.error(&e.to_string());
            if let Some(hint) = e.hint() {
                output.hint(hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, mode: OutputMode) -> Result<u8> {
    let dir = match cli.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let output = Output::new(mode);

    match cli.command {
        Commands::Init { name, image, force } => {
            config::init_config(&dir, name.as_deref(), image.as_deref(), force)?;
            output.success(&format!("Wrote {}", dir.join(CONFIG_FILENAME).display()));
        }
        Commands::Probe => commands::probe(load(&dir)?, output).await?,
        Commands::Up { force } => commands::up(load(&dir)?, force, output).await?,
        Commands::Supervise {
            stop_on_exit,
            force,
        } => commands::supervise(load(&dir)?, stop_on_exit, force, output).await?,
        Commands::Status => commands::status(load(&dir)?, output).await?,
        Commands::Down { force } => commands::down(load(&dir)?, force, output).await?,
        Commands::Exec { name, command } => {
            let code = commands::exec_command(load(&dir)?, &name, command, output).await?;
            // Exit codes outside 0..=255 are reported as plain failure.
            return Ok(u8::try_from(code).unwrap_or(1));
        }
        Commands::Logs { name, tail, follow } => {
            commands::logs(load(&dir)?, &name, tail, follow, output).await?
        }
        Commands::Cp { src, dst } => commands::cp(load(&dir)?, &src, &dst, output).await?,
    }
    Ok(0)
}

fn load(dir: &Path) -> Result<Config> {
    let config = Config::discover(dir)?;
    tracing::debug!(
        containers = config.containers.len(),
        dir = %dir.display(),
        "loaded configuration"
    );
    Ok(config)
}
