// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nestkeeper")]
#[command(about = "Supervise nested Docker and Podman engines inside containers")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print results and errors
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory holding nestkeeper.yml (defaults to the current directory)
    #[arg(short = 'C', long, global = true)]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a nestkeeper.yml template
    Init {
        /// Name of the first managed container
        #[arg(long)]
        name: Option<String>,

        /// Image of the first managed container
        #[arg(long)]
        image: Option<String>,

        /// Overwrite an existing nestkeeper.yml
        #[arg(long)]
        force: bool,
    },

    /// Show host capabilities and the nesting mode each container would get
    Probe,

    /// Run one reconcile pass
    Up {
        /// Break a supervisor lock held by another process
        #[arg(long)]
        force: bool,
    },

    /// Reconcile continuously until interrupted
    Supervise {
        /// Stop managed containers on exit
        #[arg(long)]
        stop_on_exit: bool,

        /// Break a supervisor lock held by another process
        #[arg(long)]
        force: bool,
    },

    /// Show the health of managed containers
    Status,

    /// Stop and remove every managed container
    Down {
        /// Break a supervisor lock held by another process
        #[arg(long)]
        force: bool,
    },

    /// Run a command inside a managed container
    Exec {
        /// Managed container name
        name: String,

        /// Command and arguments
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Show logs of a managed container
    Logs {
        /// Managed container name
        name: String,

        /// Number of lines to show from the end
        #[arg(short = 'n', long)]
        tail: Option<u64>,

        /// Keep streaming new output
        #[arg(short, long)]
        follow: bool,
    },

    /// Copy files between the host and a managed container (NAME:PATH)
    Cp {
        /// Source: host path or NAME:PATH
        src: String,

        /// Destination: host path or NAME:PATH
        dst: String,
    },
}
