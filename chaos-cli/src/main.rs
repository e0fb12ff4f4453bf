//! # minichaos
//!
//! Run failure injection and load generation against an in-memory cluster.
//!
//! ## Commands
//!
//! - `run`: Set up a cluster, inject failures and drive load, print a report
//! - `config`: Print the effective configuration as TOML
//!
//! ## Example
//!
//! ```bash
//! # 20 storage nodes, one failure every 5 minutes, one day of load
//! minichaos run
//!
//! # Small cluster, fail a storage node every 5-10 seconds for 2 minutes
//! minichaos run -d 3 --min-interval 5 --max-interval 10 -m 2
//!
//! # Start from a file, override the worker count, dump the result as JSON
//! minichaos run --config chaos.toml -t 8 --json
//!
//! # Write a config file to edit
//! minichaos config > chaos.toml
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`). Logs go to stderr,
//! the report to stdout.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{config, run, ConfigArgs};

/// Failure injection and load generation for storage clusters.
#[derive(Parser, Debug)]
#[command(name = "minichaos")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run failure injection and load against a mini cluster
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    Config {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { config, json } => run::run(&config, json).await,
        Commands::Config { config } => config::run(&config),
    }
}
