//! Causeway CLI.
//!
//! Runs a causally consistent ratings cluster in-process and talks to it
//! through an interactive client.
//!
//! # Quick Start
//!
//! ```bash
//! # Write a causeway.toml with the default settings
//! causeway init ./ratings
//!
//! # Start the replicas and the interactive client
//! causeway repl ./ratings
//! ```

mod client;
mod commands;
mod network;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Causeway - causally consistent replicated ratings.
#[derive(Parser)]
#[command(name = "causeway")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Write a default causeway.toml.
    Init {
        /// Directory to write causeway.toml into.
        #[arg(default_value = ".")]
        path: String,
    },

    /// Start the replicas and the interactive client.
    Repl {
        /// Directory holding causeway.toml.
        #[arg(default_value = ".")]
        path: String,

        /// Override cluster.replicas.
        #[arg(long)]
        replicas: Option<usize>,

        /// Override gossip.period_ms.
        #[arg(long)]
        gossip_ms: Option<u64>,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr so they do not interleave with client output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Init { path } => commands::init::run(&path),
        Commands::Repl {
            path,
            replicas,
            gossip_ms,
        } => commands::repl::run(&path, replicas, gossip_ms),
    }
}
