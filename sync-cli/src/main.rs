//! # peersync
//!
//! Command-line front end for the peersync engine.
//!
//! ## Commands
//!
//! - `replay`: Feed a recorded event log through the engine and print what
//!   would be handed to the transfer layer
//! - `hash`: Print the content hash of a file or the names hash of a folder
//! - `config`: Print the effective configuration
//!
//! ## Example
//!
//! ```bash
//! # Replay a watcher log with a shorter stability window
//! peersync --config fast.toml replay events.jsonl
//!
//! # Make every third transfer fail to watch the retries
//! peersync replay events.jsonl --fail-every 3
//!
//! # Hash a folder
//! peersync hash ~/Sync/photos
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use peersync_client::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{config, hash, replay};

/// Command-line front end for the peersync engine.
#[derive(Parser, Debug)]
#[command(name = "peersync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a JSON-lines event log against a dry-run transfer layer
    Replay {
        /// Event log, one JSON object per line
        events: PathBuf,

        /// Synchronized root the logged paths live under
        #[arg(long, default_value = "/")]
        root: PathBuf,

        /// Fail every Nth transfer call
        #[arg(long)]
        fail_every: Option<u32>,
    },

    /// Print the content hash of a file or the names hash of a folder
    Hash {
        /// File or folder to hash
        path: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    init_tracing(&config.logging.filter);

    match cli.command {
        Commands::Replay {
            events,
            root,
            fail_every,
        } => {
            replay::run(&config, &events, root, fail_every).await?;
        }
        Commands::Hash { path } => {
            hash::run(&path)?;
        }
        Commands::Config => {
            config::run(&config)?;
        }
    }

    Ok(())
}

/// Log to stderr. `RUST_LOG` wins over the configured filter.
fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
