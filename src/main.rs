//! # Tree Harness CLI (`th`)
//!
//! ## Usage
//!
//! ```bash
//! th --config ./config/th.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `th load` | Bulk-load the corpus and print cache status |
//! | `th search "<query>"` | Stage-1 candidates with previews |
//! | `th get <id>` | Stage-2 detail for one document |
//! | `th serve` | Load in the background and serve the HTTP API |
//!
//! Logs go to stderr; set `RUST_LOG` to change the level (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tree_harness::{config, get, load, search, server};

/// Tree Harness: cache, index, and retrieve documents from a hierarchical
/// remote content source.
#[derive(Parser)]
#[command(
    name = "th",
    about = "Tree Harness: in-memory cache, index, and two-stage retrieval over hierarchical documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/th.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bulk-load the whole corpus and print cache status.
    ///
    /// Useful for checking credentials and measuring load time. Nothing is
    /// persisted.
    Load,

    /// Find candidate documents for a query.
    Search {
        query: String,

        /// Bulk-load the corpus first and rank locally. Without this flag
        /// candidates come from the remote search.
        #[arg(long)]
        load: bool,
    },

    /// Show full content and related documents for one document.
    Get {
        id: String,

        /// Highlight a passage relevant to this query.
        #[arg(long)]
        query: Option<String>,
    },

    /// Start the HTTP server.
    ///
    /// The cache loads in the background; requests fall back to the remote
    /// source until it is ready.
    Serve,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout is reserved for command output.
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Load => {
            load::run_load(&cfg).await?;
        }
        Commands::Search { query, load } => {
            search::run_search(&cfg, &query, load).await?;
        }
        Commands::Get { id, query } => {
            get::run_get(&cfg, &id, query.as_deref()).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
