//! Sybil Cluster - greedy cross-chain wallet clustering
//!
//! Typical flow:
//! 1. `sybil enrich` turns a wallet list into an activity snapshot
//! 2. `sybil cluster` groups the snapshot into consolidated clusters

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

// Use the library crate
use sybil_cluster::cli::commands;
use sybil_cluster::config::Config;

/// Sybil Cluster - find wallets acting in lockstep across chains
#[derive(Parser)]
#[command(name = "sybil")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "sybil.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch wallet histories and build the activity snapshot
    Enrich {
        /// CSV whose first column lists wallet addresses
        #[arg(short, long)]
        wallets: PathBuf,

        /// Snapshot CSV to write
        #[arg(short, long)]
        output: PathBuf,

        /// Chain to query (overrides acquisition.chain)
        #[arg(long)]
        chain: Option<String>,

        /// Overwrite output without asking
        #[arg(long)]
        force: bool,
    },

    /// Cluster a snapshot and consolidate the result
    Cluster {
        /// Snapshot CSV to read
        #[arg(short, long)]
        input: PathBuf,

        /// Final table CSV to write
        #[arg(short, long)]
        output: PathBuf,

        /// Also write every intermediate table to this directory
        #[arg(long)]
        stages_dir: Option<PathBuf>,

        /// Overwrite output without asking
        #[arg(long)]
        force: bool,
    },

    /// Sort, dedup and prune an already rendered table
    Consolidate {
        /// Rendered table CSV to read
        #[arg(short, long)]
        input: PathBuf,

        /// Final table CSV to write
        #[arg(short, long)]
        output: PathBuf,

        /// Overwrite output without asking
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sybil_cluster=info".parse()?),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Enrich {
            wallets,
            output,
            chain,
            force,
        } => commands::enrich(&config, &wallets, &output, chain, force).await,
        Commands::Cluster {
            input,
            output,
            stages_dir,
            force,
        } => commands::cluster(&config, &input, &output, stages_dir.as_deref(), force).await,
        Commands::Consolidate {
            input,
            output,
            force,
        } => commands::consolidate(&config, &input, &output, force).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
