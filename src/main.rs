mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mindloop::config::{self, MindloopConfig};

#[derive(Parser)]
#[command(
    name = "mindloop",
    version,
    about = "Cognitive loop with hybrid memory recall and debate gating"
)]
struct Cli {
    /// Config file (defaults to ~/.mindloop/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run cognitive cycles over inputs (arguments, or stdin lines)
    Run {
        /// Inputs, one cycle each
        #[arg(short, long = "input")]
        inputs: Vec<String>,
        /// Stop after this many cycles (defaults to runtime.cycles)
        #[arg(long)]
        cycles: Option<usize>,
        /// Print cycle reports as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Hybrid recall over memories and artifacts
    Recall {
        query: String,
        #[arg(short, long)]
        k: Option<usize>,
        #[arg(long)]
        alpha: Option<f64>,
    },
    /// Ask the persona and neutral judges whether a candidate memory should be stored
    Gate { candidate: String },
    /// Run the multi-round permissive/critical debate over a candidate memory
    Debate {
        candidate: String,
        #[arg(long)]
        rounds: Option<usize>,
    },
    /// Check database health and index consistency
    Doctor,
    /// Re-embed every memory and rebuild the vector index
    Reindex,
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.mindloop/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => MindloopConfig::load_from(path)?,
        None => MindloopConfig::load()?,
    };

    // Log to stderr so stdout carries only reports.
    let filter = EnvFilter::try_new(&config.runtime.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(path = %config::default_config_path().display(), "default config location");

    match cli.command {
        Command::Run {
            inputs,
            cycles,
            json,
        } => cli::run::run(&config, inputs, cycles, json).await?,
        Command::Recall { query, k, alpha } => {
            cli::recall::recall(&config, &query, k, alpha).await?
        }
        Command::Gate { candidate } => cli::gate::gate(&config, &candidate).await?,
        Command::Debate { candidate, rounds } => {
            cli::debate::debate(&config, &candidate, rounds).await?
        }
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Reindex => cli::reindex::reindex(&config).await?,
        Command::Model { action } => match action {
            ModelAction::Download => cli::model_download(&config.embedding).await?,
        },
    }

    Ok(())
}
