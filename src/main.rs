mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mnemos::config::MnemosConfig;

#[derive(Parser)]
#[command(
    name = "mnemos",
    version,
    about = "Duplicate and contradiction checks for a personal memory store"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check text against stored memories and print the report as JSON
    Check {
        /// Text of the candidate memory
        text: String,
    },
    /// Check text, then store it unless it duplicates an existing memory
    Add {
        text: String,
        /// Store even when duplicates were found
        #[arg(long)]
        force: bool,
    },
    /// Inspect or maintain the embedding cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Check provider health
    Health {
        /// Keep monitoring and print status transitions until Ctrl-C
        #[arg(long)]
        watch: bool,
    },
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show entry count, age range and size
    Stats,
    /// Remove entries older than the configured TTL
    Prune,
    /// Remove every entry
    Clear,
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.mnemos/models/
    Download,
}

fn stderr_subscriber(level: String) -> impl tracing::Subscriber + Send + Sync {
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only command output. Config loading
    // logs through a bootstrap subscriber until the configured level is known.
    let bootstrap = stderr_subscriber(
        std::env::var("MNEMOS_LOG_LEVEL").unwrap_or_else(|_| "info".into()),
    );
    let config = tracing::subscriber::with_default(bootstrap, MnemosConfig::load)?;
    tracing::subscriber::set_global_default(stderr_subscriber(config.server.log_level.clone()))?;

    match cli.command {
        Command::Check { text } => cli::check::check(&config, &text).await?,
        Command::Add { text, force } => cli::check::add(&config, &text, force).await?,
        Command::Cache { action } => match action {
            CacheAction::Stats => cli::cache::stats(&config)?,
            CacheAction::Prune => cli::cache::prune(&config)?,
            CacheAction::Clear => cli::cache::clear(&config)?,
        },
        Command::Health { watch } => cli::health::health(&config, watch).await?,
        Command::Model { action } => match action {
            ModelAction::Download => cli::model_download(&config.embedding).await?,
        },
    }

    Ok(())
}
