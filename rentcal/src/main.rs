mod batch;
mod commands;
mod config;
mod fetch;
mod routes;
mod scheduler;
mod server;
mod state;
mod sync;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::source::AddArgs;
use crate::config::Config;

#[derive(Parser)]
#[command(name = "rentcal")]
#[command(about = "Rental booking server that keeps unit calendars in sync with external iCal feeds")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server with request-driven feed syncing
    Serve {
        /// Override the configured listen port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Sync feeds now
    Sync {
        /// Only sync this source (by id)
        #[arg(short, long)]
        source: Option<String>,

        /// Sync sources even if their interval has not elapsed
        #[arg(short, long)]
        force: bool,
    },
    /// Show per-source sync status and booking counts
    Status,
    /// Manage feed sources
    Source {
        #[command(subcommand)]
        command: SourceCommands,
    },
}

#[derive(Subcommand)]
enum SourceCommands {
    /// Register a feed source
    Add {
        /// Source id (slug), e.g. "seaview-airbnb"
        id: String,

        /// Feed URL
        url: String,

        /// Owning unit id (registered on first use)
        #[arg(short, long)]
        unit: String,

        /// Display name; defaults to the id
        #[arg(short, long)]
        name: Option<String>,

        /// Minimum re-sync age within a batch, e.g. "30m"
        #[arg(long)]
        interval: Option<String>,

        /// Consecutive misses before a vanished booking is soft-deleted
        #[arg(long)]
        vanish_threshold: Option<u32>,
    },
    /// List configured sources
    List,
    /// Enable a source
    Enable { id: String },
    /// Disable a source (kept, but skipped by syncs)
    Disable { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(config, port).await,
        Commands::Sync { source, force } => commands::sync::run(config, source, force).await,
        Commands::Status => commands::status::run(config).await,
        Commands::Source { command } => match command {
            SourceCommands::Add {
                id,
                url,
                unit,
                name,
                interval,
                vanish_threshold,
            } => {
                commands::source::add(
                    config,
                    AddArgs {
                        id,
                        url,
                        unit,
                        name,
                        interval,
                        vanish_threshold,
                    },
                )
                .await
            }
            SourceCommands::List => commands::source::list(config).await,
            SourceCommands::Enable { id } => commands::source::set_enabled(config, &id, true).await,
            SourceCommands::Disable { id } => {
                commands::source::set_enabled(config, &id, false).await
            }
        },
    }
}
