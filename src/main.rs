//! cinesync CLI entry point

use chrono::Utc;
use cinesync::{
    config::Config,
    error::Result,
    extract::{tracked_tables, Extractor},
    index::ElasticClient,
    retry::RetryPolicy,
    state::{JsonFileStorage, SyncState},
    sync::SyncService,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "cinesync")]
#[command(version, about = "Incremental PostgreSQL to Elasticsearch sync for a movies catalog", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sync daemon (creates the index and full-loads it first if missing)
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Show stored checkpoints and index status
    Status,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = match cli.config.as_deref() {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    match cli.command {
        Commands::Run { once } => {
            let retry = RetryPolicy::from_config(&config.backoff);
            let extractor = Extractor::connect(
                &config.postgres.url,
                config.postgres.max_connections,
                &config.postgres.schema,
                config.sync.page_size,
                config.sync.fetch_batch_size,
                retry,
            )?;
            let elastic = ElasticClient::new(&config.elasticsearch)?;
            let state = SyncState::new(JsonFileStorage::new(config.state_file()));

            let service = SyncService::new(
                extractor,
                elastic,
                state,
                tracked_tables(&config.postgres.schema),
                Duration::from_secs(config.sync.poll_interval_secs),
                config.sync.bootstrap_batch_size,
                Utc::now(),
            );

            service.run(once).await?;
        }

        Commands::Status => {
            let elastic = ElasticClient::new(&config.elasticsearch)?;
            let state = SyncState::new(JsonFileStorage::new(config.state_file()));

            if elastic.index_exists().await? {
                let count = elastic.document_count().await?;
                println!("Index '{}': {} document(s)", elastic.index(), count);
            } else {
                println!("Index '{}': missing", elastic.index());
            }

            let checkpoints = state.all();
            if checkpoints.is_empty() {
                println!("No checkpoints stored");
            } else {
                println!("Checkpoints:");
                for (table, ts) in checkpoints {
                    println!("  {} -> {}", table, ts.to_rfc3339());
                }
            }
        }
    }

    Ok(())
}
