//! mediarag CLI
//!
//! # Usage
//!
//! ```bash
//! # Start the HTTP gateway
//! mediarag serve --port 3000
//!
//! # Inspect the file ledger
//! mediarag files list --limit 20
//! mediarag files show text-1717171717171-k3j2h1g0f
//!
//! # Print the JSON Schema of config.toml
//! mediarag config schema
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mediarag::config::{self, Config};
use mediarag::content::{BlobStore, Ledger, LocalBlobStore, VectorIndex};
use mediarag::gateway::{self, AppState};
use mediarag::providers::WorkersAiClient;
use mediarag::ContentService;

#[derive(Parser)]
#[command(name = "mediarag")]
#[command(about = "Upload text, images and video, then ask questions about them")]
#[command(version)]
struct Cli {
    /// Path to config.toml (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Host to bind to (overrides gateway.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides gateway.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Inspect and manage the file ledger
    ///
    /// These commands open the ledger file directly. Avoid mutating it while
    /// a gateway on the same data directory is running: independent writers
    /// are last-writer-wins.
    Files {
        #[command(subcommand)]
        command: FileCommands,
    },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum FileCommands {
    /// List the most recent uploads, newest first
    List {
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Print one ledger record as JSON
    Show { id: String },

    /// Delete a ledger record and its stored blob
    Delete { id: String },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the JSON Schema of config.toml
    Schema,

    /// Print the effective configuration
    Show,

    /// Print the default config file location
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = match cli.command {
        Commands::Config { command } => return config_command(cli.config.as_deref(), command),
        command => command,
    };

    let config = Config::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    match command {
        Commands::Serve { host, port } => serve(config, host, port).await,
        Commands::Files { command } => files(&config, command).await,
        Commands::Config { command } => config_command(cli.config.as_deref(), command),
    }
}

fn config_command(path: Option<&Path>, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Schema => println!("{}", Config::json_schema()?),
        ConfigCommands::Show => println!("{:#?}", Config::load(path)?),
        ConfigCommands::Path => match config::default_config_path() {
            Some(path) => println!("{}", path.display()),
            None => println!("no platform config directory available"),
        },
    }
    Ok(())
}

async fn serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }

    let ledger = Ledger::open(config.ledger_path())
        .await
        .context("Failed to open file ledger")?;
    let blobs = Arc::new(LocalBlobStore::new(config.blob_dir()));
    let provider = Arc::new(
        WorkersAiClient::new(&config.provider).context("Failed to build Workers AI client")?,
    );
    let has_credentials = provider.has_credentials();
    if !has_credentials {
        warn!("Workers AI credentials missing; uploads and questions will fail until CLOUDFLARE_ACCOUNT_ID and CLOUDFLARE_API_TOKEN are set");
    }

    let service = ContentService::new(
        ledger,
        VectorIndex::new(),
        blobs,
        provider.clone(),
        provider.clone(),
        provider,
    )
    .with_top_k(config.index.top_k);

    // The vector index lives in memory only; rebuild it from the ledger.
    if has_credentials {
        service
            .reindex()
            .await
            .context("Failed to rebuild vector index")?;
    }

    info!(data_dir = %config.data_dir().display(), "Starting mediarag");
    gateway::serve(AppState::new(service, &config.index), &config.gateway).await
}

async fn files(config: &Config, command: FileCommands) -> Result<()> {
    let ledger = Ledger::open(config.ledger_path())
        .await
        .context("Failed to open file ledger")?;

    match command {
        FileCommands::List { limit } => {
            let records = ledger.get_all(limit.or(Some(config.index.list_limit))).await?;
            if records.is_empty() {
                println!("No files uploaded yet.");
            }
            for record in records {
                println!(
                    "{}\t{}\t{}\t{}",
                    record.id,
                    record.kind,
                    record.timestamp.to_rfc3339(),
                    record.filename
                );
            }
        }
        FileCommands::Show { id } => match ledger.get_by_id(&id).await? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => anyhow::bail!("File not found: {id}"),
        },
        FileCommands::Delete { id } => {
            let Some(record) = ledger.take(&id).await? else {
                anyhow::bail!("File not found: {id}");
            };
            if record.has_blob_key() {
                if let Some(key) = record.media_url.as_deref() {
                    LocalBlobStore::new(config.blob_dir()).delete(key).await?;
                }
            }
            println!("Deleted {id}");
        }
    }
    Ok(())
}
