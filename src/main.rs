//! # blobdex CLI
//!
//! Commands for provisioning the search index, ingesting PDF documents from
//! a blob container, and chatting with the configured orchestrator agent.
//!
//! ## Usage
//!
//! ```bash
//! blobdex <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `blobdex init` | Create or update the search index (idempotent) |
//! | `blobdex ingest` | Chunk, embed, and upsert every PDF in the container |
//! | `blobdex chat` | Interactive chat with the orchestrator agent |
//!
//! All settings come from environment variables (a `.env` file is loaded
//! when present); see the `config` module for the recognized names.

use clap::{Parser, Subcommand};

use blobdex::{chat, config, ingest};

/// blobdex — blob-to-vector-index ingestion and agent chat relay.
#[derive(Parser)]
#[command(
    name = "blobdex",
    about = "Ingest PDF documents from blob storage into a vector search index, and chat with a hosted orchestrator agent",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create or update the search index.
    ///
    /// Provisions the index schema (key, content, vector field with an HNSW
    /// profile, semantic configuration). Idempotent — running it multiple
    /// times is safe.
    Init,

    /// Ingest PDF documents from the configured blob container.
    ///
    /// Lists the container, filters to `.pdf` blobs, extracts text, chunks
    /// it with overlap, embeds each chunk, and upserts the records into the
    /// search index. A failing document is skipped with a logged reason;
    /// the rest proceed.
    Ingest {
        /// List matching blobs without downloading or writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of documents to process.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Chat interactively with the configured orchestrator agent.
    ///
    /// Reads lines from stdin, relays them to a conversation thread, and
    /// prints the agent's replies. `quit`, `exit`, or end-of-input ends the
    /// session.
    Chat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("blobdex=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let settings = config::SearchSettings::from_env()?;
            ingest::run_init(&settings).await?;
        }
        Commands::Ingest { dry_run, limit } => {
            let settings = config::IngestSettings::from_env()?;
            ingest::run_ingest(&settings, dry_run, limit).await?;
        }
        Commands::Chat => {
            let settings = config::ChatSettings::from_env()?;
            chat::run_chat(&settings).await?;
        }
    }

    Ok(())
}
