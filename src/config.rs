//! Environment-driven configuration.
//!
//! All settings come from process environment variables (a `.env` file is
//! loaded first when present). Missing required variables fail fast with the
//! variable name; chunking parameters and the vector dimension are validated
//! here, before any I/O begins.

use anyhow::{anyhow, Context, Result};
use std::str::FromStr;

use crate::chunk::ChunkParams;

/// Pinned embeddings API version, overridable with `EMBED_API_VERSION`.
const DEFAULT_EMBED_API_VERSION: &str = "2024-02-15-preview";
/// Default agent service API version, overridable with `AGENT_API_VERSION`.
const DEFAULT_AGENT_API_VERSION: &str = "v1";

/// Everything the ingestion pipeline needs.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub blob: BlobSettings,
    pub embedding: EmbeddingSettings,
    pub search: SearchSettings,
    pub chunking: ChunkParams,
}

impl IngestSettings {
    pub fn from_env() -> Result<Self> {
        let chunk_size = parse_or("CHUNK_SIZE", 1500usize)?;
        let overlap = parse_or("CHUNK_OVERLAP", 200usize)?;
        let chunking = ChunkParams::new(chunk_size, overlap)
            .map_err(|e| anyhow!("CHUNK_SIZE/CHUNK_OVERLAP: {e}"))?;

        Ok(IngestSettings {
            blob: BlobSettings::from_env()?,
            embedding: EmbeddingSettings::from_env()?,
            search: SearchSettings::from_env()?,
            chunking,
        })
    }
}

/// Blob-storage connection settings.
#[derive(Debug, Clone)]
pub struct BlobSettings {
    /// Storage connection string (`AccountName=…;AccountKey=…;…`).
    pub connection_string: String,
    /// Container to scan for documents.
    pub container: String,
}

impl BlobSettings {
    pub fn from_env() -> Result<Self> {
        Ok(BlobSettings {
            connection_string: require("BLOB_CONNECTION_STRING")?,
            container: require("BLOB_CONTAINER")?,
        })
    }
}

/// Embeddings API settings.
#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    /// Embeddings resource endpoint, trailing slash stripped.
    pub endpoint: String,
    pub api_key: String,
    /// Embedding model deployment name.
    pub deployment: String,
    pub api_version: String,
    /// Texts per embeddings request.
    pub batch_size: usize,
    /// Retries for rate-limited or failing requests.
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl EmbeddingSettings {
    pub fn from_env() -> Result<Self> {
        let batch_size: usize = parse_or("EMBED_BATCH_SIZE", 16usize)?;
        if batch_size == 0 {
            anyhow::bail!("EMBED_BATCH_SIZE must be greater than zero");
        }
        Ok(EmbeddingSettings {
            endpoint: require("EMBED_ENDPOINT")?.trim_end_matches('/').to_string(),
            api_key: require("EMBED_API_KEY")?,
            deployment: require("EMBED_DEPLOYMENT")?,
            api_version: optional("EMBED_API_VERSION")
                .unwrap_or_else(|| DEFAULT_EMBED_API_VERSION.to_string()),
            batch_size,
            max_retries: parse_or("EMBED_MAX_RETRIES", 5u32)?,
            timeout_secs: parse_or("EMBED_TIMEOUT_SECS", 30u64)?,
        })
    }
}

/// Search-index settings.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// Search service endpoint, trailing slash stripped.
    pub endpoint: String,
    pub api_key: String,
    /// Index name to provision and upload into.
    pub index: String,
    /// Explicit API version; when absent, a working one is probed.
    pub api_version: Option<String>,
    /// Expected embedding vector dimension; uploads are validated against it.
    pub dimensions: usize,
}

impl SearchSettings {
    pub fn from_env() -> Result<Self> {
        let dimensions: usize = parse_or("EMBED_DIM", 1536usize)?;
        if dimensions == 0 {
            anyhow::bail!("EMBED_DIM must be greater than zero");
        }
        Ok(SearchSettings {
            endpoint: require("SEARCH_ENDPOINT")?.trim_end_matches('/').to_string(),
            api_key: require("SEARCH_API_KEY")?,
            index: optional("SEARCH_INDEX").unwrap_or_else(|| "documents".to_string()),
            api_version: optional("SEARCH_API_VERSION"),
            dimensions,
        })
    }
}

/// Agent-relay settings for the chat loop.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    /// Agent project endpoint, trailing slash stripped.
    pub endpoint: String,
    /// Id of the pre-configured orchestrator agent.
    pub agent_id: String,
    /// Bearer token for the agent service, obtained externally.
    pub token: String,
    pub api_version: String,
    /// Seconds between run-status polls.
    pub poll_interval_secs: u64,
    /// Upper bound on run-status polls per round trip.
    pub max_polls: u32,
}

impl ChatSettings {
    pub fn from_env() -> Result<Self> {
        Ok(ChatSettings {
            endpoint: require("AGENT_ENDPOINT")?.trim_end_matches('/').to_string(),
            agent_id: require("AGENT_ID")?,
            token: require("AGENT_TOKEN")?,
            api_version: optional("AGENT_API_VERSION")
                .unwrap_or_else(|| DEFAULT_AGENT_API_VERSION.to_string()),
            poll_interval_secs: parse_or("AGENT_POLL_INTERVAL_SECS", 1u64)?,
            max_polls: parse_or("AGENT_MAX_POLLS", 120u32)?,
        })
    }
}

fn require(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("{name} environment variable not set"))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{name} has an invalid value: '{raw}'")),
        None => Ok(default),
    }
}
