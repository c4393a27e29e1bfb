//! Ingestion pipeline orchestration.
//!
//! Coordinates the full flow: list container blobs → filter to PDFs →
//! download → extract text → chunk with overlap → embed → validate vector
//! dimensions → upsert records to the search index.
//!
//! Error containment is per document: a document that fails to download,
//! extract, embed, or upload is skipped with a logged reason while the
//! remaining documents proceed. Only configuration problems and a failed
//! container listing abort the whole run.

use anyhow::{Context, Result};
use tracing::{info, warn};
use uuid::Uuid;

use crate::blob::BlobStore;
use crate::chunk::{chunk_text, normalize_text};
use crate::config::IngestSettings;
use crate::embedding::EmbeddingClient;
use crate::error::PipelineError;
use crate::extract::extract_pdf_text;
use crate::models::{BlobItem, IndexDocument, TextChunk};
use crate::search::SearchClient;

/// Counters reported at the end of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    /// Blobs present in the container.
    pub listed: usize,
    /// Blobs matching the `.pdf` filter (after `--limit`).
    pub matched: usize,
    pub documents_indexed: u64,
    pub documents_skipped: u64,
    pub documents_failed: u64,
    pub chunks_embedded: u64,
    pub records_uploaded: u64,
}

/// Provision the index and stop. Safe to repeat.
pub async fn run_init(settings: &crate::config::SearchSettings) -> Result<()> {
    let search = SearchClient::connect(settings).await?;
    search.ensure_index().await?;
    println!("index '{}' created or updated", search.index_name());
    Ok(())
}

pub async fn run_ingest(
    settings: &IngestSettings,
    dry_run: bool,
    limit: Option<usize>,
) -> Result<IngestSummary> {
    let blob = BlobStore::from_settings(&settings.blob)?;

    let listed = blob
        .list()
        .await
        .context("could not list the blob container")?;
    let mut pdfs: Vec<BlobItem> = listed
        .iter()
        .filter(|item| is_pdf(&item.name))
        .cloned()
        .collect();
    if let Some(lim) = limit {
        pdfs.truncate(lim);
    }

    let mut summary = IngestSummary {
        listed: listed.len(),
        matched: pdfs.len(),
        ..IngestSummary::default()
    };

    if dry_run {
        println!("ingest {} (dry-run)", blob.container());
        println!("  blobs listed: {}", summary.listed);
        println!("  pdf documents matched: {}", summary.matched);
        for item in &pdfs {
            println!("    {}", item.name);
        }
        return Ok(summary);
    }

    let search = SearchClient::connect(&settings.search).await?;
    search.ensure_index().await?;
    let embedder = EmbeddingClient::new(&settings.embedding)?;

    for item in &pdfs {
        match ingest_document(&blob, &embedder, &search, settings, item).await {
            Ok(stats) => {
                info!(blob = %item.name, chunks = stats.chunks, "document indexed");
                summary.documents_indexed += 1;
                summary.chunks_embedded += stats.chunks;
                summary.records_uploaded += stats.records;
            }
            Err(PipelineError::EmptyInput) => {
                warn!(blob = %item.name, "skipped empty PDF");
                summary.documents_skipped += 1;
            }
            Err(e) => {
                warn!(blob = %item.name, error = %e, "document failed; continuing");
                summary.documents_failed += 1;
            }
        }
    }

    println!("ingest {}", blob.container());
    println!("  blobs listed: {}", summary.listed);
    println!("  pdf documents matched: {}", summary.matched);
    println!("  documents indexed: {}", summary.documents_indexed);
    println!("  documents skipped (empty): {}", summary.documents_skipped);
    println!("  documents failed: {}", summary.documents_failed);
    println!("  chunks embedded: {}", summary.chunks_embedded);
    println!("  records uploaded: {}", summary.records_uploaded);
    println!("ok");

    Ok(summary)
}

struct DocumentStats {
    chunks: u64,
    records: u64,
}

/// Ingest a single document end to end. Nothing is uploaded unless every
/// chunk embedded with the expected dimension.
async fn ingest_document(
    blob: &BlobStore,
    embedder: &EmbeddingClient,
    search: &SearchClient,
    settings: &IngestSettings,
    item: &BlobItem,
) -> Result<DocumentStats, PipelineError> {
    let bytes = blob
        .download(&item.name)
        .await
        .map_err(|e| PipelineError::external("blob storage", e))?;

    let raw_text = extract_pdf_text(&bytes).map_err(|e| PipelineError::ExternalService {
        service: "pdf extraction",
        message: e.to_string(),
    })?;

    let text = normalize_text(&raw_text);
    if text.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let document_id = document_id_for(&item.name);
    let chunks: Vec<TextChunk> = chunk_text(&document_id, &text, settings.chunking).collect();

    let expected_dim = settings.search.dimensions;
    let mut records: Vec<IndexDocument> = Vec::with_capacity(chunks.len());

    for batch in chunks.chunks(settings.embedding.batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let vectors = embedder
            .embed(&texts)
            .await
            .map_err(|e| PipelineError::external("embeddings", e))?;

        if vectors.len() != batch.len() {
            return Err(PipelineError::ExternalService {
                service: "embeddings",
                message: format!(
                    "expected {} vectors, received {}",
                    batch.len(),
                    vectors.len()
                ),
            });
        }

        for (chunk, vector) in batch.iter().zip(vectors) {
            if vector.len() != expected_dim {
                return Err(PipelineError::DimensionMismatch {
                    expected: expected_dim,
                    got: vector.len(),
                });
            }
            records.push(IndexDocument::from_chunk(chunk, vector, &item.name));
        }
    }

    search
        .upload(&records)
        .await
        .map_err(|e| PipelineError::external("search index", e))?;

    Ok(DocumentStats {
        chunks: chunks.len() as u64,
        records: records.len() as u64,
    })
}

fn is_pdf(name: &str) -> bool {
    name.to_lowercase().ends_with(".pdf")
}

/// Document id: blob file name without the `.pdf` suffix; random UUID when
/// the stem is empty.
fn document_id_for(blob_name: &str) -> String {
    let file_name = blob_name.rsplit('/').next().unwrap_or(blob_name);
    let stem = file_name
        .get(..file_name.len().saturating_sub(".pdf".len()))
        .unwrap_or_default();
    if stem.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        stem.to_string()
    }
}
