//! Core data models used throughout blobdex.
//!
//! These types represent the blob listings, text chunks, and index records
//! that flow through the ingestion pipeline. All of them are transient:
//! durable state lives in the external blob container and search index.

use serde::Serialize;

/// A single entry from a blob container listing.
#[derive(Debug, Clone)]
pub struct BlobItem {
    /// Full blob name (path within the container).
    pub name: String,
    /// Last modification timestamp (Unix epoch seconds).
    pub last_modified: i64,
    /// Entity tag reported by the storage service.
    pub etag: String,
    /// Blob size in bytes.
    pub size: i64,
}

/// An ordered, contiguous window of a document's extracted text.
///
/// Adjacent chunks of the same document share a fixed overlap so that no
/// semantic unit is lost at a window boundary. Chunks are consumed by the
/// embedding step immediately after creation and are not persisted on their
/// own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Identifier of the source document (blob name stem).
    pub source_document_id: String,
    /// Zero-based position among the chunks of the same document.
    pub sequence_index: usize,
    /// The chunk text.
    pub content: String,
}

/// A record upserted into the search index, keyed by
/// `{document_id}-{sequence_index}`.
#[derive(Debug, Clone, Serialize)]
pub struct IndexDocument {
    pub id: String,
    pub document_id: String,
    pub chunk_id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    /// Full source blob name, kept for provenance filtering.
    pub source: String,
}

impl IndexDocument {
    /// Build an index record from a chunk and its embedding vector.
    pub fn from_chunk(chunk: &TextChunk, embedding: Vec<f32>, source: &str) -> Self {
        IndexDocument {
            id: format!("{}-{}", chunk.source_document_id, chunk.sequence_index),
            document_id: chunk.source_document_id.clone(),
            chunk_id: chunk.sequence_index.to_string(),
            content: chunk.content.clone(),
            embedding,
            source: source.to_string(),
        }
    }
}
