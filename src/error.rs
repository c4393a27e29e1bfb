//! Pipeline error taxonomy.
//!
//! Configuration problems are checked before any I/O begins; the remaining
//! variants classify per-document failures so the ingestion loop can skip a
//! document and continue with the rest.

use thiserror::Error;

/// Errors produced by the ingestion pipeline and the chunking core.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad or missing settings, including invalid chunking parameters.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A document's extracted text was empty. The document is skipped; no
    /// chunks are produced and no index records are written.
    #[error("document contains no extractable text")]
    EmptyInput,

    /// An embedding vector's length did not match the configured dimension.
    /// Aborts the affected document's upload before anything is written.
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A collaborator call failed (network, auth, quota). Carries enough
    /// context for the operator to retry manually.
    #[error("{service} error: {message}")]
    ExternalService { service: &'static str, message: String },
}

impl PipelineError {
    /// Wrap a collaborator failure, preserving the full error chain text.
    pub fn external(service: &'static str, err: anyhow::Error) -> Self {
        PipelineError::ExternalService {
            service,
            message: format!("{err:#}"),
        }
    }
}
