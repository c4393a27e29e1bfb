//! PDF text extraction.
//!
//! Converts downloaded PDF bytes into plain UTF-8 text. Extraction never
//! panics on malformed input; it returns an error and the pipeline skips the
//! affected document.

use thiserror::Error;

/// Extraction failure for a single document.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Extract plain text from PDF bytes.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}
