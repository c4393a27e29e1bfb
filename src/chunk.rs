//! Fixed-window text chunker with overlap.
//!
//! Splits document body text into [`TextChunk`]s of up to `chunk_size`
//! characters, where each chunk shares its leading `overlap` characters with
//! the tail of its predecessor. The overlap preserves context across window
//! boundaries so downstream retrieval does not see discontinuity artifacts.
//!
//! Chunking is a pure function: no I/O, no suspension points. Parameters are
//! validated once, up front, before any chunk is produced. Offsets are
//! measured in characters, never raw bytes, so multi-byte UTF-8 text is
//! split safely.

use crate::error::PipelineError;
use crate::models::TextChunk;

/// Validated chunking parameters.
///
/// The step between consecutive window starts is `chunk_size - overlap`,
/// which construction guarantees to be positive — otherwise chunking would
/// never terminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkParams {
    /// Validate and build chunking parameters.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfiguration`] when `chunk_size` is
    /// zero or `overlap >= chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, PipelineError> {
        if chunk_size == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(PipelineError::InvalidConfiguration(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, chunk_size
            )));
        }
        Ok(ChunkParams {
            chunk_size,
            overlap,
        })
    }

    /// Target maximum characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters shared between consecutive chunks.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// Normalize extracted text before chunking: carriage returns become line
/// feeds, tabs become spaces, and surrounding whitespace is trimmed.
pub fn normalize_text(text: &str) -> String {
    text.replace('\r', "\n").replace('\t', " ").trim().to_string()
}

/// Split `text` into overlapping windows in document order.
///
/// Returns a lazy iterator of [`TextChunk`]s ordered by `sequence_index`.
/// The final chunk may be shorter than `chunk_size`; empty `text` yields no
/// chunks at all, so empty documents are detectably skippable upstream.
pub fn chunk_text<'a>(document_id: &str, text: &'a str, params: ChunkParams) -> Chunks<'a> {
    // Byte offset of every char start, plus the end of the text, so windows
    // measured in characters can be sliced without walking the string again.
    let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    boundaries.push(text.len());

    Chunks {
        text,
        boundaries,
        params,
        document_id: document_id.to_string(),
        offset: 0,
        sequence_index: 0,
        done: false,
    }
}

/// Lazy iterator over the chunks of one document.
///
/// Restartable: cloning (or calling [`chunk_text`] again) replays the same
/// sequence from the beginning of whatever position the clone was taken at.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    /// Char-start byte offsets plus a trailing `text.len()` sentinel.
    boundaries: Vec<usize>,
    params: ChunkParams,
    document_id: String,
    /// Current window start, in characters.
    offset: usize,
    sequence_index: usize,
    done: bool,
}

impl Chunks<'_> {
    fn char_len(&self) -> usize {
        self.boundaries.len() - 1
    }
}

impl Iterator for Chunks<'_> {
    type Item = TextChunk;

    fn next(&mut self) -> Option<TextChunk> {
        if self.done || self.offset >= self.char_len() {
            return None;
        }

        let end = (self.offset + self.params.chunk_size()).min(self.char_len());
        let content = &self.text[self.boundaries[self.offset]..self.boundaries[end]];

        let chunk = TextChunk {
            source_document_id: self.document_id.clone(),
            sequence_index: self.sequence_index,
            content: content.to_string(),
        };

        self.sequence_index += 1;
        if end == self.char_len() {
            // This window consumed the rest of the text.
            self.done = true;
        } else {
            self.offset += self.params.step();
        }

        Some(chunk)
    }
}
