//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`FixedSizeChunker`], which
//! slides a fixed-size character window with configurable overlap across the
//! text. Sizes and offsets count Unicode scalar values, so a window never
//! splits a multi-byte character.

use crate::error::{RagError, Result};

/// A strategy for splitting document text into chunk texts.
///
/// Output order is left-to-right textual order; the position of each string
/// in the returned `Vec` becomes the chunk's `chunk_index`.
pub trait Chunker: Send + Sync {
    /// Split `text` into trimmed, non-empty chunk texts.
    fn split(&self, text: &str) -> Vec<String>;
}

/// Splits text into fixed-size windows by character count with overlap.
///
/// # Example
///
/// ```rust
/// use docqa_rag::{Chunker, FixedSizeChunker};
///
/// let chunker = FixedSizeChunker::new(500, 50)?;
/// let chunks = chunker.split(&"a".repeat(1200));
/// assert_eq!(chunks.len(), 3);
/// # Ok::<(), docqa_rag::RagError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of characters per chunk
    /// * `chunk_overlap` - number of overlapping characters between consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] unless `0 <= chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// The window size in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// The overlap between consecutive windows in characters.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

impl Default for FixedSizeChunker {
    fn default() -> Self {
        Self { chunk_size: 500, chunk_overlap: 50 }
    }
}

impl Chunker for FixedSizeChunker {
    fn split(&self, text: &str) -> Vec<String> {
        split_windows(text, self.chunk_size, self.chunk_overlap)
    }
}

/// Split `text` into overlapping windows of `chunk_size` characters.
///
/// Texts no longer than `chunk_size` come back as a single trimmed chunk (or
/// none if only whitespace). Longer texts are cut into windows starting every
/// `chunk_size - chunk_overlap` characters; each window is trimmed and kept
/// only if non-empty. The last window may be shorter than `chunk_size`.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] if `chunk_overlap >= chunk_size`, which
/// would otherwise never advance.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
    validate(chunk_size, chunk_overlap)?;
    Ok(split_windows(text, chunk_size, chunk_overlap))
}

fn validate(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::ConfigError(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Caller guarantees `chunk_overlap < chunk_size`.
fn split_windows(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    // Byte offset of every char boundary, including the end of the text.
    let boundaries: Vec<usize> =
        text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
    let char_count = boundaries.len() - 1;

    if char_count <= chunk_size {
        let trimmed = text.trim();
        return if trimmed.is_empty() { Vec::new() } else { vec![trimmed.to_string()] };
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(char_count);
        let window = text[boundaries[start]..boundaries[end]].trim();
        if !window.is_empty() {
            chunks.push(window.to_string());
        }
        if end == char_count {
            break;
        }
        start = end - chunk_overlap;
    }
    chunks
}
