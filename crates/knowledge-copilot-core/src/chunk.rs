//! Sliding-window text chunker.
//!
//! Splits document text into overlapping segments of at most `chunk_size`
//! characters. Lengths and offsets are counted in Unicode scalar values,
//! never bytes, so multi-byte text is never cut inside a character.
//!
//! # Algorithm
//!
//! 1. Validate `chunk_size > 0` and `0 <= chunk_overlap < chunk_size`.
//! 2. Trim the input. Empty input yields no segments.
//! 3. Walk a window of `chunk_size` characters, advancing by
//!    `chunk_size - chunk_overlap` per step, until the window start reaches
//!    the end of the text.
//! 4. Trim each window and keep it only if something is left.
//!
//! Consecutive untrimmed windows share exactly `chunk_overlap` characters.
//! Trimming can shave the observed overlap at segment edges; that is
//! accepted as-is.
//!
//! # Example
//!
//! ```rust
//! use knowledge_copilot_core::chunk::split_text;
//!
//! let segments = split_text("abcdefghij", 4, 1).unwrap();
//! assert_eq!(segments, vec!["abcd", "defg", "ghij", "j"]);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Validated chunk size and overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkParams {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl ChunkParams {
    /// Build parameters, rejecting combinations the chunker cannot walk.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        let params = Self {
            chunk_size,
            chunk_overlap,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(CoreError::invalid_config("chunk_size must be positive"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(CoreError::invalid_config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    fn step(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Split `text` into trimmed, non-empty, overlapping segments.
///
/// # Errors
///
/// [`CoreError::InvalidConfiguration`] if the parameters are invalid. The
/// text is not inspected in that case.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
    let params = ChunkParams::new(chunk_size, chunk_overlap)?;
    Ok(split_with(text, &params))
}

/// Split with already-validated parameters.
pub fn split_with(text: &str, params: &ChunkParams) -> Vec<String> {
    windows(text.trim(), params)
        .into_iter()
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Chunk each document in order and flatten the result.
///
/// Document boundaries are not marked in the output.
pub fn chunk_documents<I, S>(docs: I, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let params = ChunkParams::new(chunk_size, chunk_overlap)?;
    Ok(docs
        .into_iter()
        .flat_map(|doc| split_with(doc.as_ref(), &params))
        .collect())
}

/// Untrimmed windows over already-trimmed text.
fn windows<'a>(text: &'a str, params: &ChunkParams) -> Vec<&'a str> {
    if text.is_empty() {
        return Vec::new();
    }

    // Byte offset of every char start, plus the end of the string.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = bounds.len() - 1;

    let mut out = Vec::with_capacity(char_len / params.step() + 1);
    let mut start = 0;
    while start < char_len {
        let end = char_len.min(start + params.chunk_size);
        out.push(&text[bounds[start]..bounds[end]]);
        start += params.step();
    }
    out
}
