
use itertools::Itertools;
use tracing::debug;

use crate::{RagError, Result};

/// Default window width in characters
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// A fixed-width window of the source document ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 1-based position of this chunk in the document
    pub id: u64,
    /// The chunk text, exactly as it appears in the document
    pub text: String,
}

/// Split `text` into consecutive windows of `size` characters.
///
/// Windows never overlap and are not trimmed, so concatenating them in order
/// reproduces `text`. Only the last window may be shorter than `size`.
/// Boundaries fall between Unicode scalar values, never inside one.
#[inline]
pub fn chunk_text(text: &str, size: usize) -> Result<Vec<Chunk>> {
    if size == 0 {
        return Err(RagError::InvalidChunkSize(size));
    }

    let chunks: Vec<Chunk> = text
        .chars()
        .chunks(size)
        .into_iter()
        .zip(1_u64..)
        .map(|(window, id)| Chunk {
            id,
            text: window.collect(),
        })
        .collect();

    debug!(
        "Chunked {} characters into {} chunks of up to {} characters",
        text.chars().count(),
        chunks.len(),
        size
    );

    Ok(chunks)
}
