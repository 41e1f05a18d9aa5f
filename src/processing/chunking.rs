//! Fixed-size sliding-window text splitting.
//!
//! Chunk boundaries are measured in characters, not bytes, so multi-byte
//! UTF-8 input never splits inside a code point. The window advances by
//! `chunk_size - overlap` each step; the overlap keeps context that straddles
//! a boundary visible to retrieval.

use super::types::ChunkingError;

/// Split text into overlapping windows of `chunk_size` characters.
///
/// The window starts at offset 0 and slides forward by `chunk_size - overlap`
/// until its start reaches the end of the text. The final chunk may be
/// shorter than `chunk_size`; no padding is applied. Empty input yields an
/// empty sequence.
///
/// The split is pure and deterministic: identical input and parameters
/// produce an identical chunk sequence on every call.
pub fn split_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<String>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if overlap >= chunk_size {
        return Err(ChunkingError::InvalidOverlap {
            chunk_size,
            overlap,
        });
    }
    if text.is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every character boundary, with the end of the text as
    // the final sentinel.
    let mut boundaries: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();
    boundaries.push(text.len());
    let char_count = boundaries.len() - 1;

    let step = chunk_size - overlap;
    let mut chunks = Vec::with_capacity(char_count / step + 1);
    let mut start = 0;
    while start < char_count {
        let end = (start + chunk_size).min(char_count);
        chunks.push(text[boundaries[start]..boundaries[end]].to_string());
        start += step;
    }

    Ok(chunks)
}
