//! Sentence-boundary text chunker.
//!
//! Splits document body text into fixed-size, overlapping chunks. Each
//! candidate window is trimmed back to the last sentence or line boundary
//! when one falls past the window's midpoint; otherwise the full window is
//! kept and the next window starts `overlap` characters earlier to preserve
//! continuity across the cut.
//!
//! Each chunk receives a UUID and a SHA-256 hash of its text for embedding
//! staleness detection.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// Split text into overlapping chunks of at most `chunk_size` characters.
///
/// Offsets are in characters, not bytes, so multi-byte input is never split
/// mid-codepoint. Chunks are whitespace-trimmed; empty chunks are dropped.
/// The cursor strictly advances on every iteration, for any input.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if chunk_size == 0 {
        return Vec::new();
    }
    // An overlap >= chunk_size would stall the cursor.
    let overlap = overlap.min(chunk_size - 1);

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < total {
        let end = (start + chunk_size).min(total);
        let mut chunk_end = end;
        let next_start;

        if end < total {
            // Prefer ending at the last sentence/line boundary in the window,
            // but only when that keeps more than half the window.
            let break_at = chars[start..end]
                .iter()
                .rposition(|&c| c == '.' || c == '\n');
            match break_at {
                Some(rel) if rel > chunk_size / 2 => {
                    chunk_end = start + rel + 1;
                    next_start = chunk_end;
                }
                _ => {
                    next_start = end - overlap;
                }
            }
        } else {
            next_start = end;
        }

        let chunk: String = chars[start..chunk_end].iter().collect();
        let trimmed = chunk.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        start = if next_start > start {
            next_start
        } else {
            start + 1
        };
    }

    chunks
}

/// Split a document body into stored [`Chunk`] records with contiguous
/// 0-based indices.
pub fn make_chunks(document_id: &str, text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    split_text(text, chunk_size, overlap)
        .into_iter()
        .enumerate()
        .map(|(i, text)| make_chunk(document_id, i as i64, &text))
        .collect()
}

fn make_chunk(document_id: &str, index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}
