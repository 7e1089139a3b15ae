//! Overlapping fixed-size text splitting.
//!
//! Chunks are at most `chunk_size` characters and consecutive chunks of one
//! document share exactly `chunk_overlap` characters, so a concept sitting
//! on a split boundary is fully present in at least one chunk. The window
//! end prefers a paragraph boundary, then a line boundary, before falling
//! back to a hard character cut.

use crate::loader::Document;

/// The unit of retrievable text.
///
/// `id` is the stable chunk identity assigned at split time; retrieval
/// deduplication keys on it.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub id: String,
    pub relative_path: String,
    pub chunk_index: usize,
    pub text: String,
}

pub fn chunk_id(relative_path: &str, index: usize) -> String {
    format!("{relative_path}#{index}")
}

/// Split every document and flatten the result, file order preserved.
pub fn split_documents(
    documents: &[Document],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<DocumentChunk> {
    let mut chunks = Vec::new();
    for doc in documents {
        for (i, text) in split_text(&doc.text, chunk_size, chunk_overlap)
            .into_iter()
            .enumerate()
        {
            chunks.push(DocumentChunk {
                id: chunk_id(&doc.relative_path, i),
                relative_path: doc.relative_path.clone(),
                chunk_index: i,
                text,
            });
        }
    }
    chunks
}

/// Split one text into overlapping chunks of at most `chunk_size` chars.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }
    // The window must always advance by at least one character
    let overlap = chunk_overlap.min(chunk_size.saturating_sub(1));

    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let hard_end = advance_chars(text, start, chunk_size);
        if hard_end >= text.len() {
            chunks.push(text[start..].to_string());
            break;
        }
        let min_end = advance_chars(text, start, overlap + 1);
        let end = preferred_break(text, min_end, hard_end).unwrap_or(hard_end);
        chunks.push(text[start..end].to_string());
        start = retreat_chars(text, end, overlap);
    }
    chunks
}

/// Look backwards through `text[min_end..hard_end]` for a paragraph break,
/// then a line break. Returns the byte offset just past the break.
fn preferred_break(text: &str, min_end: usize, hard_end: usize) -> Option<usize> {
    let window = &text[min_end..hard_end];
    if let Some(p) = window.rfind("\n\n") {
        return Some(min_end + p + 2);
    }
    window.rfind('\n').map(|p| min_end + p + 1)
}

/// Byte offset `n` characters past `from`, clamped to the end of `text`.
fn advance_chars(text: &str, from: usize, n: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(n)
        .map(|(i, _)| from + i)
        .unwrap_or(text.len())
}

/// Byte offset `n` characters before `from`.
fn retreat_chars(text: &str, from: usize, n: usize) -> usize {
    if n == 0 {
        return from;
    }
    text[..from]
        .char_indices()
        .rev()
        .nth(n - 1)
        .map(|(i, _)| i)
        .unwrap_or(0)
}
