//! Recursive character chunking with overlap.
//!
//! Text is split on the coarsest separator present (blank line, newline,
//! space, then individual characters), pieces longer than the target size are
//! split again with the finer separators, and the resulting pieces are merged
//! back into chunks of at most `chunk_size` characters. Each new chunk starts
//! with trailing pieces of the previous one totalling at most `chunk_overlap`
//! characters. All lengths are counted in characters.

use crate::types::{Chunk, SourceDocument};
use std::collections::VecDeque;
use unichat_core::{AppError, AppResult};

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> AppResult<Self> {
        if chunk_size == 0 {
            return Err(AppError::Config("chunk size must be positive".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(AppError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Chunk every block of every document.
    ///
    /// Ids run `Doc-0`, `Doc-1`, ... across the whole input.
    pub fn chunk(&self, documents: &[SourceDocument]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for document in documents {
            for block in &document.blocks {
                let texts = self.split_text(&block.text);
                let offsets = self.start_offsets(&block.text, &texts);
                for (text, start_offset) in texts.into_iter().zip(offsets) {
                    chunks.push(Chunk {
                        id: format!("Doc-{}", chunks.len()),
                        text,
                        start_offset,
                        source_path: document.path.clone(),
                    });
                }
            }
        }

        tracing::debug!(
            chunks = chunks.len(),
            chunk_size = self.chunk_size,
            chunk_overlap = self.chunk_overlap,
            "Chunked documents"
        );

        chunks
    }

    /// Split one block of text into trimmed, non-empty chunk texts.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut finer: &[&str] = &[];
        for (i, &candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = candidate;
                break;
            }
            if text.contains(candidate) {
                separator = candidate;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting));
                fitting.clear();
            }
            if finer.is_empty() {
                push_trimmed(&mut chunks, piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting));
        }

        chunks
    }

    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    tracing::warn!(
                        size = total,
                        limit = self.chunk_size,
                        "Created a chunk longer than the configured size"
                    );
                }
                if !window.is_empty() {
                    push_trimmed(&mut chunks, window.iter().map(|(p, _)| *p).collect());
                    while total > self.chunk_overlap
                        || (total + len > self.chunk_size && total > 0)
                    {
                        match window.pop_front() {
                            Some((_, dropped)) => total -= dropped,
                            None => break,
                        }
                    }
                }
            }

            window.push_back((piece, len));
            total += len;
        }

        push_trimmed(&mut chunks, window.iter().map(|(p, _)| *p).collect());
        chunks
    }

    /// Character offset of each chunk within `text`.
    ///
    /// The search for chunk `n` starts where chunk `n - 1` began plus its
    /// length minus the overlap, so repeated text resolves to the right span.
    /// Positions only move by the distance between neighbouring chunks, so a
    /// block is walked about once however many chunks it yields.
    fn start_offsets(&self, text: &str, chunks: &[String]) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(chunks.len());
        // Start of the previous chunk, in characters and bytes
        let mut index: usize = 0;
        let mut index_byte: usize = 0;
        let mut previous_len: usize = 0;

        for chunk in chunks {
            let search_from = (index + previous_len).saturating_sub(self.chunk_overlap);
            let (from_char, from_byte) = seek(text, (index, index_byte), search_from);

            (index, index_byte) = match text[from_byte..].find(chunk.as_str()) {
                Some(found) => {
                    let skipped = char_len(&text[from_byte..from_byte + found]);
                    (from_char + skipped, from_byte + found)
                }
                None => (from_char, from_byte),
            };
            previous_len = char_len(chunk);
            offsets.push(index);
        }

        offsets
    }
}

/// Move from a known `(char, byte)` position to character `target`, stepping
/// only over the characters in between. Stops at either end of `text`.
fn seek(text: &str, (chars, bytes): (usize, usize), target: usize) -> (usize, usize) {
    if target >= chars {
        let mut position = (chars, bytes);
        for (i, (offset, c)) in text[bytes..].char_indices().enumerate() {
            if chars + i == target {
                return (target, bytes + offset);
            }
            position = (chars + i + 1, bytes + offset + c.len_utf8());
        }
        position
    } else {
        let back = chars - target;
        match text[..bytes].char_indices().rev().nth(back - 1) {
            Some((offset, _)) => (target, offset),
            None => (0, 0),
        }
    }
}

/// Split on `separator`, keeping it at the start of the following piece.
/// An empty separator splits into single characters. Empty pieces are dropped.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (at, _) in text.match_indices(separator) {
        pieces.push(&text[start..at]);
        start = at;
    }
    pieces.push(&text[start..]);
    pieces.retain(|p| !p.is_empty());
    pieces
}

fn push_trimmed(chunks: &mut Vec<String>, text: String) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
