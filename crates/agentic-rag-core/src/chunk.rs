//! Recursive character text chunker.
//!
//! Splits document text into [`Chunk`]s of at most `chunk_size` characters,
//! with consecutive chunks sharing up to `chunk_overlap` characters so that
//! sentences straddling a boundary stay retrievable.
//!
//! # Algorithm
//!
//! 1. A text of at most `chunk_size` characters is returned whole.
//! 2. Otherwise pick the first separator (`"\n\n"`, `"\n"`, `" "`, `""`)
//!    that occurs in the text and split on it. `""` splits between
//!    characters.
//! 3. Pieces shorter than `chunk_size` are greedily merged back together,
//!    joined by the separator, carrying a tail of at most `chunk_overlap`
//!    characters into the next chunk.
//! 4. Longer pieces recurse with the remaining separators. A piece that is
//!    still too long once the separators run out is emitted as-is.
//!
//! Lengths are counted in characters, never bytes, so multi-byte text is
//! never cut inside a code point.
//!
//! # Example
//!
//! ```rust
//! use agentic_rag_core::chunk::TextChunker;
//! use agentic_rag_core::models::Metadata;
//!
//! let chunker = TextChunker::new(1000, 200).unwrap();
//! let mut meta = Metadata::new();
//! meta.insert("source".into(), "notes.txt".into());
//! let chunks = chunker.chunk_text("Hello world.\n\nSecond paragraph.", &meta).unwrap();
//! assert_eq!(chunks.len(), 1);
//! ```

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::models::{Chunk, Document, Metadata, SOURCE_KEY};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Paragraph break, line break, space, character boundary.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Size-bounded, overlapping text splitter.
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextChunker {
    /// Build a chunker with the default separators.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when `chunk_size` is zero or `chunk_overlap` is not
    /// strictly smaller than `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk_size must be > 0".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Replace the separator list, tried in order.
    ///
    /// Leaving out `""` means a piece with no separator left is emitted as
    /// an oversized chunk instead of being cut between characters.
    pub fn with_separators<S: Into<String>>(
        mut self,
        separators: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        let separators: Vec<String> = separators.into_iter().map(Into::into).collect();
        if separators.is_empty() {
            return Err(Error::Config("at least one separator is required".to_string()));
        }
        self.separators = separators;
        Ok(self)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Chunk every document, in order. Each chunk inherits its document's metadata.
    pub fn chunk(&self, documents: &[Document]) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        for doc in documents {
            chunks.extend(self.chunk_text(&doc.content, &doc.metadata)?);
        }
        Ok(chunks)
    }

    /// Chunk a single text. Blank text yields no chunks.
    ///
    /// # Errors
    ///
    /// [`Error::MissingSource`] when `metadata` has no `source` key.
    pub fn chunk_text(&self, text: &str, metadata: &Metadata) -> Result<Vec<Chunk>> {
        if !metadata.contains_key(SOURCE_KEY) {
            return Err(Error::MissingSource);
        }
        self.split_text(text)
            .into_iter()
            .map(|piece| Chunk::new(piece, metadata.clone()))
            .collect()
    }

    /// Split text into chunk strings without attaching metadata.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        if char_len(text) <= self.chunk_size {
            return vec![text.to_string()];
        }
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut out = Vec::new();
        let mut short: Vec<&str> = Vec::new();
        for piece in split_on(text, separator) {
            if char_len(piece) < self.chunk_size {
                short.push(piece);
                continue;
            }
            if !short.is_empty() {
                out.extend(self.merge(&short, separator));
                short.clear();
            }
            if remaining.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed.to_string());
                }
            } else {
                out.extend(self.split_recursive(piece, remaining));
            }
        }
        if !short.is_empty() {
            out.extend(self.merge(&short, separator));
        }
        out
    }

    /// Greedily pack short pieces into chunks, keeping an overlapping tail.
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut out = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { sep_len };
            if total + len + joiner > self.chunk_size && !window.is_empty() {
                push_joined(&mut out, &window, separator);
                while total > self.chunk_overlap
                    || (total > 0
                        && total + len + if window.is_empty() { 0 } else { sep_len }
                            > self.chunk_size)
                {
                    let Some(first) = window.pop_front() else {
                        break;
                    };
                    let joiner = if window.is_empty() { 0 } else { sep_len };
                    total = total.saturating_sub(char_len(first) + joiner);
                }
            }
            window.push_back(piece);
            total += len + if window.len() > 1 { sep_len } else { 0 };
        }
        push_joined(&mut out, &window, separator);
        out
    }
}

fn push_joined(out: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Split on `separator`, dropping empty pieces. `""` yields single characters.
fn split_on<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split(separator).filter(|s| !s.is_empty()).collect()
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
