//! Text extraction for supported file formats.
//!
//! Given raw bytes and a file name, produce plain-text spans with their
//! provenance. Plain text and Markdown become one span; PDFs become one
//! span per page, numbered from 1.

use std::path::Path;

use agentic_rag_core::{Error, Result};

/// File formats with an extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Text,
    Markdown,
    Pdf,
}

impl FileKind {
    /// Classify a file by extension, case-insensitively.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedFileType`] for any other extension.
    pub fn from_name(name: &str) -> Result<Self> {
        let ext = Path::new(name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "txt" => Ok(FileKind::Text),
            "md" | "markdown" => Ok(FileKind::Markdown),
            "pdf" => Ok(FileKind::Pdf),
            "" => Err(Error::UnsupportedFileType(format!(
                "'{}' has no extension",
                name
            ))),
            other => Err(Error::UnsupportedFileType(format!(".{}", other))),
        }
    }

    /// Short label recorded as `file_type` metadata.
    pub fn label(&self) -> &'static str {
        match self {
            FileKind::Text => "txt",
            FileKind::Markdown => "md",
            FileKind::Pdf => "pdf",
        }
    }
}

/// A span of extracted text. `page` is set for paged formats.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub page: Option<u32>,
}

/// Extract text spans from `bytes` according to the extension of `name`.
pub fn extract(bytes: &[u8], name: &str) -> Result<Vec<TextSpan>> {
    match FileKind::from_name(name)? {
        FileKind::Text | FileKind::Markdown => Ok(vec![TextSpan {
            text: decode_text(bytes),
            page: None,
        }]),
        FileKind::Pdf => extract_pdf(bytes, name),
    }
}

/// Decode as UTF-8, falling back to Latin-1 so any byte sequence is readable.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn extract_pdf(bytes: &[u8], name: &str) -> Result<Vec<TextSpan>> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| {
        Error::InvalidArgument(format!("PDF extraction failed for {}: {}", name, e))
    })?;
    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| TextSpan {
            text,
            page: Some(i as u32 + 1),
        })
        .collect())
}
