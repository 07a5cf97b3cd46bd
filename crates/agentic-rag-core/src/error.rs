//! Error taxonomy shared by every component.
//!
//! Degraded reranking and a not-ready index are *not* errors; they are
//! modelled as [`RerankerStatus`](crate::rerank::RerankerStatus) and
//! [`Readiness`](crate::retrieval::Readiness) so callers branch on them.

use std::fmt::Display;

use thiserror::Error;

/// Errors raised by chunking, indexing, retrieval and ingestion.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid settings, such as an overlap that is not smaller than the chunk size.
    #[error("configuration error: {0}")]
    Config(String),

    /// A caller-supplied argument is malformed (for example a metadata filter).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Chunk metadata lacks the required `source` key.
    #[error("chunk metadata is missing the required `source` key")]
    MissingSource,

    /// The file extension has no registered extractor.
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// A backend could not be reached or loaded when it was constructed.
    #[error("resource unavailable ({resource}): {message}")]
    ResourceUnavailable { resource: String, message: String },

    /// The embedding backend failed or returned a malformed batch.
    #[error("embedding error ({provider}): {message}")]
    Embedding { provider: String, message: String },

    /// The persistent index failed to read or write.
    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn storage(err: impl Display) -> Self {
        Error::Storage(err.to_string())
    }

    pub fn embedding(provider: impl Into<String>, err: impl Display) -> Self {
        Error::Embedding {
            provider: provider.into(),
            message: err.to_string(),
        }
    }

    pub fn unavailable(resource: impl Into<String>, err: impl Display) -> Self {
        Error::ResourceUnavailable {
            resource: resource.into(),
            message: err.to_string(),
        }
    }
}

/// Convenience result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
