//! Core data models used throughout Agentic RAG.
//!
//! These types represent the documents, chunks, scored results and
//! conversation messages that flow through ingestion, retrieval and the
//! agent loop.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Metadata key every chunk must carry.
pub const SOURCE_KEY: &str = "source";
/// Metadata key holding the 1-based page number of paged formats.
pub const PAGE_KEY: &str = "page";

/// A scalar metadata value.
///
/// Serialized untagged, so `{"page": 2, "source": "a.txt"}` round-trips
/// through JSON without wrapper objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetadataValue {
    /// Interpret a raw string as the narrowest scalar it spells.
    ///
    /// Integers win over floats, floats over booleans, and anything else
    /// stays a string. Non-finite floats are kept as strings.
    pub fn parse(raw: &str) -> Self {
        if let Ok(i) = raw.parse::<i64>() {
            return MetadataValue::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() {
                return MetadataValue::Float(f);
            }
        }
        match raw {
            "true" => MetadataValue::Bool(true),
            "false" => MetadataValue::Bool(false),
            _ => MetadataValue::Str(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{}", b),
            MetadataValue::Int(i) => write!(f, "{}", i),
            MetadataValue::Float(x) => write!(f, "{}", x),
            MetadataValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::Str(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::Str(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(i: i64) -> Self {
        MetadataValue::Int(i)
    }
}

impl From<usize> for MetadataValue {
    fn from(i: usize) -> Self {
        MetadataValue::Int(i as i64)
    }
}

impl From<f64> for MetadataValue {
    fn from(x: f64) -> Self {
        MetadataValue::Float(x)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        MetadataValue::Bool(b)
    }
}

/// Open string-keyed metadata map. Ordered so rendered headers are stable.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A named text payload produced by a loader, before chunking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub content: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }
}

/// An immutable unit of retrievable text.
///
/// The metadata always contains [`SOURCE_KEY`]; [`Chunk::new`] refuses to
/// build a chunk without it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    content: String,
    metadata: Metadata,
}

impl Chunk {
    /// Create a chunk, validating that `metadata` names its source.
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Result<Self> {
        if !metadata.contains_key(SOURCE_KEY) {
            return Err(Error::MissingSource);
        }
        Ok(Self {
            content: content.into(),
            metadata,
        })
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn source(&self) -> Option<&MetadataValue> {
        self.metadata.get(SOURCE_KEY)
    }
}

/// A chunk paired with a relevance score.
///
/// Higher is better at every stage. Vector search yields cosine similarity
/// in `[-1, 1]`; reranking overwrites it with the cross-encoder score, so
/// scores from different stages must not be compared.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        f.write_str(s)
    }
}

/// A single message in a conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Identifier of a conversation thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(Uuid);

impl ThreadId {
    pub fn new() -> Self {
        ThreadId(Uuid::new_v4())
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_requires_source() {
        let mut meta = Metadata::new();
        meta.insert("page".into(), 1i64.into());
        assert!(matches!(
            Chunk::new("text", meta.clone()),
            Err(Error::MissingSource)
        ));

        meta.insert(SOURCE_KEY.into(), "notes.txt".into());
        let chunk = Chunk::new("text", meta).unwrap();
        assert_eq!(chunk.source(), Some(&MetadataValue::from("notes.txt")));
    }

    #[test]
    fn parse_picks_narrowest_scalar() {
        assert_eq!(MetadataValue::parse("3"), MetadataValue::Int(3));
        assert_eq!(MetadataValue::parse("0.5"), MetadataValue::Float(0.5));
        assert_eq!(MetadataValue::parse("true"), MetadataValue::Bool(true));
        assert_eq!(MetadataValue::parse("NaN"), MetadataValue::from("NaN"));
        assert_eq!(MetadataValue::parse("docs"), MetadataValue::from("docs"));
    }

    #[test]
    fn metadata_json_is_untagged() {
        let mut meta = Metadata::new();
        meta.insert("page".into(), 2i64.into());
        meta.insert("source".into(), "a.pdf".into());
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"page":2,"source":"a.pdf"}"#);

        let back: Metadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}
