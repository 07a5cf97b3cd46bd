//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait defines every storage operation the retrieval
//! and ingestion paths need, enabling pluggable backends (SQLite in the app
//! crate, [`memory::InMemoryVectorIndex`] here).
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`initialize`](VectorIndex::initialize) | Open or create storage (idempotent) |
//! | [`add`](VectorIndex::add) | Embed and append chunks, durably |
//! | [`search`](VectorIndex::search) | k nearest chunks |
//! | [`search_with_score`](VectorIndex::search_with_score) | k nearest chunks with cosine scores |
//! | [`count`](VectorIndex::count) | Number of indexed entries |
//! | [`exists`](VectorIndex::exists) | Readiness gate: storage present and non-empty |
//! | [`clear`](VectorIndex::clear) | Irreversibly drop all entries and files |
//!
//! Writes (`add`, `clear`) must be serialized by the caller per store.
//! Searches may run concurrently with each other.

pub mod memory;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::{Error, Result};
use crate::models::{Chunk, Metadata, MetadataValue, ScoredChunk};

/// Abstract vector index over embedded chunks.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Open or create storage. Safe to call repeatedly.
    async fn initialize(&self) -> Result<()>;

    /// Embed and append `chunks` (no dedup), persisting before returning.
    ///
    /// Returns the number of entries written. Empty input is a no-op.
    /// Storage removed by [`clear`](VectorIndex::clear) is recreated.
    async fn add(&self, chunks: &[Chunk]) -> Result<usize>;

    /// Return the `k` nearest chunks, best first.
    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Chunk>> {
        Ok(self
            .search_with_score(query, k, filter)
            .await?
            .into_iter()
            .map(|scored| scored.chunk)
            .collect())
    }

    /// Return the `k` nearest chunks with their cosine similarity, best first.
    async fn search_with_score(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>>;

    async fn count(&self) -> Result<usize>;

    /// Whether persisted storage is present and holds at least one entry.
    async fn exists(&self) -> bool;

    /// Delete every entry and all persisted files.
    async fn clear(&self) -> Result<()>;
}

/// Exact-match conjunction over metadata keys.
///
/// A value matches when it is equal to the expected value or renders to
/// the same text, so a filter parsed from `page=2` matches both the
/// integer `2` and the string `"2"`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    conditions: BTreeMap<String, MetadataValue>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `key == value` condition.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for an empty or malformed key, or a key
    /// that already has a condition.
    pub fn with(mut self, key: &str, value: impl Into<MetadataValue>) -> Result<Self> {
        validate_key(key)?;
        if self.conditions.contains_key(key) {
            return Err(Error::InvalidArgument(format!(
                "duplicate filter key '{}'",
                key
            )));
        }
        self.conditions.insert(key.to_string(), value.into());
        Ok(self)
    }

    /// Parse `key=value[,key=value…]`. Values are typed with
    /// [`MetadataValue::parse`].
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(Error::InvalidArgument("empty metadata filter".to_string()));
        }
        let mut filter = Self::new();
        for clause in spec.split(',') {
            let (key, value) = clause.split_once('=').ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "filter clause '{}' is not of the form key=value",
                    clause.trim()
                ))
            })?;
            filter = filter.with(key.trim(), MetadataValue::parse(value.trim()))?;
        }
        Ok(filter)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.conditions.iter().all(|(key, expected)| {
            metadata
                .get(key)
                .map(|v| v == expected || v.to_string() == expected.to_string())
                .unwrap_or(false)
        })
    }
}

impl fmt::Display for MetadataFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clauses: Vec<String> = self
            .conditions
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        f.write_str(&clauses.join(","))
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidArgument("empty filter key".to_string()));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(Error::InvalidArgument(format!(
            "filter key '{}' may only contain ASCII letters, digits, '_', '.' and '-'",
            key
        )));
    }
    Ok(())
}

/// Brute-force nearest neighbours over `(chunk, vector)` entries in
/// insertion order.
///
/// Entries failing `filter` are skipped. The sort is stable, so equal
/// scores keep insertion order.
pub fn rank_by_similarity<I>(
    query: &[f32],
    entries: I,
    k: usize,
    filter: Option<&MetadataFilter>,
) -> Vec<ScoredChunk>
where
    I: IntoIterator<Item = (Chunk, Vec<f32>)>,
{
    if k == 0 {
        return Vec::new();
    }
    let mut scored: Vec<ScoredChunk> = entries
        .into_iter()
        .filter(|(chunk, _)| filter.map_or(true, |f| f.matches(chunk.metadata())))
        .map(|(chunk, vector)| ScoredChunk {
            score: cosine_similarity(query, &vector),
            chunk,
        })
        .collect();
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str, page: i64) -> Chunk {
        let mut m = Metadata::new();
        m.insert("source".into(), source.into());
        m.insert("page".into(), page.into());
        Chunk::new(format!("{source}#{page}"), m).unwrap()
    }

    #[test]
    fn parse_filter() {
        let f = MetadataFilter::parse("source=a.pdf, page=2").unwrap();
        assert!(f.matches(chunk("a.pdf", 2).metadata()));
        assert!(!f.matches(chunk("a.pdf", 3).metadata()));
        assert!(!f.matches(chunk("b.pdf", 2).metadata()));
        assert_eq!(f.to_string(), "page=2,source=a.pdf");
    }

    #[test]
    fn malformed_filters_are_invalid_arguments() {
        for bad in ["", "source", "=x", "so urce=x", "a=1,a=2", "page=2,"] {
            assert!(
                matches!(MetadataFilter::parse(bad), Err(Error::InvalidArgument(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn string_and_number_values_match_by_text() {
        let mut m = Metadata::new();
        m.insert("source".into(), "x".into());
        m.insert("version".into(), "2".into());
        let f = MetadataFilter::parse("version=2").unwrap();
        assert!(f.matches(&m));
    }

    #[test]
    fn ranking_is_stable_for_ties() {
        let entries = vec![
            (chunk("a", 1), vec![1.0, 0.0]),
            (chunk("b", 1), vec![0.0, 1.0]),
            (chunk("c", 1), vec![1.0, 0.0]),
        ];
        let ranked = rank_by_similarity(&[1.0, 0.0], entries, 3, None);
        let order: Vec<&str> = ranked.iter().map(|s| s.chunk.content()).collect();
        assert_eq!(order, vec!["a#1", "c#1", "b#1"]);
        assert!(rank_by_similarity(&[1.0, 0.0], Vec::new(), 0, None).is_empty());
    }
}
