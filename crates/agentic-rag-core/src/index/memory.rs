//! In-memory [`VectorIndex`] implementation for tests and embedding.
//!
//! Entries live in a `Vec` behind `std::sync::RwLock`. Search is
//! brute-force cosine similarity over every stored vector. Nothing is
//! persisted, so [`exists`](VectorIndex::exists) simply reports whether
//! any entry has been added.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use crate::embedding::{embed_batched, EmbeddingProvider};
use crate::error::Result;
use crate::models::{Chunk, ScoredChunk};

use super::{rank_by_similarity, MetadataFilter, VectorIndex};

struct Entry {
    _id: Uuid,
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Non-persistent vector index.
pub struct InMemoryVectorIndex {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    entries: RwLock<Vec<Entry>>,
}

impl InMemoryVectorIndex {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            batch_size: 64,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn add(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.content().to_string()).collect();
        let vectors = embed_batched(self.provider.as_ref(), &texts, self.batch_size).await?;

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for (chunk, vector) in chunks.iter().zip(vectors) {
            entries.push(Entry {
                _id: Uuid::new_v4(),
                chunk: chunk.clone(),
                vector,
            });
        }
        Ok(chunks.len())
    }

    async fn search_with_score(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self.provider.embed_query(query).await?;
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let candidates = entries
            .iter()
            .map(|e| (e.chunk.clone(), e.vector.clone()));
        Ok(rank_by_similarity(&query_vec, candidates, k, filter))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len())
    }

    async fn exists(&self) -> bool {
        !self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    async fn clear(&self) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;
    use crate::test_support::{chunk_from, KeywordEmbedder};

    fn index() -> InMemoryVectorIndex {
        InMemoryVectorIndex::new(Arc::new(KeywordEmbedder)).with_batch_size(2)
    }

    #[tokio::test]
    async fn add_then_search_finds_exact_content() {
        let idx = index();
        let chunks = vec![
            chunk_from("rust ownership and borrowing rules", "a.txt"),
            chunk_from("python generators yield values lazily", "b.txt"),
            chunk_from("kubernetes schedules pods onto nodes", "c.txt"),
        ];
        assert_eq!(idx.add(&chunks).await.unwrap(), 3);
        assert_eq!(idx.count().await.unwrap(), 3);

        let hits = idx
            .search("python generators yield values lazily", 1, None)
            .await
            .unwrap();
        assert_eq!(hits, vec![chunks[1].clone()]);
    }

    #[tokio::test]
    async fn empty_add_is_noop() {
        let idx = index();
        assert_eq!(idx.add(&[]).await.unwrap(), 0);
        assert!(!idx.exists().await);
    }

    #[tokio::test]
    async fn filter_restricts_candidates() {
        let idx = index();
        let chunks = vec![
            chunk_from("shared words here", "a.txt"),
            chunk_from("shared words there", "b.txt"),
        ];
        idx.add(&chunks).await.unwrap();
        let filter = MetadataFilter::parse("source=b.txt").unwrap();
        let hits = idx
            .search_with_score("shared words here", 5, Some(&filter))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.source().unwrap().to_string(), "b.txt");
    }

    #[tokio::test]
    async fn clear_resets_everything() {
        let idx = index();
        idx.add(&[chunk_from("hello world", "a.txt")]).await.unwrap();
        assert!(idx.exists().await);
        idx.clear().await.unwrap();
        assert!(!idx.exists().await);
        idx.initialize().await.unwrap();
        assert_eq!(idx.count().await.unwrap(), 0);

        let mut meta = Metadata::new();
        meta.insert("source".into(), "again.txt".into());
        idx.add(&[Chunk::new("after clear", meta).unwrap()])
            .await
            .unwrap();
        assert_eq!(idx.count().await.unwrap(), 1);
    }
}
