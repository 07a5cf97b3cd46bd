//! # Agentic RAG Core
//!
//! Shared retrieval logic for Agentic RAG: data model, recursive chunking,
//! the vector index abstraction, two-stage retrieval with optional
//! cross-encoder reranking, and bounded conversation memory.
//!
//! This crate performs no filesystem, SQL or network I/O. Storage and model
//! backends plug in through the [`index::VectorIndex`],
//! [`embedding::EmbeddingProvider`] and [`rerank::CrossEncoder`] traits; the
//! `agentic-rag` app crate supplies SQLite, fastembed, OpenAI and Ollama
//! implementations.

pub mod chunk;
pub mod conversation;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod rerank;
pub mod retrieval;

pub use error::{Error, Result};

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    use async_trait::async_trait;

    use crate::embedding::EmbeddingProvider;
    use crate::models::{Chunk, Metadata};
    use crate::Result;

    /// Bag-of-words embedder: each lowercase word bumps one hashed bucket.
    pub struct KeywordEmbedder;

    pub const DIMS: usize = 64;

    pub fn keyword_vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMS];
        for word in text.split_whitespace() {
            let mut h = DefaultHasher::new();
            word.to_lowercase().hash(&mut h);
            v[(h.finish() % DIMS as u64) as usize] += 1.0;
        }
        v
    }

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keyword"
        }
        fn dims(&self) -> usize {
            DIMS
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| keyword_vector(t)).collect())
        }
    }

    pub fn chunk_from(content: &str, source: &str) -> Chunk {
        let mut meta = Metadata::new();
        meta.insert("source".into(), source.into());
        Chunk::new(content, meta).unwrap()
    }
}
