//! SQLite-backed [`VectorIndex`] implementation.
//!
//! A persist directory holds one primary data file, `index.sqlite` (plus
//! its WAL side files). Each row stores a chunk, its JSON metadata and its
//! embedding as a little-endian `f32` BLOB. Search is brute-force cosine
//! similarity over every row, with metadata filters applied in Rust.
//!
//! The pool is opened lazily and dropped by [`clear`](VectorIndex::clear),
//! which removes the whole directory and recreates it empty; the next
//! write reopens a fresh database transparently.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use agentic_rag_core::embedding::{blob_to_vec, embed_batched, vec_to_blob, EmbeddingProvider};
use agentic_rag_core::index::{rank_by_similarity, MetadataFilter, VectorIndex};
use agentic_rag_core::models::{Chunk, Metadata, ScoredChunk};
use agentic_rag_core::{Error, Result};

use crate::db;
use crate::migrate;

/// File name of the primary data file inside the persist directory.
pub const INDEX_FILE: &str = "index.sqlite";

/// Path of the primary data file for a persist directory.
pub fn data_file(dir: &Path) -> PathBuf {
    dir.join(INDEX_FILE)
}

/// Remove the persist directory and recreate it empty.
pub fn reset_directory(dir: &Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}

/// SQLite implementation of the [`VectorIndex`] trait.
pub struct SqliteVectorIndex {
    dir: PathBuf,
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    pool: RwLock<Option<SqlitePool>>,
}

impl SqliteVectorIndex {
    pub fn new(dir: impl Into<PathBuf>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            dir: dir.into(),
            provider,
            batch_size: 64,
            pool: RwLock::new(None),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn persist_directory(&self) -> &Path {
        &self.dir
    }

    fn has_data_file(&self) -> bool {
        data_file(&self.dir).is_file()
    }

    /// Return the open pool, opening and migrating the database on first use.
    async fn pool(&self) -> Result<SqlitePool> {
        if let Some(pool) = self.pool.read().await.as_ref() {
            return Ok(pool.clone());
        }
        let mut guard = self.pool.write().await;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }
        let pool = db::connect(&data_file(&self.dir))
            .await
            .map_err(Error::storage)?;
        migrate::run_migrations(&pool)
            .await
            .map_err(Error::storage)?;
        debug!(dir = %self.dir.display(), "opened vector index");
        *guard = Some(pool.clone());
        Ok(pool)
    }

    async fn load_entries(&self, pool: &SqlitePool) -> Result<Vec<(Chunk, Vec<f32>)>> {
        let rows = sqlx::query("SELECT content, metadata_json, embedding FROM entries ORDER BY rowid")
            .fetch_all(pool)
            .await
            .map_err(Error::storage)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let content: String = row.get("content");
            let metadata_json: String = row.get("metadata_json");
            let blob: Vec<u8> = row.get("embedding");
            let metadata: Metadata = serde_json::from_str(&metadata_json).map_err(Error::storage)?;
            entries.push((Chunk::new(content, metadata)?, blob_to_vec(&blob)));
        }
        Ok(entries)
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn initialize(&self) -> Result<()> {
        self.pool().await.map(|_| ())
    }

    async fn add(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.content().to_string()).collect();
        let vectors = embed_batched(self.provider.as_ref(), &texts, self.batch_size).await?;

        let pool = self.pool().await?;
        let now = chrono::Utc::now().timestamp();
        let model = self.provider.model_name().to_string();

        let mut tx = pool.begin().await.map_err(Error::storage)?;
        for (chunk, vector) in chunks.iter().zip(&vectors) {
            let metadata_json = serde_json::to_string(chunk.metadata()).map_err(Error::storage)?;
            let source = chunk.source().map(|s| s.to_string()).unwrap_or_default();
            sqlx::query(
                "INSERT INTO entries (id, content, metadata_json, source, embedding, dims, model, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(chunk.content())
            .bind(&metadata_json)
            .bind(&source)
            .bind(vec_to_blob(vector))
            .bind(vector.len() as i64)
            .bind(&model)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(Error::storage)?;
        }
        tx.commit().await.map_err(Error::storage)?;

        info!(entries = chunks.len(), model = %model, "added entries to vector index");
        Ok(chunks.len())
    }

    async fn search_with_score(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>> {
        if k == 0 || !self.has_data_file() {
            return Ok(Vec::new());
        }
        let query_vec = self.provider.embed_query(query).await?;
        let pool = self.pool().await?;
        let entries = self.load_entries(&pool).await?;
        Ok(rank_by_similarity(&query_vec, entries, k, filter))
    }

    async fn count(&self) -> Result<usize> {
        if !self.has_data_file() {
            return Ok(0);
        }
        let pool = self.pool().await?;
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
            .fetch_one(&pool)
            .await
            .map_err(Error::storage)?;
        Ok(n as usize)
    }

    async fn exists(&self) -> bool {
        if !self.has_data_file() {
            return false;
        }
        match self.count().await {
            Ok(n) => n > 0,
            Err(e) => {
                warn!(error = %e, "could not read vector index; treating it as not ready");
                false
            }
        }
    }

    async fn clear(&self) -> Result<()> {
        let mut guard = self.pool.write().await;
        if let Some(pool) = guard.take() {
            pool.close().await;
        }
        reset_directory(&self.dir)?;
        info!(dir = %self.dir.display(), "cleared vector index");
        Ok(())
    }
}
