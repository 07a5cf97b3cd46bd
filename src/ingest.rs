//! Ingestion pipeline orchestration.
//!
//! Coordinates load → chunk → index for a documents directory, a single
//! file, a raw text snippet or an in-memory upload. A full rebuild clears
//! the index first; every other entry point appends.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use agentic_rag_core::chunk::TextChunker;
use agentic_rag_core::index::VectorIndex;
use agentic_rag_core::models::{Document, Metadata, MetadataValue, SOURCE_KEY};
use agentic_rag_core::{Error, Result};

use crate::config::Config;
use crate::extract::FileKind;
use crate::loader::{self, DocumentLoader, MAX_UPLOAD_BYTES};
use crate::services::Services;

/// Source recorded for [`IngestionPipeline::add_text`] when none is given.
pub const DEFAULT_TEXT_SOURCE: &str = "text";
/// `upload_source` recorded for uploads when none is given.
pub const DEFAULT_UPLOAD_SOURCE: &str = "api";

/// Outcome of [`IngestionPipeline::process_upload`].
#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub filename: String,
    pub file_type: String,
    pub file_size: usize,
    pub documents: usize,
    pub chunks_added: usize,
}

/// Snapshot returned by [`IngestionPipeline::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub document_count: usize,
    pub store_exists: bool,
    pub persist_directory: Option<PathBuf>,
}

pub struct IngestionPipeline {
    index: Arc<dyn VectorIndex>,
    chunker: TextChunker,
    loader: DocumentLoader,
    persist_directory: Option<PathBuf>,
}

impl IngestionPipeline {
    pub fn new(index: Arc<dyn VectorIndex>, chunker: TextChunker, loader: DocumentLoader) -> Self {
        Self {
            index,
            chunker,
            loader,
            persist_directory: None,
        }
    }

    /// Record where the index lives, for [`stats`](Self::stats).
    pub fn with_persist_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.persist_directory = Some(dir.into());
        self
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Index every supported file under `documents_path`.
    ///
    /// With `clear_existing` the index is emptied first. The path is
    /// checked before anything is cleared, so a typo never wipes the index.
    /// Returns the number of chunks added.
    pub async fn process(&self, documents_path: &Path, clear_existing: bool) -> Result<usize> {
        if !documents_path.is_dir() {
            return Err(Error::InvalidArgument(format!(
                "documents path does not exist or is not a directory: {}",
                documents_path.display()
            )));
        }

        if clear_existing {
            self.index.clear().await?;
        }
        self.index.initialize().await?;

        let documents = self.loader.load_directory(documents_path)?;
        if documents.is_empty() {
            info!(path = %documents_path.display(), "no documents found");
            return Ok(0);
        }

        let added = self.index_documents(&documents).await?;
        info!(
            path = %documents_path.display(),
            documents = documents.len(),
            chunks = added,
            cleared = clear_existing,
            "processed documents"
        );
        Ok(added)
    }

    /// Index one file. `metadata` is merged over the loader's metadata.
    pub async fn process_single(&self, file_path: &Path, metadata: Metadata) -> Result<usize> {
        let mut documents = self.loader.load_file(file_path)?;
        for doc in &mut documents {
            doc.metadata.extend(metadata.clone());
        }
        self.index.initialize().await?;
        let added = self.index_documents(&documents).await?;
        info!(path = %file_path.display(), chunks = added, "processed file");
        Ok(added)
    }

    /// Index a raw text snippet. `source` defaults to `"text"`.
    pub async fn add_text(&self, text: &str, mut metadata: Metadata) -> Result<usize> {
        metadata
            .entry(SOURCE_KEY.to_string())
            .or_insert_with(|| MetadataValue::from(DEFAULT_TEXT_SOURCE));
        self.index.initialize().await?;
        let added = self
            .index_documents(&[Document::new(text, metadata)])
            .await?;
        info!(chunks = added, "added text");
        Ok(added)
    }

    /// Index an uploaded file held in memory.
    ///
    /// Each chunk records `source` (the file name), `file_size`,
    /// `file_type` and `upload_source`. Caller metadata may replace
    /// `upload_source` and add keys, but never the file's own facts.
    ///
    /// # Errors
    ///
    /// Empty uploads, uploads over 50 MiB and unsupported extensions are
    /// rejected before any extraction happens.
    pub async fn process_upload(
        &self,
        bytes: &[u8],
        filename: &str,
        metadata: Metadata,
    ) -> Result<UploadReport> {
        let kind = FileKind::from_name(filename)?;
        if bytes.is_empty() {
            return Err(Error::InvalidArgument(format!("uploaded file is empty: {}", filename)));
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(Error::InvalidArgument(format!(
                "uploaded file exceeds {} bytes: {} ({} bytes)",
                MAX_UPLOAD_BYTES,
                filename,
                bytes.len()
            )));
        }

        // File facts always win over caller metadata; upload_source is only a default.
        let mut base = metadata;
        base.insert(SOURCE_KEY.to_string(), MetadataValue::from(filename));
        base.insert("file_size".to_string(), MetadataValue::from(bytes.len()));
        base.insert("file_type".to_string(), MetadataValue::from(kind.label()));
        base.entry("upload_source".to_string())
            .or_insert_with(|| MetadataValue::from(DEFAULT_UPLOAD_SOURCE));

        let documents = loader::documents_from_bytes(bytes, filename, base)?;
        self.index.initialize().await?;
        let chunks_added = self.index_documents(&documents).await?;
        info!(filename, bytes = bytes.len(), chunks = chunks_added, "processed upload");

        Ok(UploadReport {
            filename: filename.to_string(),
            file_type: kind.label().to_string(),
            file_size: bytes.len(),
            documents: documents.len(),
            chunks_added,
        })
    }

    pub async fn stats(&self) -> Result<PipelineStats> {
        Ok(PipelineStats {
            document_count: self.index.count().await?,
            store_exists: self.index.exists().await,
            persist_directory: self.persist_directory.clone(),
        })
    }

    async fn index_documents(&self, documents: &[Document]) -> Result<usize> {
        let chunks = self.chunker.chunk(documents)?;
        self.index.add(&chunks).await
    }
}

/// Build metadata from `--meta key=value` pairs, typing each value.
pub fn metadata_from_pairs(pairs: &[(String, String)]) -> Metadata {
    pairs
        .iter()
        .map(|(k, v)| (k.clone(), MetadataValue::parse(v)))
        .collect()
}

/// `rag process`: index a documents directory (the configured root by default).
pub async fn run_process(
    config: &Config,
    path: Option<&Path>,
    clear_existing: bool,
) -> anyhow::Result<()> {
    let path = path.unwrap_or(config.documents.root.as_path());
    let services = Services::open(config).await?;
    let added = services.ingestion.process(path, clear_existing).await?;
    let stats = services.ingestion.stats().await?;

    println!("process {}", path.display());
    if clear_existing {
        println!("  cleared existing index");
    }
    println!("  chunks added: {}", added);
    println!("  total entries: {}", stats.document_count);
    println!("ok");
    Ok(())
}

/// `rag add`: index a single file.
pub async fn run_add(
    config: &Config,
    file: &Path,
    meta: &[(String, String)],
) -> anyhow::Result<()> {
    let services = Services::open(config).await?;
    let added = services
        .ingestion
        .process_single(file, metadata_from_pairs(meta))
        .await?;
    println!("add {}", file.display());
    println!("  chunks added: {}", added);
    println!("ok");
    Ok(())
}

/// `rag add-text`: index a text snippet.
pub async fn run_add_text(
    config: &Config,
    text: &str,
    meta: &[(String, String)],
) -> anyhow::Result<()> {
    let services = Services::open(config).await?;
    let added = services
        .ingestion
        .add_text(text, metadata_from_pairs(meta))
        .await?;
    println!("add-text");
    println!("  chunks added: {}", added);
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DocumentsConfig;
    use agentic_rag_core::embedding::EmbeddingProvider;
    use agentic_rag_core::index::memory::InMemoryVectorIndex;
    use async_trait::async_trait;

    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        fn model_name(&self) -> &str {
            "length"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    fn pipeline() -> IngestionPipeline {
        let index = Arc::new(InMemoryVectorIndex::new(Arc::new(LengthEmbedder)));
        IngestionPipeline::new(
            index,
            TextChunker::new(100, 20).unwrap(),
            DocumentLoader::new(&DocumentsConfig::default()).unwrap(),
        )
    }

    #[test]
    fn meta_pairs_are_typed() {
        let meta = metadata_from_pairs(&[
            ("page".to_string(), "3".to_string()),
            ("lang".to_string(), "en".to_string()),
        ]);
        assert_eq!(meta.get("page"), Some(&MetadataValue::Int(3)));
        assert_eq!(meta.get("lang").and_then(|v| v.as_str()), Some("en"));
    }

    #[tokio::test]
    async fn add_text_defaults_source() {
        let pipeline = pipeline();
        assert_eq!(pipeline.add_text("hello there", Metadata::new()).await.unwrap(), 1);
        let hits = pipeline.index().search("hello", 1, None).await.unwrap();
        assert_eq!(hits[0].source().and_then(|s| s.as_str()), Some("text"));
    }

    #[tokio::test]
    async fn upload_records_file_metadata() {
        let pipeline = pipeline();
        let report = pipeline
            .process_upload(b"uploaded body", "notes.txt", Metadata::new())
            .await
            .unwrap();
        assert_eq!(report.chunks_added, 1);
        assert_eq!(report.file_size, 13);

        let hits = pipeline.index().search("uploaded", 1, None).await.unwrap();
        let meta = hits[0].metadata();
        assert_eq!(meta.get("source").and_then(|v| v.as_str()), Some("notes.txt"));
        assert_eq!(meta.get("file_type").and_then(|v| v.as_str()), Some("txt"));
        assert_eq!(meta.get("upload_source").and_then(|v| v.as_str()), Some("api"));
        assert_eq!(meta.get("file_size"), Some(&MetadataValue::Int(13)));
    }

    #[tokio::test]
    async fn upload_file_facts_override_caller_metadata() {
        let pipeline = pipeline();
        let mut meta = Metadata::new();
        meta.insert("source".to_string(), MetadataValue::from("spoofed"));
        meta.insert("file_size".to_string(), MetadataValue::Int(1));
        meta.insert("file_type".to_string(), MetadataValue::from("pdf"));
        meta.insert("team".to_string(), MetadataValue::from("docs"));
        pipeline
            .process_upload(b"hello body", "real.txt", meta)
            .await
            .unwrap();

        let hits = pipeline.index().search("hello", 1, None).await.unwrap();
        let meta = hits[0].metadata();
        assert_eq!(meta.get("source").and_then(|v| v.as_str()), Some("real.txt"));
        assert_eq!(meta.get("file_size"), Some(&MetadataValue::Int(10)));
        assert_eq!(meta.get("file_type").and_then(|v| v.as_str()), Some("txt"));
        assert_eq!(meta.get("upload_source").and_then(|v| v.as_str()), Some("api"));
        assert_eq!(meta.get("team").and_then(|v| v.as_str()), Some("docs"));
    }

    #[tokio::test]
    async fn upload_rejects_empty_and_unsupported() {
        let pipeline = pipeline();
        assert!(matches!(
            pipeline.process_upload(b"", "empty.txt", Metadata::new()).await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            pipeline.process_upload(b"a,b", "data.csv", Metadata::new()).await,
            Err(Error::UnsupportedFileType(_))
        ));
        assert_eq!(pipeline.index().count().await.unwrap(), 0);
    }
}
