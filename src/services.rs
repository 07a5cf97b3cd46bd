//! Service wiring.
//!
//! [`Services`] is built once per process from a [`Config`] and handed to
//! whatever drives it (the CLI, an HTTP layer, an agent loop). There are no
//! global singletons: every component receives its dependencies here.

use std::sync::Arc;

use tracing::info;

use agentic_rag_core::chunk::TextChunker;
use agentic_rag_core::conversation::ConversationMemory;
use agentic_rag_core::embedding::EmbeddingProvider;
use agentic_rag_core::index::VectorIndex;
use agentic_rag_core::rerank::Reranker;
use agentic_rag_core::retrieval::RetrievalService;
use agentic_rag_core::Result;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::ingest::IngestionPipeline;
use crate::loader::DocumentLoader;
use crate::rerank::build_reranker;
use crate::sqlite_index::SqliteVectorIndex;

pub struct Services {
    pub index: Arc<dyn VectorIndex>,
    pub retrieval: RetrievalService,
    pub ingestion: IngestionPipeline,
    pub memory: ConversationMemory,
}

impl Services {
    /// Build every service from configuration.
    ///
    /// # Errors
    ///
    /// Fails when the embedding backend is unavailable. An unavailable
    /// reranker only degrades retrieval.
    pub async fn open(config: &Config) -> Result<Self> {
        let provider = create_provider(&config.embedding).await?;
        let reranker = build_reranker(&config.retrieval).await;
        Self::assemble(config, provider, reranker)
    }

    /// Build services around an already constructed embedder and reranker.
    pub fn assemble(
        config: &Config,
        provider: Arc<dyn EmbeddingProvider>,
        reranker: Reranker,
    ) -> Result<Self> {
        let index: Arc<dyn VectorIndex> = Arc::new(
            SqliteVectorIndex::new(&config.index.path, provider)
                .with_batch_size(config.embedding.batch_size),
        );
        let chunker = TextChunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;
        let loader = DocumentLoader::new(&config.documents)?;

        let ingestion = IngestionPipeline::new(Arc::clone(&index), chunker, loader)
            .with_persist_directory(&config.index.path);
        let retrieval = RetrievalService::new(Arc::clone(&index), reranker);
        let memory = ConversationMemory::new(config.memory.window)?;

        info!(
            index = %config.index.path.display(),
            reranker = ?retrieval.reranker().status(),
            "services ready"
        );
        Ok(Self {
            index,
            retrieval,
            ingestion,
            memory,
        })
    }
}
