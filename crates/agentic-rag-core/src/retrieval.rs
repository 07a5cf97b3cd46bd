//! Two-stage retrieval: vector search, threshold filter, optional rerank.
//!
//! [`RetrievalService`] is the single entry point for "give me relevant
//! text for this query". It is built once from an index and a reranker and
//! passed to whoever serves requests.
//!
//! # Pipeline
//!
//! ```text
//! query ──► index.search_with_score(k or 2k) ──► drop score < threshold
//!       ──► rerank to rerank_top_k (or truncate to k) ──► context string
//! ```
//!
//! A store that is not ready yields an empty result, never an error.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::index::{MetadataFilter, VectorIndex};
use crate::models::{Chunk, ScoredChunk, PAGE_KEY, SOURCE_KEY};
use crate::rerank::{Reranker, RerankerStatus};

pub const DEFAULT_K: usize = 4;
pub const DEFAULT_CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Metadata keys left out of context headers.
const STRUCTURAL_KEYS: [&str; 2] = [SOURCE_KEY, PAGE_KEY];

/// Per-call retrieval parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrieveOptions {
    pub k: usize,
    /// Overrides the service default (reranking on iff the reranker is enabled).
    pub use_reranker: Option<bool>,
    /// Results kept after reranking; defaults to `k`.
    pub rerank_top_k: Option<usize>,
    /// Candidates whose vector similarity is below this are dropped before reranking.
    pub similarity_threshold: Option<f32>,
    pub metadata_filter: Option<MetadataFilter>,
}

impl RetrieveOptions {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            use_reranker: None,
            rerank_top_k: None,
            similarity_threshold: None,
            metadata_filter: None,
        }
    }

    pub fn use_reranker(mut self, enabled: bool) -> Self {
        self.use_reranker = Some(enabled);
        self
    }

    pub fn rerank_top_k(mut self, top_k: usize) -> Self {
        self.rerank_top_k = Some(top_k);
        self
    }

    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    pub fn metadata_filter(mut self, filter: MetadataFilter) -> Self {
        self.metadata_filter = Some(filter);
        self
    }
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self::new(DEFAULT_K)
    }
}

/// How retrieved chunks are joined into one context string.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextOptions {
    pub separator: String,
    /// Prefix each chunk with a `[key: value, …]` header of non-structural metadata.
    pub include_metadata: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            separator: DEFAULT_CONTEXT_SEPARATOR.to_string(),
            include_metadata: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    NotReady,
}

/// Outcome of a knowledge-base lookup on behalf of an agent.
#[derive(Debug, Clone, PartialEq)]
pub enum KnowledgeContext {
    NotReady,
    NoMatches,
    Found(String),
}

impl KnowledgeContext {
    /// Text handed back to the language model as a tool result.
    pub fn to_tool_output(&self) -> String {
        match self {
            KnowledgeContext::NotReady => {
                "Knowledge base is not available. Please ensure documents have been processed."
                    .to_string()
            }
            KnowledgeContext::NoMatches => {
                "No relevant information found in the knowledge base.".to_string()
            }
            KnowledgeContext::Found(context) => format!("Retrieved context:\n{}", context),
        }
    }
}

/// Operational snapshot of the store and reranker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreInfo {
    pub document_count: usize,
    pub ready: bool,
    pub reranker_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reranker_model: Option<String>,
    pub reranker_status: RerankerStatus,
}

pub struct RetrievalService {
    index: Arc<dyn VectorIndex>,
    reranker: Reranker,
}

impl RetrievalService {
    pub fn new(index: Arc<dyn VectorIndex>, reranker: Reranker) -> Self {
        Self { index, reranker }
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn reranker(&self) -> &Reranker {
        &self.reranker
    }

    pub async fn readiness(&self) -> Readiness {
        if self.index.exists().await {
            Readiness::Ready
        } else {
            Readiness::NotReady
        }
    }

    pub async fn is_ready(&self) -> bool {
        self.readiness().await == Readiness::Ready
    }

    pub async fn retrieve(&self, query: &str, options: &RetrieveOptions) -> Result<Vec<Chunk>> {
        Ok(self
            .retrieve_with_scores(query, options)
            .await?
            .into_iter()
            .map(|scored| scored.chunk)
            .collect())
    }

    /// Retrieve with scores.
    ///
    /// Scores are cosine similarities unless reranking ran, in which case
    /// they are cross-encoder scores (or `0.0` when the reranker passed
    /// candidates through).
    pub async fn retrieve_with_scores(
        &self,
        query: &str,
        options: &RetrieveOptions,
    ) -> Result<Vec<ScoredChunk>> {
        let k = options.k;
        if k == 0 {
            return Ok(Vec::new());
        }
        if !self.is_ready().await {
            debug!("vector index not ready; returning no results");
            return Ok(Vec::new());
        }

        let rerank = options
            .use_reranker
            .unwrap_or_else(|| self.reranker.is_enabled());
        let fetch_k = if rerank { k.saturating_mul(2) } else { k };

        let mut candidates = self
            .index
            .search_with_score(query, fetch_k, options.metadata_filter.as_ref())
            .await?;
        let fetched = candidates.len();

        if let Some(threshold) = options.similarity_threshold {
            candidates.retain(|c| c.score >= threshold);
        }
        debug!(
            fetch_k,
            fetched,
            kept = candidates.len(),
            rerank,
            "retrieved candidates"
        );

        if rerank {
            let top_k = options.rerank_top_k.unwrap_or(k);
            let chunks = candidates.into_iter().map(|c| c.chunk).collect();
            Ok(self
                .reranker
                .rerank_with_scores(query, chunks, Some(top_k))
                .await)
        } else {
            candidates.truncate(k);
            Ok(candidates)
        }
    }

    /// Retrieve and join the chunks into a single context string.
    pub async fn context_string(
        &self,
        query: &str,
        options: &RetrieveOptions,
        context: &ContextOptions,
    ) -> Result<String> {
        let chunks = self.retrieve(query, options).await?;
        Ok(format_context(&chunks, context))
    }

    /// Look up context for an agent tool call.
    pub async fn knowledge_context(&self, query: &str, k: usize) -> Result<KnowledgeContext> {
        if !self.is_ready().await {
            return Ok(KnowledgeContext::NotReady);
        }
        let chunks = self.retrieve(query, &RetrieveOptions::new(k)).await?;
        if chunks.is_empty() {
            return Ok(KnowledgeContext::NoMatches);
        }
        let context = format_context(
            &chunks,
            &ContextOptions {
                include_metadata: true,
                ..ContextOptions::default()
            },
        );
        Ok(KnowledgeContext::Found(context))
    }

    pub async fn store_info(&self) -> Result<StoreInfo> {
        let ready = self.is_ready().await;
        let document_count = if ready { self.index.count().await? } else { 0 };
        let reranker_enabled = self.reranker.is_enabled();
        Ok(StoreInfo {
            document_count,
            ready,
            reranker_enabled,
            reranker_model: reranker_enabled.then(|| self.reranker.model_name().to_string()),
            reranker_status: self.reranker.status().clone(),
        })
    }
}

/// Join chunk contents with the configured separator.
pub fn format_context(chunks: &[Chunk], options: &ContextOptions) -> String {
    chunks
        .iter()
        .map(|chunk| {
            if !options.include_metadata {
                return chunk.content().to_string();
            }
            let header: Vec<String> = chunk
                .metadata()
                .iter()
                .filter(|(key, _)| !STRUCTURAL_KEYS.contains(&key.as_str()))
                .map(|(key, value)| format!("{}: {}", key, value))
                .collect();
            if header.is_empty() {
                chunk.content().to_string()
            } else {
                format!("[{}]\n{}", header.join(", "), chunk.content())
            }
        })
        .collect::<Vec<_>>()
        .join(&options.separator)
}
