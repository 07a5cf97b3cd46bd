//! Second-stage reranking with a cross-encoder.
//!
//! A [`Reranker`] wraps an optional [`CrossEncoder`] and never fails a
//! retrieval: when reranking is disabled, when the model failed to load,
//! or when scoring fails at call time, the input order is passed through
//! with a neutral score of `0.0`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{Chunk, ScoredChunk};

/// Scores `(query, text)` pairs; higher means more relevant.
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    /// Return one score per text, in input order.
    async fn score(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>>;
}

/// Operator-visible state of the reranker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RerankerStatus {
    /// Reranking was not requested.
    Disabled,
    Enabled { model: String },
    /// Reranking was requested but the model could not be loaded.
    Degraded { model: String, reason: String },
}

/// Query-aware reordering of a candidate set.
pub struct Reranker {
    model: String,
    encoder: Option<Arc<dyn CrossEncoder>>,
    status: RerankerStatus,
}

impl Reranker {
    pub fn disabled(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            encoder: None,
            status: RerankerStatus::Disabled,
        }
    }

    pub fn with_encoder(model: impl Into<String>, encoder: Arc<dyn CrossEncoder>) -> Self {
        let model = model.into();
        Self {
            status: RerankerStatus::Enabled {
                model: model.clone(),
            },
            model,
            encoder: Some(encoder),
        }
    }

    /// Build from the outcome of loading a model.
    ///
    /// A load error disables reranking for the lifetime of this instance
    /// and is recorded as [`RerankerStatus::Degraded`].
    pub fn from_loaded(model: impl Into<String>, loaded: Result<Arc<dyn CrossEncoder>>) -> Self {
        let model = model.into();
        match loaded {
            Ok(encoder) => Self::with_encoder(model, encoder),
            Err(e) => {
                warn!(model = %model, error = %e, "reranker failed to load; reranking disabled");
                Self {
                    status: RerankerStatus::Degraded {
                        model: model.clone(),
                        reason: e.to_string(),
                    },
                    model,
                    encoder: None,
                }
            }
        }
    }

    pub fn status(&self) -> &RerankerStatus {
        &self.status
    }

    pub fn is_enabled(&self) -> bool {
        self.encoder.is_some()
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub async fn rerank(&self, query: &str, chunks: Vec<Chunk>, top_k: Option<usize>) -> Vec<Chunk> {
        self.rerank_with_scores(query, chunks, top_k)
            .await
            .into_iter()
            .map(|scored| scored.chunk)
            .collect()
    }

    /// Score, stable-sort descending and truncate to `top_k` (all when `None`).
    pub async fn rerank_with_scores(
        &self,
        query: &str,
        chunks: Vec<Chunk>,
        top_k: Option<usize>,
    ) -> Vec<ScoredChunk> {
        let limit = top_k.unwrap_or(chunks.len());
        let Some(encoder) = &self.encoder else {
            return pass_through(chunks, limit);
        };
        if chunks.is_empty() || limit == 0 {
            return Vec::new();
        }

        let texts: Vec<&str> = chunks.iter().map(Chunk::content).collect();
        let scores = match encoder.score(query, &texts).await {
            Ok(scores) if scores.len() == chunks.len() => scores,
            Ok(scores) => {
                warn!(
                    expected = chunks.len(),
                    got = scores.len(),
                    "reranker returned wrong number of scores; keeping vector order"
                );
                return pass_through(chunks, limit);
            }
            Err(e) => {
                warn!(error = %e, "reranking failed; keeping vector order");
                return pass_through(chunks, limit);
            }
        };

        let mut scored: Vec<ScoredChunk> = chunks
            .into_iter()
            .zip(scores)
            .map(|(chunk, score)| ScoredChunk { chunk, score })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        debug!(model = %self.model, kept = scored.len(), "reranked candidates");
        scored
    }
}

fn pass_through(chunks: Vec<Chunk>, limit: usize) -> Vec<ScoredChunk> {
    chunks
        .into_iter()
        .take(limit)
        .map(|chunk| ScoredChunk { chunk, score: 0.0 })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_support::chunk_from;

    /// Scores each text by its length in characters.
    pub(crate) struct LengthScorer;

    #[async_trait]
    impl CrossEncoder for LengthScorer {
        async fn score(&self, _query: &str, texts: &[&str]) -> Result<Vec<f32>> {
            Ok(texts.iter().map(|t| t.chars().count() as f32).collect())
        }
    }

    struct Broken;

    #[async_trait]
    impl CrossEncoder for Broken {
        async fn score(&self, _query: &str, _texts: &[&str]) -> Result<Vec<f32>> {
            Err(Error::unavailable("cross-encoder", "session crashed"))
        }
    }

    fn candidates() -> Vec<Chunk> {
        vec![
            chunk_from("mid size", "a"),
            chunk_from("the longest candidate", "b"),
            chunk_from("tiny", "c"),
            chunk_from("also mid", "d"),
        ]
    }

    #[tokio::test]
    async fn sorts_by_score_with_stable_ties() {
        let reranker = Reranker::with_encoder("length", Arc::new(LengthScorer));
        let out = reranker.rerank_with_scores("q", candidates(), Some(3)).await;
        let texts: Vec<&str> = out.iter().map(|s| s.chunk.content()).collect();
        assert_eq!(texts, vec!["the longest candidate", "mid size", "also mid"]);
        assert_eq!(out[0].score, 21.0);
    }

    #[tokio::test]
    async fn disabled_passes_through_with_neutral_scores() {
        let reranker = Reranker::disabled("none");
        let out = reranker.rerank_with_scores("q", candidates(), Some(2)).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].chunk.content(), "mid size");
        assert!(out.iter().all(|s| s.score == 0.0));

        let all = reranker.rerank("q", candidates(), None).await;
        assert_eq!(all, candidates());
    }

    #[tokio::test]
    async fn load_failure_degrades() {
        let reranker = Reranker::from_loaded(
            "bge-reranker-base",
            Err(Error::unavailable("bge-reranker-base", "download failed")),
        );
        assert!(!reranker.is_enabled());
        assert!(matches!(reranker.status(), RerankerStatus::Degraded { .. }));
        let out = reranker.rerank("q", candidates(), Some(4)).await;
        assert_eq!(out, candidates());
    }

    #[tokio::test]
    async fn scoring_failure_passes_through() {
        let reranker = Reranker::with_encoder("broken", Arc::new(Broken));
        assert!(reranker.is_enabled());
        let out = reranker.rerank_with_scores("q", candidates(), Some(2)).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].chunk.content(), "the longest candidate");
        assert!(out.iter().all(|s| s.score == 0.0));
    }
}
