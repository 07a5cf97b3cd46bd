//! Cross-encoder reranking backed by fastembed.
//!
//! [`build_reranker`] turns `[retrieval]` settings into a core
//! [`Reranker`]. Loading never fails the caller: an unknown model name, a
//! download error or a build without local models all produce a degraded
//! reranker that passes candidates through.

#[cfg(feature = "local-models-fastembed")]
use std::sync::Arc;

#[cfg(feature = "local-models-fastembed")]
use async_trait::async_trait;

use agentic_rag_core::rerank::{CrossEncoder, Reranker};
use agentic_rag_core::{Error, Result};

use crate::config::RetrievalConfig;

/// Supported cross-encoder model names.
pub const SUPPORTED_MODELS: [&str; 3] = [
    "bge-reranker-base",
    "bge-reranker-v2-m3",
    "jina-reranker-v1-turbo-en",
];

/// Build the reranker described by `config`.
pub async fn build_reranker(config: &RetrievalConfig) -> Reranker {
    let model = config.reranker_model.clone();
    if !config.enable_reranker {
        return Reranker::disabled(model);
    }
    let loaded = load_cross_encoder(&model).await;
    Reranker::from_loaded(model, loaded)
}

#[cfg(feature = "local-models-fastembed")]
async fn load_cross_encoder(name: &str) -> Result<std::sync::Arc<dyn CrossEncoder>> {
    let model = config_to_reranker_model(name)?;
    let reranker = tokio::task::spawn_blocking(move || {
        fastembed::TextRerank::try_new(
            fastembed::RerankInitOptions::new(model).with_show_download_progress(true),
        )
    })
    .await
    .map_err(|e| Error::unavailable(name, e))?
    .map_err(|e| Error::unavailable(name, e))?;

    Ok(Arc::new(FastembedCrossEncoder {
        model: Arc::new(std::sync::Mutex::new(reranker)),
    }))
}

#[cfg(not(feature = "local-models-fastembed"))]
async fn load_cross_encoder(name: &str) -> Result<std::sync::Arc<dyn CrossEncoder>> {
    Err(Error::unavailable(
        name,
        "reranking requires building with --features local-models-fastembed",
    ))
}

#[cfg(feature = "local-models-fastembed")]
fn config_to_reranker_model(name: &str) -> Result<fastembed::RerankerModel> {
    match name {
        "bge-reranker-base" => Ok(fastembed::RerankerModel::BGERerankerBase),
        "bge-reranker-v2-m3" => Ok(fastembed::RerankerModel::BGERerankerV2M3),
        "jina-reranker-v1-turbo-en" => Ok(fastembed::RerankerModel::JINARerankerV1TurboEn),
        other => Err(Error::Config(format!(
            "Unknown reranker model: '{}'. Supported models: {}",
            other,
            SUPPORTED_MODELS.join(", ")
        ))),
    }
}

#[cfg(feature = "local-models-fastembed")]
struct FastembedCrossEncoder {
    model: Arc<std::sync::Mutex<fastembed::TextRerank>>,
}

#[cfg(feature = "local-models-fastembed")]
#[async_trait]
impl CrossEncoder for FastembedCrossEncoder {
    async fn score(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>> {
        let model = Arc::clone(&self.model);
        let query = query.to_string();
        let documents: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let count = documents.len();

        let results = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let docs: Vec<&str> = documents.iter().map(String::as_str).collect();
            model.rerank(query.as_str(), docs, false, None)
        })
        .await
        .map_err(|e| Error::unavailable("reranker", e))?
        .map_err(|e| Error::unavailable("reranker", e))?;

        // fastembed returns results sorted by score; put them back in input order.
        let mut scores = vec![0.0f32; count];
        for result in results {
            if let Some(slot) = scores.get_mut(result.index) {
                *slot = result.score;
            }
        }
        Ok(scores)
    }
}
