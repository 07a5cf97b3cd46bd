//! Embedding backends.
//!
//! Concrete [`EmbeddingProvider`] implementations:
//! - **[`LocalProvider`]** runs a fastembed model in-process; no network
//!   calls after the first model download.
//! - **[`OpenAIProvider`]** calls the OpenAI embeddings API with retry and backoff.
//! - **[`OllamaProvider`]** calls a local Ollama instance's `/api/embed` endpoint.
//!
//! # Construction is the availability check
//!
//! [`create_provider`] fails with [`Error::ResourceUnavailable`] when the
//! backend cannot be used: the local model fails to load, `OPENAI_API_KEY`
//! is missing, or Ollama does not answer. Callers treat that as fatal.
//!
//! # Retry Strategy
//!
//! The OpenAI and Ollama providers use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use tracing::{debug, info};

use agentic_rag_core::embedding::EmbeddingProvider;
use agentic_rag_core::{Error, Result};

use crate::config::EmbeddingConfig;

/// Create the [`EmbeddingProvider`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"local"` | [`LocalProvider`] (requires the `local-models-fastembed` feature) |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
pub async fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider.as_str() {
        #[cfg(feature = "local-models-fastembed")]
        "local" => Arc::new(LocalProvider::load(config).await?),
        #[cfg(not(feature = "local-models-fastembed"))]
        "local" => {
            return Err(Error::unavailable(
                "local",
                "local embeddings require building with --features local-models-fastembed",
            ))
        }
        "openai" => Arc::new(OpenAIProvider::new(config)?),
        "ollama" => Arc::new(OllamaProvider::connect(config).await?),
        other => {
            return Err(Error::Config(format!(
                "Unknown embedding provider: {}",
                other
            )))
        }
    };
    info!(
        provider = %config.provider,
        model = provider.model_name(),
        dims = provider.dims(),
        "embedding provider ready"
    );
    Ok(provider)
}

fn http_client(config: &EmbeddingConfig, resource: &str) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| Error::unavailable(resource, e))
}

fn required<T: Clone>(value: &Option<T>, key: &str, provider: &str) -> Result<T> {
    value.clone().ok_or_else(|| {
        Error::Config(format!(
            "embedding.{} required for {} provider",
            key, provider
        ))
    })
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Calls the `POST /v1/embeddings` endpoint with the configured model.
/// Requires the `OPENAI_API_KEY` environment variable to be set.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = required(&config.model, "model", "OpenAI")?;
        let dims = required(&config.dims, "dims", "OpenAI")?;
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            Error::unavailable("openai", "OPENAI_API_KEY environment variable not set")
        })?;

        Ok(Self {
            model,
            dims,
            api_key,
            max_retries: config.max_retries,
            client: http_client(config, "openai")?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = post_json_with_retry(
            || {
                self.client
                    .post("https://api.openai.com/v1/embeddings")
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .json(&body)
            },
            self.max_retries,
            "OpenAI",
        )
        .await
        .and_then(|json| parse_openai_response(&json))
        .map_err(|e| Error::embedding(&self.model, format!("{:#}", e)))?;
        Ok(json)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> anyhow::Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, to_f32_vec(embedding)));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default
/// `http://localhost:11434`). Requires Ollama to be running with the
/// embedding model pulled (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaProvider {
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Build the provider and probe `GET /api/tags` so an unreachable
    /// server fails here rather than on the first ingestion.
    pub async fn connect(config: &EmbeddingConfig) -> Result<Self> {
        let model = required(&config.model, "model", "Ollama")?;
        let dims = required(&config.dims, "dims", "Ollama")?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        let client = http_client(config, "ollama")?;

        let probe = client
            .get(format!("{}/api/tags", url))
            .send()
            .await
            .and_then(|r| r.error_for_status());
        if let Err(e) = probe {
            return Err(Error::unavailable(
                "ollama",
                format!("is Ollama running at {}? {}", url, e),
            ));
        }
        debug!(url = %url, "ollama reachable");

        Ok(Self {
            model,
            dims,
            url,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        post_json_with_retry(
            || self.client.post(format!("{}/api/embed", self.url)).json(&body),
            self.max_retries,
            "Ollama",
        )
        .await
        .and_then(|json| parse_ollama_response(&json))
        .map_err(|e| Error::embedding(&self.model, format!("{:#}", e)))
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> anyhow::Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|embedding| {
            embedding
                .as_array()
                .map(|values| to_f32_vec(values))
                .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: embedding is not an array"))
        })
        .collect()
}

fn to_f32_vec(values: &[serde_json::Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}

/// Send a JSON request, retrying rate limits, server errors and network
/// failures with exponential backoff.
async fn post_json_with_retry<F>(
    build: F,
    max_retries: u32,
    service: &str,
) -> anyhow::Result<serde_json::Value>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow::anyhow!(
                        "{} API error {}: {}",
                        service,
                        status,
                        body_text
                    ));
                    continue;
                }

                bail!("{} API error {}: {}", service, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow::anyhow!("{} connection error: {}", service, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} request failed after retries", service)))
}

// ============ Local Provider (fastembed) ============

/// Resolve the local model name and its dimensionality.
pub fn resolve_local_model(config: &EmbeddingConfig) -> (String, usize) {
    let model_name = config
        .model
        .clone()
        .unwrap_or_else(|| "all-minilm-l6-v2".to_string());

    let dims = config.dims.unwrap_or(match model_name.as_str() {
        "bge-base-en-v1.5" | "nomic-embed-text-v1.5" | "multilingual-e5-base" => 768,
        "bge-large-en-v1.5" | "multilingual-e5-large" => 1024,
        _ => 384,
    });

    (model_name, dims)
}

/// Embedding provider running a fastembed model in-process.
///
/// The model is loaded once at construction; inference runs on the
/// blocking thread pool.
#[cfg(feature = "local-models-fastembed")]
pub struct LocalProvider {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: Arc<std::sync::Mutex<fastembed::TextEmbedding>>,
}

#[cfg(feature = "local-models-fastembed")]
impl LocalProvider {
    pub async fn load(config: &EmbeddingConfig) -> Result<Self> {
        let (model_name, dims) = resolve_local_model(config);
        let fastembed_model = config_to_fastembed_model(&model_name)?;

        let model = tokio::task::spawn_blocking(move || {
            fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(fastembed_model).with_show_download_progress(true),
            )
        })
        .await
        .map_err(|e| Error::unavailable("local", e))?
        .map_err(|e| {
            Error::unavailable(
                "local",
                format!("failed to initialize local embedding model: {}", e),
            )
        })?;

        Ok(Self {
            model_name,
            dims,
            batch_size: config.batch_size,
            model: Arc::new(std::sync::Mutex::new(model)),
        })
    }
}

#[cfg(feature = "local-models-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => Err(Error::Config(format!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1.5, multilingual-e5-small, multilingual-e5-base, \
             multilingual-e5-large",
            other
        ))),
    }
}

#[cfg(feature = "local-models-fastembed")]
#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            model.embed(texts, Some(batch_size))
        })
        .await
        .map_err(|e| Error::embedding(&self.model_name, e))?
        .map_err(|e| Error::embedding(&self.model_name, format!("local embedding failed: {}", e)))
    }
}
