//! TOML configuration.
//!
//! Every section is optional; omitted values fall back to the defaults
//! below. [`load_config`] parses and validates a file, rejecting settings
//! that would otherwise only fail later (an overlap not smaller than the
//! chunk size, an unknown embedding provider, a zero memory window).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use agentic_rag_core::chunk::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use agentic_rag_core::conversation::DEFAULT_WINDOW;
use agentic_rag_core::retrieval::DEFAULT_K;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Persist directory holding the index files.
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./vector_store")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub default_k: usize,
    #[serde(default)]
    pub enable_reranker: bool,
    #[serde(default = "default_reranker_model")]
    pub reranker_model: String,
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: DEFAULT_K,
            enable_reranker: false,
            reranker_model: default_reranker_model(),
            similarity_threshold: None,
        }
    }
}

fn default_k() -> usize {
    DEFAULT_K
}
fn default_reranker_model() -> String {
    "bge-reranker-base".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
            url: None,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    /// Directory processed by `rag process` when no path is given.
    #[serde(default = "default_documents_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            root: default_documents_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_documents_root() -> PathBuf {
    PathBuf::from("./documents")
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
        "**/*.pdf".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    /// Messages kept per conversation thread.
    #[serde(default = "default_window")]
    pub window: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
        }
    }
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }

    // Validate retrieval
    if config.retrieval.default_k < 1 {
        anyhow::bail!("retrieval.default_k must be >= 1");
    }

    if config.memory.window < 1 {
        anyhow::bail!("memory.window must be >= 1");
    }

    // Validate embedding
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }

    match config.embedding.provider.as_str() {
        "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() {
                anyhow::bail!(
                    "embedding.dims must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be local, openai, or ollama.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.index.path, PathBuf::from("./vector_store"));
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.retrieval.default_k, 4);
        assert!(!config.retrieval.enable_reranker);
        assert_eq!(config.embedding.provider, "local");
        assert_eq!(config.memory.window, 10);
        assert_eq!(config.documents.include_globs.len(), 3);
    }

    #[test]
    fn overlap_not_smaller_than_size_is_rejected() {
        let err = parse("[chunking]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = parse("[embedding]\nprovider = \"magic\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn remote_providers_need_model_and_dims() {
        assert!(parse("[embedding]\nprovider = \"openai\"\n").is_err());
        assert!(parse(
            "[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\ndims = 768\n"
        )
        .is_ok());
    }

    #[test]
    fn zero_window_is_rejected() {
        assert!(parse("[memory]\nwindow = 0\n").is_err());
    }
}
