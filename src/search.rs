//! `rag search` and `rag context`.
//!
//! Both commands check the index on disk before building any model, so a
//! fresh or cleared index answers immediately with the not-available
//! message instead of downloading an embedder.

use anyhow::Result;
use serde::Serialize;

use agentic_rag_core::index::MetadataFilter;
use agentic_rag_core::models::Metadata;
use agentic_rag_core::retrieval::{ContextOptions, KnowledgeContext, RetrieveOptions};

use crate::config::Config;
use crate::services::Services;
use crate::stats;

/// Flags accepted by `rag search`.
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub query: String,
    pub k: Option<usize>,
    /// `Some(true)` for `--rerank`, `Some(false)` for `--no-rerank`.
    pub rerank: Option<bool>,
    pub rerank_top_k: Option<usize>,
    pub threshold: Option<f32>,
    pub filter: Option<String>,
    pub scores: bool,
    pub json: bool,
}

#[derive(Serialize)]
struct SearchHit<'a> {
    rank: usize,
    score: f32,
    content: &'a str,
    metadata: &'a Metadata,
}

/// Build retrieval options from CLI flags, falling back to `[retrieval]`.
pub fn retrieve_options(config: &Config, args: &SearchArgs) -> Result<RetrieveOptions> {
    let k = args.k.unwrap_or(config.retrieval.default_k);
    if k == 0 {
        anyhow::bail!("--k must be >= 1");
    }
    let mut options = RetrieveOptions::new(k);
    if let Some(enabled) = args.rerank {
        options = options.use_reranker(enabled);
    }
    if let Some(top_k) = args.rerank_top_k {
        options = options.rerank_top_k(top_k);
    }
    if let Some(threshold) = args.threshold.or(config.retrieval.similarity_threshold) {
        options = options.similarity_threshold(threshold);
    }
    if let Some(raw) = &args.filter {
        options = options.metadata_filter(MetadataFilter::parse(raw)?);
    }
    Ok(options)
}

pub async fn run_search(config: &Config, args: &SearchArgs) -> Result<()> {
    // Validate flags before touching the index or any model.
    let options = retrieve_options(config, args)?;

    if stats::entry_count(&config.index.path).await? == 0 {
        println!("{}", KnowledgeContext::NotReady.to_tool_output());
        return Ok(());
    }

    let services = Services::open(config).await?;
    let results = services
        .retrieval
        .retrieve_with_scores(&args.query, &options)
        .await?;

    if args.json {
        let hits: Vec<SearchHit> = results
            .iter()
            .enumerate()
            .map(|(i, r)| SearchHit {
                rank: i + 1,
                score: r.score,
                content: r.chunk.content(),
                metadata: r.chunk.metadata(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        let source = result
            .chunk
            .source()
            .map(|s| s.to_string())
            .unwrap_or_default();
        if args.scores {
            println!("{}. [{:.4}] {}", i + 1, result.score, source);
        } else {
            println!("{}. {}", i + 1, source);
        }
        let extras: Vec<String> = result
            .chunk
            .metadata()
            .iter()
            .filter(|(key, _)| key.as_str() != "source")
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        if !extras.is_empty() {
            println!("    metadata: {}", extras.join(", "));
        }
        println!(
            "    excerpt: \"{}\"",
            excerpt(result.chunk.content(), 200).replace('\n', " ").trim()
        );
        println!();
    }
    Ok(())
}

/// Print the context string an agent would receive for `query`.
pub async fn run_context(
    config: &Config,
    query: &str,
    k: Option<usize>,
    include_metadata: bool,
) -> Result<()> {
    if stats::entry_count(&config.index.path).await? == 0 {
        println!("{}", KnowledgeContext::NotReady.to_tool_output());
        return Ok(());
    }

    let k = k.unwrap_or(config.retrieval.default_k).max(1);
    let mut options = RetrieveOptions::new(k);
    if let Some(threshold) = config.retrieval.similarity_threshold {
        options = options.similarity_threshold(threshold);
    }

    let services = Services::open(config).await?;
    let context = services
        .retrieval
        .context_string(
            query,
            &options,
            &ContextOptions {
                include_metadata,
                ..ContextOptions::default()
            },
        )
        .await?;

    if context.is_empty() {
        println!("{}", KnowledgeContext::NoMatches.to_tool_output());
    } else {
        println!("{}", context);
    }
    Ok(())
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
fn excerpt(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_counts_characters() {
        assert_eq!(excerpt("héllo", 10), "héllo");
        assert_eq!(excerpt("héllo", 2), "hé…");
    }

    #[test]
    fn options_fall_back_to_config() {
        let mut config = Config::default();
        config.retrieval.similarity_threshold = Some(0.3);
        let options = retrieve_options(&config, &SearchArgs::default()).unwrap();
        assert_eq!(options.k, 4);
        assert_eq!(options.use_reranker, None);
        assert_eq!(options.similarity_threshold, Some(0.3));
    }

    #[test]
    fn flags_override_config() {
        let args = SearchArgs {
            k: Some(2),
            rerank: Some(false),
            rerank_top_k: Some(1),
            threshold: Some(0.5),
            filter: Some("lang=en,page=2".to_string()),
            ..SearchArgs::default()
        };
        let options = retrieve_options(&Config::default(), &args).unwrap();
        assert_eq!(options.k, 2);
        assert_eq!(options.use_reranker, Some(false));
        assert_eq!(options.rerank_top_k, Some(1));
        assert_eq!(options.similarity_threshold, Some(0.5));
        assert!(options.metadata_filter.is_some());
    }

    #[test]
    fn bad_filter_and_zero_k_are_rejected() {
        let args = SearchArgs {
            filter: Some("no-equals".to_string()),
            ..SearchArgs::default()
        };
        assert!(retrieve_options(&Config::default(), &args).is_err());

        let args = SearchArgs {
            k: Some(0),
            ..SearchArgs::default()
        };
        assert!(retrieve_options(&Config::default(), &args).is_err());
    }
}
