//! Index statistics and housekeeping commands.
//!
//! `rag init`, `rag info` and `rag clear` work on the SQLite file directly
//! and never construct an embedding backend, so they stay fast and work
//! offline even when the configured model is unavailable.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::sqlite_index::{data_file, reset_directory};

/// Per-source breakdown of indexed entries.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStats {
    pub source: String,
    pub entries: i64,
    pub last_added: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub entries: usize,
    pub ready: bool,
    pub size_bytes: u64,
    pub models: Vec<String>,
    pub sources: Vec<SourceStats>,
}

async fn open(dir: &Path) -> Result<SqlitePool> {
    let path = data_file(dir);
    let pool = db::connect(&path)
        .await
        .with_context(|| format!("Failed to open index: {}", path.display()))?;
    migrate::run_migrations(&pool).await?;
    Ok(pool)
}

/// Create the persist directory and schema. Idempotent.
pub async fn run_init(config: &Config) -> Result<()> {
    let pool = open(&config.index.path).await?;
    pool.close().await;
    println!("Index initialized at {}", config.index.path.display());
    Ok(())
}

/// Number of entries in the index at `dir`, without opening an embedder.
/// A missing data file counts as empty.
pub async fn entry_count(dir: &Path) -> Result<usize> {
    if !data_file(dir).is_file() {
        return Ok(0);
    }
    let pool = open(dir).await?;
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
        .fetch_one(&pool)
        .await?;
    pool.close().await;
    Ok(n as usize)
}

/// Collect statistics for the index at `dir`.
pub async fn collect(dir: &Path) -> Result<IndexStats> {
    let path = data_file(dir);
    if !path.is_file() {
        return Ok(IndexStats {
            entries: 0,
            ready: false,
            size_bytes: 0,
            models: Vec::new(),
            sources: Vec::new(),
        });
    }

    let pool = open(dir).await?;
    let entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
        .fetch_one(&pool)
        .await?;
    let models: Vec<String> = sqlx::query_scalar("SELECT DISTINCT model FROM entries ORDER BY model")
        .fetch_all(&pool)
        .await?;
    let source_rows = sqlx::query(
        r#"
        SELECT source, COUNT(*) AS entries, MAX(created_at) AS last_added
        FROM entries
        GROUP BY source
        ORDER BY entries DESC, source ASC
        "#,
    )
    .fetch_all(&pool)
    .await?;
    pool.close().await;

    let sources = source_rows
        .iter()
        .map(|row| SourceStats {
            source: row.get("source"),
            entries: row.get("entries"),
            last_added: row.get("last_added"),
        })
        .collect();

    Ok(IndexStats {
        entries: entries as usize,
        ready: entries > 0,
        size_bytes: std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0),
        models,
        sources,
    })
}

/// Print the `rag info` report.
///
/// The reranker line reflects configuration only; the model is not loaded
/// here. Whether it loaded is reported by `RetrievalService::store_info`.
pub async fn run_info(config: &Config, json: bool) -> Result<()> {
    let stats = collect(&config.index.path).await?;

    if json {
        let report = serde_json::json!({
            "persist_directory": config.index.path,
            "index": stats,
            "reranker": {
                "configured": config.retrieval.enable_reranker,
                "model": config.retrieval.reranker_model,
            },
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Agentic RAG — Index Info");
    println!("========================");
    println!();
    println!("  Directory:   {}", config.index.path.display());
    println!("  Size:        {}", format_bytes(stats.size_bytes));
    println!("  Entries:     {}", stats.entries);
    println!("  Ready:       {}", if stats.ready { "yes" } else { "no" });
    if !stats.models.is_empty() {
        println!("  Embeddings:  {}", stats.models.join(", "));
    }
    println!(
        "  Reranker:    {}",
        if config.retrieval.enable_reranker {
            format!("configured ({})", config.retrieval.reranker_model)
        } else {
            "disabled".to_string()
        }
    );

    if !stats.sources.is_empty() {
        println!();
        println!("  By source:");
        println!("  {:<48} {:>8}   {}", "SOURCE", "ENTRIES", "LAST ADDED");
        println!("  {}", "-".repeat(76));
        for s in &stats.sources {
            println!(
                "  {:<48} {:>8}   {}",
                s.source,
                s.entries,
                format_ts_iso(s.last_added)
            );
        }
    }
    println!();
    Ok(())
}

/// Remove every entry and file under the persist directory.
pub fn run_clear(config: &Config) -> Result<()> {
    reset_directory(&config.index.path)
        .with_context(|| format!("Failed to clear {}", config.index.path.display()))?;
    println!("Index cleared: {}", config.index.path.display());
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn byte_formatting() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[tokio::test]
    async fn missing_index_is_empty_and_not_created() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("store");
        assert_eq!(entry_count(&store).await.unwrap(), 0);
        let stats = collect(&store).await.unwrap();
        assert!(!stats.ready);
        assert!(!store.exists());
    }
}
