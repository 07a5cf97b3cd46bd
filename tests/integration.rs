//! End-to-end tests for the `rag` binary.
//!
//! Only commands that never build an embedding model run here, so the
//! suite needs no network access or model download.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn rag_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_rag"))
}

fn setup_test_env(extra: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let docs_dir = root.join("documents");
    fs::create_dir_all(&docs_dir).unwrap();
    fs::write(
        docs_dir.join("alpha.md"),
        "# Alpha\n\nThe alpha document is about Rust programming.",
    )
    .unwrap();

    let config_content = format!(
        r#"[index]
path = "{root}/vector_store"

[chunking]
chunk_size = 500
chunk_overlap = 50

[retrieval]
default_k = 3

[documents]
root = "{root}/documents"

{extra}
"#,
        root = root.display(),
        extra = extra
    );

    let config_path = config_dir.join("rag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_rag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = rag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("OPENAI_API_KEY")
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run rag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_index() {
    let (tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_rag(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("vector_store/index.sqlite").is_file());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env("");

    let (_, _, first) = run_rag(&config_path, &["init"]);
    assert!(first, "First init failed");
    let (_, _, second) = run_rag(&config_path, &["init"]);
    assert!(second, "Second init failed (not idempotent)");
}

#[test]
fn test_info_on_empty_index() {
    let (_tmp, config_path) = setup_test_env("");
    run_rag(&config_path, &["init"]);

    let (stdout, stderr, success) = run_rag(&config_path, &["info"]);
    assert!(success, "info failed: {}", stderr);
    assert!(stdout.contains("Entries:     0"));
    assert!(stdout.contains("Ready:       no"));
    assert!(stdout.contains("Reranker:    disabled"));
}

#[test]
fn test_info_json() {
    let (_tmp, config_path) = setup_test_env("[memory]\nwindow = 4\n");
    let (stdout, stderr, success) = run_rag(&config_path, &["info", "--json"]);
    assert!(success, "info --json failed: {}", stderr);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["index"]["entries"], 0);
    assert_eq!(report["index"]["ready"], false);
    assert_eq!(report["reranker"]["configured"], false);
    assert_eq!(report["reranker"]["model"], "bge-reranker-base");
}

#[test]
fn test_info_reports_configured_reranker_without_loading_it() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("rag.toml");
    fs::write(
        &config_path,
        format!(
            "[index]\npath = \"{}/vector_store\"\n\n[retrieval]\nenable_reranker = true\nreranker_model = \"not-a-real-reranker\"\n",
            tmp.path().display()
        ),
    )
    .unwrap();
    run_rag(&config_path, &["init"]);

    let (stdout, stderr, success) = run_rag(&config_path, &["info"]);
    assert!(success, "info failed: {}", stderr);
    assert!(
        stdout.contains("Reranker:    configured (not-a-real-reranker)"),
        "unexpected output: {}",
        stdout
    );
}

#[test]
fn test_search_before_processing_reports_unavailable() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_rag(&config_path, &["search", "rust"]);
    assert!(success, "search failed: {}", stderr);
    assert!(
        stdout.contains("Knowledge base is not available"),
        "unexpected output: {}",
        stdout
    );

    let (stdout, _, success) = run_rag(&config_path, &["context", "rust"]);
    assert!(success);
    assert!(stdout.contains("Knowledge base is not available"));
}

#[test]
fn test_search_rejects_bad_filter() {
    let (_tmp, config_path) = setup_test_env("");

    let (_, stderr, success) = run_rag(&config_path, &["search", "rust", "--filter", "nokey"]);
    assert!(!success);
    assert!(stderr.contains("filter") || stderr.contains("="), "stderr: {}", stderr);
}

#[test]
fn test_rerank_flags_conflict() {
    let (_tmp, config_path) = setup_test_env("");
    let (_, _, success) = run_rag(&config_path, &["search", "rust", "--rerank", "--no-rerank"]);
    assert!(!success);
}

#[test]
fn test_clear_removes_index_files() {
    let (tmp, config_path) = setup_test_env("");
    run_rag(&config_path, &["init"]);
    let store = tmp.path().join("vector_store");
    assert!(store.join("index.sqlite").is_file());

    let (stdout, stderr, success) = run_rag(&config_path, &["clear"]);
    assert!(success, "clear failed: {}", stderr);
    assert!(stdout.contains("Index cleared"));
    assert!(store.is_dir());
    assert!(!store.join("index.sqlite").exists());
}

#[test]
fn test_invalid_chunking_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("rag.toml");
    fs::write(&config_path, "[chunking]\nchunk_size = 100\nchunk_overlap = 150\n").unwrap();

    let (_, stderr, success) = run_rag(&config_path, &["info"]);
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"), "stderr: {}", stderr);
}

#[test]
fn test_missing_config_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_rag(&tmp.path().join("absent.toml"), &["info"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "stderr: {}", stderr);
}

#[test]
fn test_unavailable_embedding_backend_is_fatal() {
    let (_tmp, config_path) = setup_test_env(
        "[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\ndims = 1536\n",
    );

    let (_, stderr, success) = run_rag(&config_path, &["process"]);
    assert!(!success, "process should fail without OPENAI_API_KEY");
    assert!(stderr.contains("OPENAI_API_KEY"), "stderr: {}", stderr);
}
