//! # Agentic RAG CLI (`rag`)
//!
//! ## Usage
//!
//! ```bash
//! rag --config ./config/rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag init` | Create the index directory and schema |
//! | `rag process [path]` | Index a documents directory |
//! | `rag add <file>` | Index a single file |
//! | `rag add-text "<text>"` | Index a text snippet |
//! | `rag search "<query>"` | Retrieve matching chunks |
//! | `rag context "<query>"` | Print the context string an agent would receive |
//! | `rag info` | Show index statistics |
//! | `rag clear` | Delete the index |

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use agentic_rag::search::SearchArgs;
use agentic_rag::{config, ingest, logging, search, stats};

/// Agentic RAG CLI: ingest documents and retrieve context for AI agents.
#[derive(Parser)]
#[command(
    name = "rag",
    about = "Agentic RAG — document ingestion and context retrieval for AI agents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/rag.toml`. A missing file is an error unless
    /// it is the default path, in which case built-in defaults are used.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Log progress at `info` level (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

const DEFAULT_CONFIG: &str = "./config/rag.toml";

#[derive(Subcommand)]
enum Commands {
    /// Initialize the index directory and schema. Idempotent.
    Init,

    /// Index every supported file in a directory.
    Process {
        /// Documents directory. Defaults to `[documents].root`.
        path: Option<PathBuf>,

        /// Delete the existing index before processing.
        #[arg(long)]
        clear: bool,
    },

    /// Index a single txt, md or pdf file.
    Add {
        file: PathBuf,

        /// Extra metadata as `key=value` (repeatable).
        #[arg(long = "meta", value_parser = parse_key_val)]
        meta: Vec<(String, String)>,
    },

    /// Index a text snippet.
    AddText {
        text: String,

        /// Extra metadata as `key=value` (repeatable). `source` defaults to `text`.
        #[arg(long = "meta", value_parser = parse_key_val)]
        meta: Vec<(String, String)>,
    },

    /// Retrieve the chunks most relevant to a query.
    Search {
        query: String,

        /// Number of results. Defaults to `[retrieval].default_k`.
        #[arg(long)]
        k: Option<usize>,

        /// Force reranking on.
        #[arg(long, conflicts_with = "no_rerank")]
        rerank: bool,

        /// Force reranking off.
        #[arg(long)]
        no_rerank: bool,

        /// Results kept after reranking. Defaults to `k`.
        #[arg(long)]
        rerank_top_k: Option<usize>,

        /// Drop candidates whose cosine similarity is below this value.
        #[arg(long)]
        threshold: Option<f32>,

        /// Exact-match metadata filter, e.g. `lang=en,page=2`.
        #[arg(long)]
        filter: Option<String>,

        /// Show scores.
        #[arg(long)]
        scores: bool,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the context string an agent would receive for a query.
    Context {
        query: String,

        #[arg(long)]
        k: Option<usize>,

        /// Prefix each chunk with its metadata.
        #[arg(long)]
        metadata: bool,
    },

    /// Show index statistics.
    Info {
        #[arg(long)]
        json: bool,
    },

    /// Delete every indexed entry.
    Clear,
}

/// Parse a `key=value` pair for `--meta` arguments.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    let key = s[..pos].trim();
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in '{}'", s));
    }
    Ok((key.to_string(), s[pos + 1..].to_string()))
}

fn load_config(path: &Path) -> anyhow::Result<config::Config> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG) {
        return Ok(config::Config::default());
    }
    config::load_config(path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            stats::run_init(&cfg).await?;
        }
        Commands::Process { path, clear } => {
            ingest::run_process(&cfg, path.as_deref(), clear).await?;
        }
        Commands::Add { file, meta } => {
            ingest::run_add(&cfg, &file, &meta).await?;
        }
        Commands::AddText { text, meta } => {
            ingest::run_add_text(&cfg, &text, &meta).await?;
        }
        Commands::Search {
            query,
            k,
            rerank,
            no_rerank,
            rerank_top_k,
            threshold,
            filter,
            scores,
            json,
        } => {
            let rerank = match (rerank, no_rerank) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            let args = SearchArgs {
                query,
                k,
                rerank,
                rerank_top_k,
                threshold,
                filter,
                scores,
                json,
            };
            search::run_search(&cfg, &args).await?;
        }
        Commands::Context { query, k, metadata } => {
            search::run_context(&cfg, &query, k, metadata).await?;
        }
        Commands::Info { json } => {
            stats::run_info(&cfg, json).await?;
        }
        Commands::Clear => {
            stats::run_clear(&cfg)?;
        }
    }

    Ok(())
}
