//! # Agentic RAG
//!
//! Local retrieval-augmented generation: ingest documents into a persistent
//! vector index, retrieve and optionally rerank context for a query, and
//! keep bounded per-thread conversation memory for an agent loop.
//!
//! The storage-free logic (chunking, the index trait, reranking, retrieval,
//! memory) lives in the `agentic-rag-core` crate. This crate adds the
//! concrete backends and the `rag` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │   Loader    │──▶│   Chunker   │──▶│ SQLite index │
//! │ txt/md/pdf  │   │  recursive  │   │  + embedder  │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │
//!                                   ┌────────▼────────┐
//!                                   │   Retrieval     │
//!                                   │ cosine → rerank │
//!                                   └────────┬────────┘
//!                                            ▼
//!                                    context string
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rag init                        # create the index
//! rag process ./documents         # ingest a directory
//! rag search "deployment" --scores
//! rag context "how do I deploy?"  # what an agent would see
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | Text extraction for txt, md and pdf |
//! | [`loader`] | Directory walking and upload decoding |
//! | [`ingest`] | Ingestion pipeline |
//! | [`embedding`] | Embedding backends |
//! | [`rerank`] | Cross-encoder backend |
//! | [`sqlite_index`] | Persistent vector index |
//! | [`services`] | Service wiring |
//! | [`search`] | `search` and `context` commands |
//! | [`stats`] | `init`, `info` and `clear` commands |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod loader;
pub mod logging;
pub mod migrate;
pub mod rerank;
pub mod search;
pub mod services;
pub mod sqlite_index;
pub mod stats;
