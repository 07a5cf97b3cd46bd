//! Document loading from the filesystem and from raw uploads.
//!
//! Directory loads walk the tree with `walkdir`, keep files matching the
//! `[documents]` include globs, drop excluded paths, and extract each file
//! with [`crate::extract`]. A file that fails to read or extract is logged
//! and skipped; the rest of the directory still loads.

use std::path::Path;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use agentic_rag_core::models::{Document, Metadata, MetadataValue, PAGE_KEY, SOURCE_KEY};
use agentic_rag_core::{Error, Result};

use crate::config::DocumentsConfig;
use crate::extract;

/// Largest accepted upload, in bytes.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

const DEFAULT_EXCLUDES: [&str; 3] = ["**/.git/**", "**/target/**", "**/node_modules/**"];

pub struct DocumentLoader {
    include: GlobSet,
    exclude: GlobSet,
    follow_symlinks: bool,
}

impl DocumentLoader {
    pub fn new(config: &DocumentsConfig) -> Result<Self> {
        let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
        excludes.extend(config.exclude_globs.iter().cloned());
        Ok(Self {
            include: build_globset(&config.include_globs)?,
            exclude: build_globset(&excludes)?,
            follow_symlinks: config.follow_symlinks,
        })
    }

    /// Load every matching file under `root`, sorted by path.
    ///
    /// # Errors
    ///
    /// Fails only when `root` is missing or not a directory. Per-file
    /// failures are skipped with a warning.
    pub fn load_directory(&self, root: &Path) -> Result<Vec<Document>> {
        if !root.is_dir() {
            return Err(Error::InvalidArgument(format!(
                "documents path is not a directory: {}",
                root.display()
            )));
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(root).follow_links(self.follow_symlinks) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy();
            if self.exclude.is_match(rel_str.as_ref()) || !self.include.is_match(rel_str.as_ref()) {
                continue;
            }
            paths.push(path.to_path_buf());
        }
        paths.sort();

        let mut documents = Vec::new();
        for path in &paths {
            match self.load_file(path) {
                Ok(mut docs) => documents.append(&mut docs),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping file"),
            }
        }
        debug!(
            root = %root.display(),
            files = paths.len(),
            documents = documents.len(),
            "loaded documents"
        );
        Ok(documents)
    }

    /// Load a single file. `source` is the path as given.
    pub fn load_file(&self, path: &Path) -> Result<Vec<Document>> {
        let name = path.to_string_lossy();
        extract::FileKind::from_name(&name)?;
        let bytes = std::fs::read(path)?;
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_KEY.to_string(), MetadataValue::from(name.as_ref()));
        documents_from_bytes(&bytes, &name, metadata)
    }
}

/// Extract documents from in-memory bytes. Each document gets a copy of
/// `metadata`; PDF pages additionally carry a 1-based `page`.
pub fn documents_from_bytes(bytes: &[u8], name: &str, metadata: Metadata) -> Result<Vec<Document>> {
    let spans = extract::extract(bytes, name)?;
    Ok(spans
        .into_iter()
        .map(|span| {
            let mut meta = metadata.clone();
            if let Some(page) = span.page {
                meta.insert(PAGE_KEY.to_string(), MetadataValue::Int(i64::from(page)));
            }
            Document::new(span.text, meta)
        })
        .collect())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        // Extensions match case-insensitively, like `FileKind::from_name`.
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::Config(format!("invalid glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::Config(format!("invalid glob set: {}", e)))
}
