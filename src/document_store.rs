//! Upload directory scanning: files → extracted text → addressed chunks.
//!
//! Walks the upload directory recursively in file-name order, skips files
//! whose extension is not a supported format, extracts each remaining file,
//! and splits its text with the configured chunker. A file that fails to
//! extract is logged, recorded, and skipped; it never aborts the scan.
//!
//! A source's id is its path relative to the upload directory, using `/`
//! separators. For files directly in the upload directory this is simply
//! the file name.

use std::path::{Path, PathBuf};

use docchat_core::chunk::{chunk_source, ChunkerConfig};
use docchat_core::models::SourceChunk;
use docchat_core::{RagError, RagResult};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::config::{Config, ScanConfig};
use crate::extract::{extract_text, DocumentFormat};

/// Patterns that are never ingested: Office lock files and hidden entries.
const DEFAULT_EXCLUDES: &[&str] = &["**/~$*", "**/.*", "**/.*/**"];

/// A supported file found under the upload directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub source_id: String,
    pub path: PathBuf,
    pub format: DocumentFormat,
}

/// A source file after extraction and chunking.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub file: SourceFile,
    pub bytes: Vec<u8>,
    pub text: String,
    pub chunks: Vec<SourceChunk>,
}

impl LoadedSource {
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.bytes)
    }
}

/// Summary of a source that contributed chunks to a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedSource {
    pub source_id: String,
    /// SHA-256 of the file bytes, hex encoded.
    pub fingerprint: String,
    pub chunk_count: usize,
}

/// A source skipped because extraction failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSource {
    pub source_id: String,
    pub reason: String,
}

/// Result of a full scan.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    /// All chunks, grouped by source in scan order, ordinals ascending.
    pub chunks: Vec<SourceChunk>,
    pub sources: Vec<ScannedSource>,
    pub skipped: Vec<SkippedSource>,
}

pub struct DocumentStore {
    root: PathBuf,
    chunker: ChunkerConfig,
    exclude: GlobSet,
    follow_symlinks: bool,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>, chunker: ChunkerConfig, scan: &ScanConfig) -> RagResult<Self> {
        chunker.validate()?;
        let mut patterns: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
        patterns.extend(scan.exclude_globs.iter().cloned());
        Ok(Self {
            root: root.into(),
            chunker,
            exclude: build_globset(&patterns)?,
            follow_symlinks: scan.follow_symlinks,
        })
    }

    pub fn from_config(config: &Config) -> RagResult<Self> {
        Self::new(
            config.paths.upload_dir.clone(),
            config.chunking.chunker(),
            &config.scan,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chunker(&self) -> ChunkerConfig {
        self.chunker
    }

    /// Same store with different chunking parameters.
    pub fn with_chunker(&self, chunker: ChunkerConfig) -> RagResult<Self> {
        chunker.validate()?;
        Ok(Self {
            root: self.root.clone(),
            chunker,
            exclude: self.exclude.clone(),
            follow_symlinks: self.follow_symlinks,
        })
    }

    /// Lazily enumerate supported files in file-name order.
    ///
    /// Unsupported and excluded files are skipped silently; unreadable
    /// directory entries are logged and skipped.
    pub fn files(&self) -> impl Iterator<Item = SourceFile> + '_ {
        WalkDir::new(&self.root)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(root = %self.root.display(), error = %e, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let path = entry.path();
                let source_id = source_id_for(&self.root, path);
                if self.exclude.is_match(&source_id) {
                    return None;
                }
                let format = DocumentFormat::from_path(path)?;
                Some(SourceFile {
                    source_id,
                    path: path.to_path_buf(),
                    format,
                })
            })
    }

    /// Read, extract, and chunk one file.
    pub fn load(&self, file: &SourceFile) -> RagResult<LoadedSource> {
        let bytes = std::fs::read(&file.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RagError::SourceNotFound(file.source_id.clone())
            } else {
                RagError::Extraction {
                    source_id: file.source_id.clone(),
                    message: e.to_string(),
                }
            }
        })?;
        let text = extract_text(&bytes, file.format).map_err(|e| RagError::Extraction {
            source_id: file.source_id.clone(),
            message: e.to_string(),
        })?;
        let chunks = chunk_source(&file.source_id, &text, &self.chunker)?;
        Ok(LoadedSource {
            file: file.clone(),
            bytes,
            text,
            chunks,
        })
    }

    /// Resolve a source id to a file under the upload directory.
    ///
    /// # Errors
    ///
    /// - [`RagError::SourceNotFound`] if the file does not exist or the id
    ///   would escape the upload directory.
    /// - [`RagError::UnsupportedFormat`] if the extension is not supported.
    pub fn resolve(&self, source_id: &str) -> RagResult<SourceFile> {
        let relative = Path::new(source_id);
        let escapes = relative.components().any(|c| {
            !matches!(c, std::path::Component::Normal(_))
        });
        if source_id.is_empty() || escapes {
            return Err(RagError::SourceNotFound(source_id.to_string()));
        }
        let path = self.root.join(relative);
        if !path.is_file() {
            return Err(RagError::SourceNotFound(source_id.to_string()));
        }
        let format = DocumentFormat::from_path(&path)
            .ok_or_else(|| RagError::UnsupportedFormat(source_id.to_string()))?;
        Ok(SourceFile {
            source_id: source_id.to_string(),
            path,
            format,
        })
    }

    /// Lazily yield every chunk of every extractable file.
    ///
    /// Extraction failures are logged and the file is skipped. Each call
    /// re-reads the directory.
    pub fn chunks(&self) -> impl Iterator<Item = SourceChunk> + '_ {
        self.files()
            .filter_map(|file| match self.load(&file) {
                Ok(loaded) => Some(loaded.chunks),
                Err(e) => {
                    tracing::warn!(source_id = %file.source_id, error = %e, "failed to parse");
                    None
                }
            })
            .flatten()
    }

    /// Scan the whole upload directory.
    ///
    /// # Errors
    ///
    /// [`RagError::EmptyCorpus`] if no chunks were produced, whether because
    /// there are no supported files or because every extraction failed.
    pub fn scan(&self) -> RagResult<Corpus> {
        let mut corpus = Corpus::default();
        for file in self.files() {
            match self.load(&file) {
                Ok(loaded) => {
                    tracing::debug!(
                        source_id = %file.source_id,
                        chunks = loaded.chunks.len(),
                        "extracted source"
                    );
                    corpus.sources.push(ScannedSource {
                        source_id: file.source_id.clone(),
                        fingerprint: loaded.fingerprint(),
                        chunk_count: loaded.chunks.len(),
                    });
                    corpus.chunks.extend(loaded.chunks);
                }
                Err(e) => {
                    tracing::warn!(source_id = %file.source_id, error = %e, "failed to parse");
                    corpus.skipped.push(SkippedSource {
                        source_id: file.source_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if corpus.chunks.is_empty() {
            return Err(RagError::EmptyCorpus {
                root: self.root.display().to_string(),
            });
        }
        Ok(corpus)
    }
}

/// SHA-256 of a source file's bytes, hex encoded.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn source_id_for(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn build_globset(patterns: &[String]) -> RagResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| RagError::Config(format!("invalid glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| RagError::Config(format!("invalid glob set: {}", e)))
}
