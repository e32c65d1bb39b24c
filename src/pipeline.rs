//! End-to-end operations over a [`Config`].
//!
//! These are the entry points used by the CLI: build the index from the
//! upload directory, answer a question, locate or view a cited chunk, and
//! report index status. Providers are passed in so callers (and tests)
//! choose them once.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use docchat_core::chunk::ChunkerConfig;
use docchat_core::embedding::Embedder;
use docchat_core::generate::TextGenerator;
use docchat_core::highlight::{anchor_id, highlight_chunk, Highlighted};
use docchat_core::models::Answer;
use docchat_core::{RagError, RagResult};
use serde::Serialize;

use crate::answer::{save_latest_answer, Answerer};
use crate::config::Config;
use crate::document_store::{fingerprint, DocumentStore, SkippedSource};
use crate::index_store::{BuildReport, IndexStore};
use crate::locator::{chunk_at, ChunkLocator, LocatedChunk};
use crate::render::{render_document, render_page};

/// Outcome of [`build_index`].
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub report: BuildReport,
    pub skipped: Vec<SkippedSource>,
}

/// Scan the upload directory, embed every chunk, and publish a new index.
///
/// # Errors
///
/// - [`RagError::EmptyCorpus`] if nothing could be extracted.
/// - [`RagError::Build`] if embedding or persistence fails. The previous
///   index stays live.
pub async fn build_index(config: &Config, embedder: &dyn Embedder) -> RagResult<BuildSummary> {
    let documents = DocumentStore::from_config(config)?;
    let corpus = documents.scan()?;
    tracing::info!(
        sources = corpus.sources.len(),
        chunks = corpus.chunks.len(),
        skipped = corpus.skipped.len(),
        "scanned upload directory"
    );

    let store = IndexStore::new(&config.paths.index_dir);
    let report = store
        .build(
            &corpus.chunks,
            &corpus.sources,
            embedder,
            documents.chunker(),
            config.embedding.batch_size,
        )
        .await?;
    Ok(BuildSummary {
        report,
        skipped: corpus.skipped,
    })
}

/// Answer `question` from the live index and record it in the
/// latest-answer slot.
pub async fn answer_question(
    config: &Config,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn TextGenerator>,
    question: &str,
    k: usize,
) -> RagResult<Answer> {
    let answerer = Answerer::new(
        embedder,
        generator,
        DocumentStore::from_config(config)?,
        IndexStore::new(&config.paths.index_dir),
    );
    let answer = answerer.answer_with_k(question, k).await?;
    if let Err(e) = save_latest_answer(&config.paths.index_dir, &answer.answer) {
        tracing::warn!(error = %e, "failed to save latest answer");
    }
    Ok(answer)
}

/// Chunking the live index was built with, or the configured chunking if
/// no index exists yet.
fn index_chunker(config: &Config) -> RagResult<ChunkerConfig> {
    match IndexStore::new(&config.paths.index_dir).manifest() {
        Ok((_, manifest)) => Ok(manifest.params.chunker),
        Err(RagError::IndexNotFound { .. }) => Ok(config.chunking.chunker()),
        Err(e) => Err(e),
    }
}

fn locator(config: &Config) -> RagResult<ChunkLocator> {
    ChunkLocator::new(&DocumentStore::from_config(config)?, index_chunker(config)?)
}

/// Re-derive the text of chunk `ordinal` of `source_id`.
pub fn locate_chunk(config: &Config, source_id: &str, ordinal: usize) -> RagResult<LocatedChunk> {
    locator(config)?.locate(source_id, ordinal)
}

/// Mark chunk `ordinal` of `source_id` in a caller-supplied rendering of
/// that source. The result reports whether the chunk text was matched.
pub fn locate_for_highlight(
    config: &Config,
    source_id: &str,
    ordinal: usize,
    rendered_html: &str,
) -> RagResult<Highlighted> {
    locator(config)?.locate_and_highlight(source_id, ordinal, rendered_html)
}

/// Render `source_id` as a standalone HTML page with chunk `ordinal`
/// anchored and highlighted.
pub fn view_chunk(config: &Config, source_id: &str, ordinal: usize) -> RagResult<String> {
    let loaded = locator(config)?.load_source(source_id)?;
    let located = chunk_at(&loaded, ordinal)?;
    let body = render_document(loaded.file.format, &loaded.bytes, &loaded.text);
    let highlighted = highlight_chunk(&body, &located.chunk.text, ordinal);
    if !highlighted.found {
        tracing::debug!(source_id, ordinal, "chunk not matched in rendering, anchoring at top");
    }
    let anchor = anchor_id(ordinal);
    Ok(render_page(source_id, &highlighted.html, Some(&anchor)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceState {
    /// Unchanged since the build.
    Indexed,
    /// Bytes differ from the build; citations may be off until rebuild.
    Changed,
    /// Indexed but no longer in the upload directory.
    Missing,
    /// In the upload directory but not in the index.
    New,
}

impl SourceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceState::Indexed => "indexed",
            SourceState::Changed => "changed",
            SourceState::Missing => "missing",
            SourceState::New => "new",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub source_id: String,
    pub state: SourceState,
    pub chunks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub model: String,
    pub dims: usize,
    pub chunk_size: usize,
    pub overlap: usize,
    pub entries: usize,
    pub sources: Vec<SourceStatus>,
}

impl IndexStatus {
    pub fn is_stale(&self) -> bool {
        self.sources.iter().any(|s| s.state != SourceState::Indexed)
    }
}

/// Describe the live index and compare it with the upload directory.
pub fn index_status(config: &Config) -> RagResult<IndexStatus> {
    let (version, manifest) = IndexStore::new(&config.paths.index_dir).manifest()?;
    let documents = DocumentStore::from_config(config)?;

    let mut seen = HashSet::new();
    let mut sources = Vec::new();
    for file in documents.files() {
        let state = match manifest.source(&file.source_id) {
            None => SourceState::New,
            Some(record) => match std::fs::read(&file.path) {
                Ok(bytes) if fingerprint(&bytes) == record.sha256 => SourceState::Indexed,
                Ok(_) => SourceState::Changed,
                Err(e) => {
                    tracing::warn!(source_id = %file.source_id, error = %e, "cannot read source");
                    SourceState::Missing
                }
            },
        };
        let chunks = manifest.source(&file.source_id).map(|r| r.chunks).unwrap_or(0);
        seen.insert(file.source_id.clone());
        sources.push(SourceStatus {
            source_id: file.source_id,
            state,
            chunks,
        });
    }
    for record in &manifest.sources {
        if !seen.contains(&record.source_id) {
            sources.push(SourceStatus {
                source_id: record.source_id.clone(),
                state: SourceState::Missing,
                chunks: record.chunks,
            });
        }
    }
    sources.sort_by(|a, b| a.source_id.cmp(&b.source_id));

    Ok(IndexStatus {
        version,
        created_at: manifest.created_at,
        model: manifest.params.model.clone(),
        dims: manifest.params.dims,
        chunk_size: manifest.params.chunker.chunk_size,
        overlap: manifest.params.chunker.overlap,
        entries: manifest.count,
        sources,
    })
}
