//! Recover a chunk's text from its `(source_id, ordinal)` address.
//!
//! The index stores only addresses. Text is re-derived by re-extracting the
//! source and re-running the chunker with the parameters the index was
//! built with, so the same source bytes always yield the same chunk.

use std::collections::BTreeMap;

use docchat_core::chunk::ChunkerConfig;
use docchat_core::highlight::{highlight_chunk, Highlighted};
use docchat_core::models::{ChunkRef, SourceChunk};
use docchat_core::{RagError, RagResult};

use crate::document_store::{DocumentStore, LoadedSource};

/// A chunk re-derived from its source.
#[derive(Debug, Clone)]
pub struct LocatedChunk {
    pub chunk: SourceChunk,
    /// SHA-256 of the source bytes the chunk was derived from.
    pub fingerprint: String,
}

pub struct ChunkLocator {
    documents: DocumentStore,
}

impl ChunkLocator {
    /// Locate chunks in `documents` using `chunker`, which must be the
    /// chunking the index was built with.
    pub fn new(documents: &DocumentStore, chunker: ChunkerConfig) -> RagResult<Self> {
        Ok(Self {
            documents: documents.with_chunker(chunker)?,
        })
    }

    pub fn chunker(&self) -> ChunkerConfig {
        self.documents.chunker()
    }

    /// Extract and chunk one source.
    ///
    /// # Errors
    ///
    /// - [`RagError::SourceNotFound`] if the file is gone.
    /// - [`RagError::UnsupportedFormat`] or [`RagError::Extraction`] if it
    ///   can no longer be read.
    pub fn load_source(&self, source_id: &str) -> RagResult<LoadedSource> {
        let file = self.documents.resolve(source_id)?;
        self.documents.load(&file)
    }

    /// Re-derive one chunk.
    ///
    /// # Errors
    ///
    /// As [`load_source`](Self::load_source), plus [`RagError::ChunkNotFound`]
    /// if `ordinal` is past the end of the source's chunk sequence.
    pub fn locate(&self, source_id: &str, ordinal: usize) -> RagResult<LocatedChunk> {
        let loaded = self.load_source(source_id)?;
        chunk_at(&loaded, ordinal)
    }

    /// Re-derive several chunks, extracting each source once.
    ///
    /// Results are returned in the order of `refs`.
    pub fn locate_all(&self, refs: &[ChunkRef]) -> RagResult<Vec<LocatedChunk>> {
        let mut sources: BTreeMap<&str, LoadedSource> = BTreeMap::new();
        let mut located = Vec::with_capacity(refs.len());
        for r in refs {
            if !sources.contains_key(r.source_id.as_str()) {
                let loaded = self.load_source(&r.source_id)?;
                sources.insert(r.source_id.as_str(), loaded);
            }
            if let Some(loaded) = sources.get(r.source_id.as_str()) {
                located.push(chunk_at(loaded, r.ordinal)?);
            }
        }
        Ok(located)
    }

    /// Locate a chunk and mark it in an HTML rendering of its source.
    pub fn locate_and_highlight(
        &self,
        source_id: &str,
        ordinal: usize,
        rendered_html: &str,
    ) -> RagResult<Highlighted> {
        let located = self.locate(source_id, ordinal)?;
        Ok(highlight_chunk(rendered_html, &located.chunk.text, ordinal))
    }
}

/// The chunk at `ordinal` within an already loaded source.
pub fn chunk_at(loaded: &LoadedSource, ordinal: usize) -> RagResult<LocatedChunk> {
    let chunk = loaded
        .chunks
        .get(ordinal)
        .cloned()
        .ok_or_else(|| RagError::ChunkNotFound {
            source_id: loaded.file.source_id.clone(),
            ordinal,
            available: loaded.chunks.len(),
        })?;
    Ok(LocatedChunk {
        chunk,
        fingerprint: loaded.fingerprint(),
    })
}
