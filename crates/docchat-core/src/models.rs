//! Core data models that flow through the ingestion and answer pipeline.
//!
//! A chunk is addressed by `(source_id, ordinal)` only. Its text is never
//! persisted; it is re-derived from the source document by replaying the
//! same extraction and chunking (see [`crate::chunk`]).

use serde::{Deserialize, Serialize};

/// Maximum length, in characters, of a citation preview.
pub const PREVIEW_MAX_CHARS: usize = 200;

/// Stable address of a chunk within a source document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkRef {
    /// File name of the source document.
    pub source_id: String,
    /// Zero-based position in the deterministic split of the source text.
    pub ordinal: usize,
}

impl ChunkRef {
    pub fn new(source_id: impl Into<String>, ordinal: usize) -> Self {
        Self {
            source_id: source_id.into(),
            ordinal,
        }
    }
}

/// A chunk of a source document's extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceChunk {
    pub source_id: String,
    pub ordinal: usize,
    pub text: String,
}

impl SourceChunk {
    pub fn chunk_ref(&self) -> ChunkRef {
        ChunkRef::new(self.source_id.clone(), self.ordinal)
    }
}

/// A nearest-neighbor hit returned by an index query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub source_id: String,
    pub ordinal: usize,
    /// Cosine similarity in `[-1.0, 1.0]`; higher is more relevant.
    pub score: f32,
}

impl ScoredChunk {
    pub fn chunk_ref(&self) -> ChunkRef {
        ChunkRef::new(self.source_id.clone(), self.ordinal)
    }
}

/// Pointer into a chunk plus a bounded excerpt for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source_id: String,
    pub ordinal: usize,
    /// At most [`PREVIEW_MAX_CHARS`] characters from the start of the chunk.
    pub preview: String,
}

/// A generated answer with citations in retrieval rank order.
///
/// Duplicate `(source_id, ordinal)` pairs are kept if the retriever
/// returned them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub citations: Vec<Citation>,
}
