//! Error taxonomy shared by every stage of the pipeline.
//!
//! Each variant is a distinct, user-surfaceable condition. Only per-file
//! extraction failures are recovered locally (by the document scan); every
//! other variant propagates to the caller unchanged.

use std::fmt;

use thiserror::Error;

/// Result alias used throughout DocChat.
pub type RagResult<T> = std::result::Result<T, RagError>;

/// Stage of an index build that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    /// Reading or extracting source documents.
    Extraction,
    /// Calling the embedding provider.
    Embedding,
    /// Writing the index to disk or swapping it into place.
    Persistence,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStage::Extraction => "extraction",
            BuildStage::Embedding => "embedding",
            BuildStage::Persistence => "persistence",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid chunking or retrieval parameters. Always a caller bug.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to extract text from {source_id}: {message}")]
    Extraction { source_id: String, message: String },

    /// The scan produced zero chunks; there is nothing to index.
    #[error("no content to index under {root}")]
    EmptyCorpus { root: String },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("index build failed during {stage}: {message}")]
    Build { stage: BuildStage, message: String },

    /// No index has been built at the configured location yet.
    #[error("index not built yet (no index at {location})")]
    IndexNotFound { location: String },

    /// Index files exist but cannot be read back: unreadable, truncated,
    /// malformed, or written by an incompatible format version.
    #[error("index cannot be read: {0}; rebuild the index")]
    CorruptIndex(String),

    /// The embedder (or query vector) does not match the index's vector space.
    #[error("index built with {index_dims}-dim vectors cannot be queried with {query_dims}-dim vectors")]
    IncompatibleIndex { index_dims: usize, query_dims: usize },

    #[error("generation failed: {0}")]
    Generation(String),

    /// The ordinal is out of range for the re-derived chunk sequence. This
    /// usually means the source changed since the index was built.
    #[error("chunk {ordinal} not found in {source_id} ({available} chunks available)")]
    ChunkNotFound {
        source_id: String,
        ordinal: usize,
        available: usize,
    },

    #[error("source not found: {0}")]
    SourceNotFound(String),
}

impl RagError {
    pub fn build(stage: BuildStage, message: impl Into<String>) -> Self {
        RagError::Build {
            stage,
            message: message.into(),
        }
    }

    /// Re-labels embedding failures as generation failures.
    ///
    /// Used by the answer path, where any provider call failing surfaces
    /// as a single "generation failed" condition.
    pub fn into_generation(self) -> Self {
        match self {
            RagError::Embedding(msg) => RagError::Generation(format!("question embedding: {msg}")),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_error_names_stage() {
        let err = RagError::build(BuildStage::Persistence, "disk full");
        assert_eq!(
            err.to_string(),
            "index build failed during persistence: disk full"
        );
    }

    #[test]
    fn embedding_becomes_generation_on_answer_path() {
        let err = RagError::Embedding("timeout".into()).into_generation();
        assert!(matches!(err, RagError::Generation(ref m) if m.contains("timeout")));

        let err = RagError::IndexNotFound {
            location: "x".into(),
        }
        .into_generation();
        assert!(matches!(err, RagError::IndexNotFound { .. }));
    }
}
