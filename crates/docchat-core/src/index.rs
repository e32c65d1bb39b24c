//! In-memory nearest-neighbor index over embedded chunks.
//!
//! Vector search is brute-force cosine similarity over all stored vectors,
//! which is plenty for a corpus of uploaded office documents. Vectors are
//! kept in one flat buffer in insertion order; entry `i` owns
//! `vectors[i * dims..(i + 1) * dims]`.
//!
//! Persistence (versioned directories, atomic swap) is handled by the app
//! crate's `index_store` module; this type only knows how to hold and
//! query the `(source_id, ordinal, vector)` triples.

use serde::{Deserialize, Serialize};

use crate::chunk::ChunkerConfig;
use crate::embedding::cosine_similarity;
use crate::error::{RagError, RagResult};
use crate::models::{ChunkRef, ScoredChunk};

/// Similarity metric used for every index. Recorded in the persisted
/// manifest so a future metric change cannot silently mix scores.
pub const METRIC_COSINE: &str = "cosine";

/// Parameters of the embedding space an index was built in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexParams {
    /// Embedding model that produced the vectors.
    pub model: String,
    /// Vector dimensionality; queries must match it.
    pub dims: usize,
    /// Similarity metric (always [`METRIC_COSINE`]).
    pub metric: String,
    /// Chunking parameters used to produce the indexed chunks.
    pub chunker: ChunkerConfig,
}

impl IndexParams {
    pub fn new(model: impl Into<String>, dims: usize, chunker: ChunkerConfig) -> Self {
        Self {
            model: model.into(),
            dims,
            metric: METRIC_COSINE.to_string(),
            chunker,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    params: IndexParams,
    entries: Vec<ChunkRef>,
    vectors: Vec<f32>,
}

impl VectorIndex {
    pub fn new(params: IndexParams) -> Self {
        Self {
            params,
            entries: Vec::new(),
            vectors: Vec::new(),
        }
    }

    /// Rebuild an index from its persisted parts.
    ///
    /// `vectors` must hold exactly `entries.len() * params.dims` floats.
    pub fn from_parts(
        params: IndexParams,
        entries: Vec<ChunkRef>,
        vectors: Vec<f32>,
    ) -> RagResult<Self> {
        if params.metric != METRIC_COSINE {
            return Err(RagError::CorruptIndex(format!(
                "unsupported similarity metric '{}'",
                params.metric
            )));
        }
        if entries.len() * params.dims != vectors.len() {
            return Err(RagError::CorruptIndex(format!(
                "index holds {} entries of {} dims but {} vector values",
                entries.len(),
                params.dims,
                vectors.len()
            )));
        }
        Ok(Self {
            params,
            entries,
            vectors,
        })
    }

    /// Append an embedded chunk. Insertion order is the tie-break order for
    /// queries.
    pub fn insert(&mut self, chunk: ChunkRef, vector: &[f32]) -> RagResult<()> {
        if vector.len() != self.params.dims {
            return Err(RagError::IncompatibleIndex {
                index_dims: self.params.dims,
                query_dims: vector.len(),
            });
        }
        self.entries.push(chunk);
        self.vectors.extend_from_slice(vector);
        Ok(())
    }

    pub fn params(&self) -> &IndexParams {
        &self.params
    }

    pub fn entries(&self) -> &[ChunkRef] {
        &self.entries
    }

    /// All vectors, flattened in entry order.
    pub fn flat_vectors(&self) -> &[f32] {
        &self.vectors
    }

    pub fn vector(&self, i: usize) -> Option<&[f32]> {
        let dims = self.params.dims;
        self.vectors.get(i * dims..(i + 1) * dims)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reject embedders whose vector space differs from this index's.
    pub fn ensure_compatible(&self, dims: usize) -> RagResult<()> {
        if dims != self.params.dims {
            return Err(RagError::IncompatibleIndex {
                index_dims: self.params.dims,
                query_dims: dims,
            });
        }
        Ok(())
    }

    /// Return up to `k` nearest entries, best first.
    ///
    /// Equal scores keep insertion order. An empty index yields an empty
    /// result.
    ///
    /// # Errors
    ///
    /// - [`RagError::Config`] if `k == 0`.
    /// - [`RagError::IncompatibleIndex`] if `vector` has the wrong length.
    pub fn query(&self, vector: &[f32], k: usize) -> RagResult<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(RagError::Config("k must be >= 1".into()));
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_compatible(vector.len())?;

        let dims = self.params.dims;
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(dims.max(1))
            .take(self.entries.len())
            .map(|v| cosine_similarity(vector, v))
            .enumerate()
            .collect();

        // Stable sort: ties keep insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                source_id: self.entries[i].source_id.clone(),
                ordinal: self.entries[i].ordinal,
                score,
            })
            .collect())
    }
}
