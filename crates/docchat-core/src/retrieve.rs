//! Question → top-k chunk identities.

use crate::embedding::Embedder;
use crate::error::{RagError, RagResult};
use crate::index::VectorIndex;
use crate::models::ScoredChunk;

/// Number of chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 5;

/// Embeds a question and queries an index with it.
pub struct Retriever<'a> {
    embedder: &'a dyn Embedder,
    index: &'a VectorIndex,
}

impl<'a> Retriever<'a> {
    /// Pair an embedder with an index built in the same vector space.
    ///
    /// # Errors
    ///
    /// [`RagError::IncompatibleIndex`] if the embedder's dimensionality
    /// differs from the index's.
    pub fn new(embedder: &'a dyn Embedder, index: &'a VectorIndex) -> RagResult<Self> {
        index.ensure_compatible(embedder.dims())?;
        if embedder.model_name() != index.params().model {
            tracing::warn!(
                index_model = %index.params().model,
                embedder_model = %embedder.model_name(),
                "embedder model differs from the one used to build the index"
            );
        }
        Ok(Self { embedder, index })
    }

    /// Retrieve the [`DEFAULT_TOP_K`] best chunks for `question`.
    pub async fn top(&self, question: &str) -> RagResult<Vec<ScoredChunk>> {
        self.retrieve(question, DEFAULT_TOP_K).await
    }

    /// Retrieve up to `k` chunks for `question`, best first.
    ///
    /// `k` is validated before any provider call is made.
    pub async fn retrieve(&self, question: &str, k: usize) -> RagResult<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(RagError::Config("k must be >= 1".into()));
        }
        let vector = self.embedder.embed(question).await?;
        self.index.query(&vector, k)
    }
}
