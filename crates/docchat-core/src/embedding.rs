//! Embedder capability and vector utilities.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement,
//! plus pure helper functions for vector serialization and similarity.
//!
//! Concrete providers (OpenAI, Azure OpenAI, Ollama, fastembed) live in the
//! `docchat` app crate.

use async_trait::async_trait;

use crate::error::{RagError, RagResult};

/// Embedding capability: text in, fixed-length vector out.
///
/// Implementations must return vectors of exactly [`dims`](Embedder::dims)
/// elements. An index built with one embedder is only queryable with an
/// embedder of the same dimensionality.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model name recorded in the index manifest.
    fn model_name(&self) -> &str;

    /// Length of every vector this embedder produces.
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> RagResult<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("empty embedding response".into()))
    }
}

/// Serialize vectors for `vectors.bin`: each component as a little-endian
/// `f32`, rows back to back.
///
/// ```rust
/// use docchat_core::embedding::{decode_vectors, encode_vectors};
///
/// let flat = [0.5f32, -1.0, 2.0];
/// let bytes = encode_vectors(&flat);
/// assert_eq!(bytes.len(), 12);
/// assert_eq!(decode_vectors(&bytes), Some(flat.to_vec()));
/// ```
pub fn encode_vectors(flat: &[f32]) -> Vec<u8> {
    flat.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Inverse of [`encode_vectors`]. `None` if the length is not a whole
/// number of `f32`s, which means the data was truncated.
pub fn decode_vectors(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}

/// Cosine of the angle between `a` and `b`, in `[-1.0, 1.0]`.
///
/// Mismatched lengths, empty input and zero vectors score `0.0` so a bad
/// row can never outrank a real match.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let (dot, aa, bb) = a.iter().zip(b).fold((0.0f32, 0.0f32, 0.0f32), |(d, x2, y2), (x, y)| {
        (d + x * y, x2 + x * x, y2 + y * y)
    });
    let norm = (aa * bb).sqrt();
    if norm <= f32::EPSILON {
        0.0
    } else {
        dot / norm
    }
}

/// Check that every vector in `vectors` has `dims` elements.
pub fn check_dims(vectors: &[Vec<f32>], dims: usize) -> RagResult<()> {
    match vectors.iter().find(|v| v.len() != dims) {
        Some(bad) => Err(RagError::Embedding(format!(
            "provider returned a {}-dim vector, expected {}",
            bad.len(),
            dims
        ))),
        None => Ok(()),
    }
}
