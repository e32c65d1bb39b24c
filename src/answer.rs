//! Question answering over the live index, plus the latest-answer slot.
//!
//! An answer is produced by retrieving the top chunks for the question,
//! re-deriving their text from the sources, and asking the generator to
//! answer from that context only. Citations keep retrieval rank order.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use docchat_core::embedding::Embedder;
use docchat_core::generate::TextGenerator;
use docchat_core::models::{Answer, Citation, ScoredChunk};
use docchat_core::prompt::{build_prompt, preview};
use docchat_core::retrieve::{Retriever, DEFAULT_TOP_K};
use docchat_core::{RagError, RagResult};

use crate::document_store::DocumentStore;
use crate::index_store::{IndexStore, StoredIndex};
use crate::locator::ChunkLocator;

/// File name of the latest-answer slot inside the index directory.
pub const LATEST_ANSWER_FILE: &str = "latest_answer.txt";

pub struct Answerer {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn TextGenerator>,
    documents: DocumentStore,
    index: IndexStore,
}

impl Answerer {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn TextGenerator>,
        documents: DocumentStore,
        index: IndexStore,
    ) -> Self {
        Self {
            embedder,
            generator,
            documents,
            index,
        }
    }

    /// Answer `question` from the [`DEFAULT_TOP_K`] most similar chunks.
    pub async fn answer(&self, question: &str) -> RagResult<Answer> {
        self.answer_with_k(question, DEFAULT_TOP_K).await
    }

    /// Answer `question` from the `k` most similar chunks.
    ///
    /// # Errors
    ///
    /// - [`RagError::Config`] if `k == 0`.
    /// - [`RagError::IndexNotFound`] if no index has been built.
    /// - [`RagError::IncompatibleIndex`] if the embedder does not match the index.
    /// - [`RagError::Generation`] if embedding the question or generating fails.
    pub async fn answer_with_k(&self, question: &str, k: usize) -> RagResult<Answer> {
        if k == 0 {
            return Err(RagError::Config("k must be >= 1".into()));
        }
        let stored = self.index.load()?;
        let retriever = Retriever::new(self.embedder.as_ref(), &stored.index)?;
        let hits = retriever
            .retrieve(question, k)
            .await
            .map_err(RagError::into_generation)?;
        tracing::debug!(hits = hits.len(), version = %stored.version, "retrieved chunks");

        let contexts = self.resolve_hits(&stored, &hits)?;
        let prompt = build_prompt(
            question,
            &contexts.iter().map(|(_, text)| text.as_str()).collect::<Vec<_>>(),
        );
        let answer = self.generator.generate(&prompt).await?;

        let citations = contexts
            .iter()
            .map(|(hit, text)| Citation {
                source_id: hit.source_id.clone(),
                ordinal: hit.ordinal,
                preview: preview(text),
            })
            .collect();
        Ok(Answer { answer, citations })
    }

    /// Re-derive the text of each hit, in rank order.
    ///
    /// A cited source that vanished or no longer has that chunk fails the
    /// whole answer with [`RagError::SourceNotFound`] or
    /// [`RagError::ChunkNotFound`].
    fn resolve_hits<'h>(
        &self,
        stored: &StoredIndex,
        hits: &'h [ScoredChunk],
    ) -> RagResult<Vec<(&'h ScoredChunk, String)>> {
        let locator = ChunkLocator::new(&self.documents, stored.chunker())?;
        let refs: Vec<_> = hits.iter().map(ScoredChunk::chunk_ref).collect();
        let located = locator.locate_all(&refs)?;

        let mut warned = HashSet::new();
        for l in &located {
            let source_id = l.chunk.source_id.as_str();
            let stale = stored
                .source(source_id)
                .is_some_and(|record| record.sha256 != l.fingerprint);
            if stale && warned.insert(source_id) {
                tracing::warn!(
                    source_id,
                    "source changed since the index was built; citations may be inaccurate until rebuild"
                );
            }
        }

        Ok(hits
            .iter()
            .zip(located)
            .map(|(hit, l)| (hit, l.chunk.text))
            .collect())
    }
}

fn latest_answer_path(index_dir: &Path) -> PathBuf {
    index_dir.join(LATEST_ANSWER_FILE)
}

/// Replace the latest-answer slot with `text`.
pub fn save_latest_answer(index_dir: &Path, text: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(index_dir)?;
    crate::index_store::write_atomic(&latest_answer_path(index_dir), text.as_bytes())
}

/// Contents of the latest-answer slot, or `None` if nothing was answered yet.
pub fn load_latest_answer(index_dir: &Path) -> std::io::Result<Option<String>> {
    match std::fs::read_to_string(latest_answer_path(index_dir)) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_answer_slot() {
        let dir = tempfile::tempdir().unwrap();
        let index_dir = dir.path().join("index");
        assert_eq!(load_latest_answer(&index_dir).unwrap(), None);
        save_latest_answer(&index_dir, "first").unwrap();
        save_latest_answer(&index_dir, "second").unwrap();
        assert_eq!(load_latest_answer(&index_dir).unwrap().as_deref(), Some("second"));
    }
}
