//! In-process embeddings via fastembed.
//!
//! The model is downloaded from Hugging Face on first use and cached; after
//! that no network access is needed. Inference runs on the blocking pool.

use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use docchat_core::embedding::Embedder;
use docchat_core::{RagError, RagResult};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::config::EmbeddingConfig;

const DEFAULT_MODEL: &str = "all-minilm-l6-v2";

pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: Arc<Mutex<Option<TextEmbedding>>>,
    kind: EmbeddingModel,
}

impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let (kind, default_dims) = resolve_model(&model_name)?;
        Ok(Self {
            dims: config.dims.unwrap_or(default_dims),
            batch_size: config.batch_size,
            model: Arc::new(Mutex::new(None)),
            kind,
            model_name,
        })
    }
}

fn resolve_model(name: &str) -> Result<(EmbeddingModel, usize)> {
    Ok(match name {
        "all-minilm-l6-v2" => (EmbeddingModel::AllMiniLML6V2, 384),
        "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
        "bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
        "bge-large-en-v1.5" => (EmbeddingModel::BGELargeENV15, 1024),
        "nomic-embed-text-v1.5" => (EmbeddingModel::NomicEmbedTextV15, 768),
        "multilingual-e5-small" => (EmbeddingModel::MultilingualE5Small, 384),
        "multilingual-e5-base" => (EmbeddingModel::MultilingualE5Base, 768),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1.5, multilingual-e5-small, multilingual-e5-base",
            other
        ),
    })
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let kind = self.kind.clone();
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut guard = model
                .lock()
                .map_err(|_| RagError::Embedding("local embedding model lock poisoned".into()))?;
            if guard.is_none() {
                tracing::info!(model = ?kind, "loading local embedding model");
                let loaded = TextEmbedding::try_new(
                    InitOptions::new(kind).with_show_download_progress(true),
                )
                .map_err(|e| {
                    RagError::Embedding(format!("failed to initialize local embedding model: {}", e))
                })?;
                *guard = Some(loaded);
            }
            let Some(embedding) = guard.as_mut() else {
                return Err(RagError::Embedding("local embedding model unavailable".into()));
            };
            embedding
                .embed(texts, Some(batch_size))
                .map_err(|e| RagError::Embedding(format!("local embedding failed: {}", e)))
        })
        .await
        .map_err(|e| RagError::Embedding(format!("embedding task failed: {}", e)))?
    }
}
