//! Embedding providers.
//!
//! Each provider implements [`docchat_core::embedding::Embedder`]:
//! - **[`OpenAIEmbedder`]**: `POST /v1/embeddings` on api.openai.com (or a
//!   compatible `url`). Key from `OPENAI_API_KEY`.
//! - **[`AzureEmbedder`]**: an Azure OpenAI embeddings deployment. Key from
//!   `AZURE_OPENAI_API_KEY`.
//! - **[`OllamaEmbedder`]**: a local Ollama instance's `/api/embed`.
//! - **`LocalEmbedder`**: in-process fastembed model (feature
//!   `local-embeddings`).
//!
//! The provider is chosen once, by [`create_embedder`], and passed to the
//! pipeline as `Arc<dyn Embedder>`.

#[cfg(feature = "local-embeddings")]
mod local;

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use docchat_core::embedding::Embedder;
use docchat_core::{RagError, RagResult};
use serde_json::Value;

use crate::config::EmbeddingConfig;
use crate::http;

#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;

const OPENAI_URL: &str = "https://api.openai.com/v1";
const OLLAMA_URL: &str = "http://localhost:11434";

// ============ OpenAI ============

pub struct OpenAIEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| "text-embedding-3-small".to_string());
        let dims = match (config.dims, model.as_str()) {
            (Some(d), _) => d,
            (None, "text-embedding-3-small") | (None, "text-embedding-ada-002") => 1536,
            (None, "text-embedding-3-large") => 3072,
            (None, other) => bail!("embedding.dims required for OpenAI model '{}'", other),
        };
        let api_key = http::api_key("OPENAI_API_KEY").map_err(anyhow::Error::msg)?;
        Ok(Self {
            client: http::client(config.timeout_secs).map_err(anyhow::Error::msg)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model,
            dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        let body = serde_json::json!({ "model": self.model, "input": texts });
        let auth = format!("Bearer {}", self.api_key);
        let json = http::post_json(
            &self.client,
            &format!("{}/embeddings", self.base_url),
            &[("Authorization", auth.as_str())],
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await
        .map_err(RagError::Embedding)?;
        parse_openai_response(&json)
    }
}

// ============ Azure OpenAI ============

pub struct AzureEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: String,
    deployment: String,
    dims: usize,
    max_retries: u32,
}

impl AzureEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (Some(endpoint), Some(deployment)) = (&config.url, &config.deployment) else {
            bail!("embedding.url and embedding.deployment required for Azure provider");
        };
        let dims = config.dims.unwrap_or(match config.model.as_deref() {
            Some("text-embedding-3-large") => 3072,
            _ => 1536,
        });
        Ok(Self {
            client: http::client(config.timeout_secs).map_err(anyhow::Error::msg)?,
            url: http::azure_url(endpoint, deployment, "embeddings", &config.api_version),
            api_key: http::api_key("AZURE_OPENAI_API_KEY").map_err(anyhow::Error::msg)?,
            deployment: config.model.clone().unwrap_or_else(|| deployment.clone()),
            dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for AzureEmbedder {
    fn model_name(&self) -> &str {
        &self.deployment
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        let body = serde_json::json!({ "input": texts });
        let json = http::post_json(
            &self.client,
            &self.url,
            &[("api-key", self.api_key.as_str())],
            &body,
            self.max_retries,
            "Azure OpenAI",
        )
        .await
        .map_err(RagError::Embedding)?;
        parse_openai_response(&json)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &Value) -> RagResult<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| RagError::Embedding("invalid response: missing data array".into()))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        let embedding = item
            .get("embedding")
            .ok_or_else(|| RagError::Embedding("invalid response: missing embedding".into()))?;
        indexed.push((index, to_f32_vec(embedding)?));
    }
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama ============

pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| "nomic-embed-text".to_string());
        let dims = match (config.dims, model.as_str()) {
            (Some(d), _) => d,
            (None, "nomic-embed-text") => 768,
            (None, "mxbai-embed-large") => 1024,
            (None, "all-minilm") => 384,
            (None, other) => bail!("embedding.dims required for Ollama model '{}'", other),
        };
        Ok(Self {
            client: http::client(config.timeout_secs).map_err(anyhow::Error::msg)?,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OLLAMA_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
            dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        let body = serde_json::json!({ "model": self.model, "input": texts });
        let json = http::post_json(
            &self.client,
            &format!("{}/api/embed", self.url),
            &[],
            &body,
            self.max_retries,
            "Ollama",
        )
        .await
        .map_err(RagError::Embedding)?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &Value) -> RagResult<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| RagError::Embedding("invalid Ollama response: missing embeddings array".into()))?
        .iter()
        .map(to_f32_vec)
        .collect()
}

fn to_f32_vec(value: &Value) -> RagResult<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| RagError::Embedding("invalid response: embedding is not an array".into()))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| RagError::Embedding("invalid response: non-numeric embedding value".into()))
        })
        .collect()
}

/// Instantiate the configured embedding provider.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"openai"` | [`OpenAIEmbedder`] |
/// | `"azure"` | [`AzureEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"local"` | `LocalEmbedder` (feature `local-embeddings`) |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "azure" => Ok(Arc::new(AzureEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_openai_orders_by_index() {
        let json = serde_json::json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        });
        let vectors = parse_openai_response(&json).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_rejects_malformed_response() {
        assert!(parse_openai_response(&serde_json::json!({})).is_err());
        let bad = serde_json::json!({ "embeddings": [[1.0, "x"]] });
        assert!(matches!(parse_ollama_response(&bad), Err(RagError::Embedding(_))));
    }

    #[test]
    fn test_ollama_defaults() {
        let config = EmbeddingConfig {
            provider: "ollama".into(),
            ..Default::default()
        };
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.model_name(), "nomic-embed-text");
        assert_eq!(embedder.dims(), 768);
    }

    #[test]
    fn test_unknown_ollama_model_needs_dims() {
        let config = EmbeddingConfig {
            provider: "ollama".into(),
            model: Some("custom".into()),
            ..Default::default()
        };
        assert!(create_embedder(&config).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_embedding_error() {
        let config = EmbeddingConfig {
            provider: "ollama".into(),
            url: Some("http://127.0.0.1:9".into()),
            max_retries: 0,
            timeout_secs: 1,
            ..Default::default()
        };
        let embedder = create_embedder(&config).unwrap();
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
    }
}
