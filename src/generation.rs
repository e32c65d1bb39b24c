//! Text generation providers.
//!
//! - **[`OpenAIGenerator`]**: chat completions on api.openai.com (or a
//!   compatible `url`). Key from `OPENAI_API_KEY`.
//! - **[`AzureGenerator`]**: an Azure OpenAI chat deployment. Key from
//!   `AZURE_OPENAI_API_KEY`.
//! - **[`OllamaGenerator`]**: `/api/generate` on a local Ollama instance.
//!
//! The prompt is sent as a single user message; the configured temperature
//! (default 0.2) applies to every provider.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use docchat_core::generate::TextGenerator;
use docchat_core::{RagError, RagResult};
use serde_json::Value;

use crate::config::GenerationConfig;
use crate::http;

const OPENAI_URL: &str = "https://api.openai.com/v1";
const OLLAMA_URL: &str = "http://localhost:11434";

fn chat_body(model: Option<&str>, prompt: &str, temperature: f32) -> Value {
    let mut body = serde_json::json!({
        "messages": [{ "role": "user", "content": prompt }],
        "temperature": temperature,
    });
    if let Some(model) = model {
        body["model"] = Value::String(model.to_string());
    }
    body
}

/// `choices[0].message.content` of a chat completion.
fn parse_chat_response(json: &Value) -> RagResult<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| RagError::Generation("invalid response: missing choices[0].message.content".into()))
}

pub struct OpenAIGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_retries: u32,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs).map_err(anyhow::Error::msg)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: http::api_key("OPENAI_API_KEY").map_err(anyhow::Error::msg)?,
            model: config.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string()),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> RagResult<String> {
        let auth = format!("Bearer {}", self.api_key);
        let json = http::post_json(
            &self.client,
            &format!("{}/chat/completions", self.base_url),
            &[("Authorization", auth.as_str())],
            &chat_body(Some(&self.model), prompt, self.temperature),
            self.max_retries,
            "OpenAI",
        )
        .await
        .map_err(RagError::Generation)?;
        parse_chat_response(&json)
    }
}

pub struct AzureGenerator {
    client: reqwest::Client,
    url: String,
    api_key: String,
    deployment: String,
    temperature: f32,
    max_retries: u32,
}

impl AzureGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let (Some(endpoint), Some(deployment)) = (&config.url, &config.deployment) else {
            bail!("generation.url and generation.deployment required for Azure provider");
        };
        Ok(Self {
            client: http::client(config.timeout_secs).map_err(anyhow::Error::msg)?,
            url: http::azure_url(endpoint, deployment, "chat/completions", &config.api_version),
            api_key: http::api_key("AZURE_OPENAI_API_KEY").map_err(anyhow::Error::msg)?,
            deployment: deployment.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl TextGenerator for AzureGenerator {
    fn model_name(&self) -> &str {
        &self.deployment
    }

    async fn generate(&self, prompt: &str) -> RagResult<String> {
        let json = http::post_json(
            &self.client,
            &self.url,
            &[("api-key", self.api_key.as_str())],
            &chat_body(None, prompt, self.temperature),
            self.max_retries,
            "Azure OpenAI",
        )
        .await
        .map_err(RagError::Generation)?;
        parse_chat_response(&json)
    }
}

pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
    max_retries: u32,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs).map_err(anyhow::Error::msg)?,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OLLAMA_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone().unwrap_or_else(|| "llama3.1".to_string()),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> RagResult<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": self.temperature },
        });
        let json = http::post_json(
            &self.client,
            &format!("{}/api/generate", self.url),
            &[],
            &body,
            self.max_retries,
            "Ollama",
        )
        .await
        .map_err(RagError::Generation)?;
        json.get("response")
            .and_then(|r| r.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| RagError::Generation("invalid Ollama response: missing response".into()))
    }
}

/// Instantiate the configured generation provider.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn TextGenerator>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        "azure" => Ok(Arc::new(AzureGenerator::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_body_shape() {
        let body = chat_body(Some("gpt-4o-mini"), "hi", 0.2);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hi");
        assert!(chat_body(None, "hi", 0.2).get("model").is_none());
    }

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": " Paris. \n" } }]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "Paris.");
        assert!(matches!(
            parse_chat_response(&serde_json::json!({ "choices": [] })),
            Err(RagError::Generation(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_generation_error() {
        let config = GenerationConfig {
            provider: "ollama".into(),
            url: Some("http://127.0.0.1:9".into()),
            max_retries: 0,
            timeout_secs: 1,
            ..Default::default()
        };
        let generator = create_generator(&config).unwrap();
        assert_eq!(generator.model_name(), "llama3.1");
        assert!(matches!(
            generator.generate("hello").await,
            Err(RagError::Generation(_))
        ));
    }
}
