//! TOML configuration.
//!
//! Every section has defaults, so an empty file is a valid configuration.
//! Secrets (API keys) are read from the environment by the providers and
//! never appear here.

use anyhow::{bail, Context, Result};
use docchat_core::chunk::{ChunkerConfig, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// Directory holding uploaded source documents.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Directory holding index versions and the latest-answer slot.
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            index_dir: default_index_dir(),
        }
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}
fn default_index_dir() -> PathBuf {
    PathBuf::from("./storage/index")
}

/// Splitter parameters for the next build.
///
/// The live index records the values it was built with, and citations are
/// resolved with those. A change here needs a full rebuild to take effect.
#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn chunker(&self) -> ChunkerConfig {
        ChunkerConfig {
            chunk_size: self.chunk_size,
            overlap: self.overlap,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ScanConfig {
    /// Extra glob patterns (relative to the upload dir) to skip.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `openai`, `azure`, `ollama`, or `local`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Ollama base URL or Azure OpenAI endpoint.
    #[serde(default)]
    pub url: Option<String>,
    /// Azure OpenAI deployment name.
    #[serde(default)]
    pub deployment: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
            deployment: None,
            api_version: default_api_version(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_api_version() -> String {
    "2024-10-21".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// `openai`, `azure`, or `ollama`.
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_generation_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub deployment: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            temperature: default_temperature(),
            max_retries: default_generation_retries(),
            timeout_secs: default_generation_timeout(),
            url: None,
            deployment: None,
            api_version: default_api_version(),
        }
    }
}

fn default_generation_provider() -> String {
    "openai".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_generation_retries() -> u32 {
    3
}
fn default_generation_timeout() -> u64 {
    60
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    config
        .chunking
        .chunker()
        .validate()
        .context("invalid [chunking] section")?;

    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }
    match config.embedding.provider.as_str() {
        "openai" | "azure" | "ollama" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be openai, azure, ollama, or local.",
            other
        ),
    }

    match config.generation.provider.as_str() {
        "openai" | "azure" | "ollama" => {}
        other => bail!(
            "Unknown generation provider: '{}'. Must be openai, azure, or ollama.",
            other
        ),
    }
    if !(0.0..=2.0).contains(&config.generation.temperature) {
        bail!("generation.temperature must be in [0.0, 2.0]");
    }

    for (section, provider, url, deployment) in [
        (
            "embedding",
            &config.embedding.provider,
            &config.embedding.url,
            &config.embedding.deployment,
        ),
        (
            "generation",
            &config.generation.provider,
            &config.generation.url,
            &config.generation.deployment,
        ),
    ] {
        if provider == "azure" && (url.is_none() || deployment.is_none()) {
            bail!(
                "{}.url and {}.deployment must be set when provider is 'azure'",
                section,
                section
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.chunking.chunk_size, 1200);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.paths.upload_dir, PathBuf::from("./uploads"));
        assert_eq!(config.embedding.provider, "openai");
        assert!((config.generation.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_overlap_not_smaller_than_chunk_size_rejected() {
        let err = parse("[chunking]\nchunk_size = 100\noverlap = 100\n").unwrap_err();
        assert!(format!("{:#}", err).contains("overlap"));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        assert!(parse("[embedding]\nprovider = \"magic\"\n").is_err());
        assert!(parse("[generation]\nprovider = \"magic\"\n").is_err());
    }

    #[test]
    fn test_azure_requires_endpoint_and_deployment() {
        assert!(parse("[generation]\nprovider = \"azure\"\n").is_err());
        let ok = parse(
            "[generation]\nprovider = \"azure\"\nurl = \"https://x.openai.azure.com\"\ndeployment = \"gpt4o\"\n",
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_load_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docchat.toml");
        std::fs::write(&path, "[paths]\nupload_dir = \"/data/up\"\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.paths.upload_dir, PathBuf::from("/data/up"));
        assert!(load_config(&dir.path().join("missing.toml")).is_err());
    }
}
