//! Text generation capability.
//!
//! Provider implementations (OpenAI, Azure OpenAI, Ollama) live in the
//! `docchat` app crate; tests supply their own.

use async_trait::async_trait;

use crate::error::RagResult;

/// Prompt in, completion out.
///
/// Failures must be reported as [`RagError::Generation`](crate::error::RagError::Generation).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> RagResult<String>;
}
