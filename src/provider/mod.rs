//! External model providers.
//!
//! - [`openai`]: OpenAI-compatible HTTP client (embeddings + chat completions),
//!   usable against OpenAI, Ollama's `/v1` API or vLLM
//! - [`gemini`]: Google Gemini `generateContent` client

pub mod gemini;
pub mod openai;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),
}

/// Maps text to a fixed-length vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    fn provider_name(&self) -> &'static str;
}

/// Maps a prompt to a generated response. Slow; this is what the cache avoids.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;

    fn provider_name(&self) -> &'static str;
}

/// Turn a non-success HTTP response into [`ProviderError::Api`].
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Api {
        status: status.as_u16(),
        body,
    })
}
