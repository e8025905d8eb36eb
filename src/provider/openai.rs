//! OpenAI-compatible provider.
//!
//! Speaks `POST /v1/embeddings` and `POST /v1/chat/completions`. Ollama, vLLM
//! and llama.cpp's server all expose these routes, so the same client covers a
//! local BGE embedding model and a hosted chat model.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{check_status, EmbeddingProvider, GenerationProvider, ProviderError};

/// Client for one model on an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, model, api_key)
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.base_url)
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value, ProviderError> {
        let mut request = self.client.post(self.url(path)).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = check_status(request.send().await?).await?;
        Ok(response.json().await?)
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Extract the first embedding from an `/v1/embeddings` response body.
pub fn parse_embedding_response(json: serde_json::Value) -> Result<Vec<f32>, ProviderError> {
    let response: EmbeddingsResponse = serde_json::from_value(json)
        .map_err(|e| ProviderError::InvalidResponse(format!("embedding response: {e}")))?;

    let embedding = response
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or_else(|| ProviderError::InvalidResponse("no embedding returned".to_string()))?;

    if embedding.is_empty() {
        return Err(ProviderError::InvalidResponse("empty embedding".to_string()));
    }
    if embedding.iter().any(|x| !x.is_finite()) {
        return Err(ProviderError::InvalidResponse("non-finite embedding value".to_string()));
    }
    Ok(embedding)
}

/// Extract the assistant text from a `/v1/chat/completions` response body.
pub fn parse_chat_response(json: serde_json::Value) -> Result<String, ProviderError> {
    let response: ChatResponse = serde_json::from_value(json)
        .map_err(|e| ProviderError::InvalidResponse(format!("chat response: {e}")))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ProviderError::InvalidResponse("no completion returned".to_string()))
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let body = json!({
            "model": self.model,
            "input": text,
        });
        parse_embedding_response(self.post("embeddings", body).await?)
    }

    fn provider_name(&self) -> &'static str {
        "openai-compatible"
    }
}

#[async_trait]
impl GenerationProvider for OpenAiCompatProvider {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
        });
        parse_chat_response(self.post("chat/completions", body).await?)
    }

    fn provider_name(&self) -> &'static str {
        "openai-compatible"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_embedding() {
        let body = json!({
            "object": "list",
            "model": "bge-large",
            "data": [{ "object": "embedding", "index": 0, "embedding": [0.1, 0.2, 0.3] }]
        });
        assert_eq!(parse_embedding_response(body).unwrap(), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_parse_embedding_rejects_empty() {
        assert!(parse_embedding_response(json!({ "data": [] })).is_err());
        assert!(parse_embedding_response(json!({ "data": [{ "embedding": [] }] })).is_err());
        assert!(parse_embedding_response(json!({ "oops": true })).is_err());
    }

    #[test]
    fn test_parse_chat() {
        let body = json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "Paris is the capital of France." },
                "finish_reason": "stop"
            }]
        });
        assert_eq!(parse_chat_response(body).unwrap(), "Paris is the capital of France.");
    }

    #[test]
    fn test_parse_chat_without_content() {
        let body = json!({ "choices": [{ "message": { "role": "assistant" } }] });
        assert!(matches!(
            parse_chat_response(body),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let p = OpenAiCompatProvider::new("http://localhost:11434/", "bge-large", Some(String::new()));
        assert_eq!(p.url("embeddings"), "http://localhost:11434/v1/embeddings");
        assert!(p.api_key.is_none());
    }
}
