//! Google Gemini generation provider (`models/{model}:generateContent`).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{check_status, GenerationProvider, ProviderError};

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiProvider {
    /// A missing key is not an error here; `generate` reports it per call.
    pub fn new(model: impl Into<String>, api_key: Option<String>) -> Self {
        Self::with_base_url(DEFAULT_GEMINI_BASE_URL, model, api_key)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

/// Concatenate the text parts of the first candidate.
pub fn parse_generate_response(json: serde_json::Value) -> Result<String, ProviderError> {
    let response: GenerateContentResponse = serde_json::from_value(json)
        .map_err(|e| ProviderError::InvalidResponse(format!("gemini response: {e}")))?;

    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ProviderError::InvalidResponse("no candidate text returned".to_string()));
    }
    Ok(text)
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let Some(key) = &self.api_key else {
            return Err(ProviderError::NotConfigured(
                "Gemini API key missing (set GOOGLE_API_KEY)".to_string(),
            ));
        };

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;
        parse_generate_response(response.json().await?)
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}
