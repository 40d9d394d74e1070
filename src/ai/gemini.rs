//! Google Gemini integration.
//!
//! Implements the TextCompletionProvider trait for the Gemini
//! `generateContent` REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{http_client, AIError, TextCompletionProvider};
use crate::core::ProviderConfig;

/// Gemini API provider.
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, AIError> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key: api_key.into(),
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        })
    }

    /// Create from configuration; `None` when no API key is set.
    pub fn from_config(
        config: &ProviderConfig,
        timeout: Duration,
    ) -> Result<Option<Self>, AIError> {
        let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return Ok(None);
        };
        Ok(Some(
            Self::new(key, timeout)?
                .with_model(config.model.clone())
                .with_base_url(config.base_url.clone()),
        ))
    }

    /// Create with a specific model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Create with a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl TextCompletionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, prompt: &str) -> Result<String, AIError> {
        let request = GenerateRequest {
            contents: vec![Content { parts: vec![Part { text: prompt.to_string() }] }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AIError::from_status(status, body));
        }

        let response: GenerateResponse = response.json().await?;
        response.text().ok_or(AIError::NoResponse)
    }
}

/// Gemini request structure.
#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

/// A turn of content.
#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

/// A text part of a turn.
#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

/// Gemini response structure.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content.parts.iter().map(|p| p.text.as_str()).collect();
        (!text.is_empty()).then_some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_without_key_is_none() {
        let config = crate::core::AiConfig::default().gemini;
        let provider = GeminiProvider::from_config(&config, Duration::from_secs(5)).unwrap();
        assert!(provider.is_none());
    }

    #[test]
    fn test_endpoint_uses_model() {
        let provider = GeminiProvider::new("key", Duration::from_secs(5))
            .unwrap()
            .with_base_url("http://localhost:1234/v1beta/");
        assert_eq!(
            provider.endpoint(),
            "http://localhost:1234/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn test_empty_response_has_no_text() {
        let response: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(response.text().is_none());
    }
}
