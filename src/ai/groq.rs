//! Groq integration.
//!
//! Implements the TextCompletionProvider trait for Groq's OpenAI-compatible
//! chat completions API. Replies are constrained to raw JSON through the
//! system message.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{http_client, AIError, TextCompletionProvider};
use crate::core::ProviderConfig;

/// System message sent with every request.
pub const JSON_ONLY_INSTRUCTION: &str =
    "You are an AI assistant. Always respond with valid JSON only, no markdown formatting, no extra text.";

/// Groq API provider.
pub struct GroqProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GroqProvider {
    /// Create a new Groq provider.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, AIError> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key: api_key.into(),
            model: "llama-3.3-70b-versatile".to_string(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
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

    /// Create with a custom base URL (any OpenAI-compatible endpoint).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_request(&self, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: JSON_ONLY_INSTRUCTION.to_string(),
                },
                ChatMessage { role: "user".to_string(), content: prompt.to_string() },
            ],
            temperature: 0.3,
            max_tokens: 2048,
        }
    }
}

#[async_trait]
impl TextCompletionProvider for GroqProvider {
    fn name(&self) -> &str {
        "groq"
    }

    async fn complete(&self, prompt: &str) -> Result<String, AIError> {
        let request = self.build_request(prompt);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AIError::from_status(status, body));
        }

        let response: ChatResponse = response.json().await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.is_empty())
            .ok_or(AIError::NoResponse)
    }
}

/// Chat completion request structure.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

/// Message in a chat request.
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Chat completion response structure.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_json_instruction() {
        let provider = GroqProvider::new("key", Duration::from_secs(5)).unwrap();
        let request = provider.build_request("Rate this");
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["model"], "llama-3.3-70b-versatile");
        assert_eq!(value["max_tokens"], 2048);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][0]["content"], JSON_ONLY_INSTRUCTION);
        assert_eq!(value["messages"][1]["content"], "Rate this");
        assert!((value["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_from_config_with_key() {
        let mut config = crate::core::AiConfig::default().groq;
        config.api_key = Some("gsk_test".to_string());
        let provider = GroqProvider::from_config(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(provider.unwrap().name(), "groq");
    }
}
