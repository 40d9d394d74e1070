//! AI integration module.
//!
//! Provides task breakdown, workload and deadline risk analysis, and quality
//! scoring of submitted evidence, backed by hosted LLMs.
//!
//! ## Layers
//!
//! - [`TextCompletionProvider`] - one hosted model ("prompt in, text out")
//! - [`AIGateway`] - ordered providers; the first success wins
//! - [`parse_json`] - pulls the JSON payload out of a model reply
//! - [`Analyzer`] - typed analyses with documented fallbacks

mod analysis;
mod gemini;
mod groq;
mod parser;
mod prompts;

pub use analysis::{
    with_fallback, AnalysisError, Analyzer, FallbackResult, QualityAssessment, QualityInput,
    RiskCandidate, RiskFinding, Subtask, TaskBreakdown, WorkloadItem, WorkloadRisk,
};
pub use gemini::GeminiProvider;
pub use groq::GroqProvider;
pub use parser::{extract_json, parse_json, strip_code_fences, ParseError};
pub use prompts::{batch_risk_prompt, breakdown_prompt, quality_prompt, workload_prompt};

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::AiConfig;

/// A hosted text-completion model.
#[async_trait]
pub trait TextCompletionProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Send a prompt and return the raw reply text.
    async fn complete(&self, prompt: &str) -> Result<String, AIError>;
}

/// One provider's failure inside a fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    /// Provider name
    pub provider: String,
    /// Error description
    pub error: String,
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.error)
    }
}

fn join_failures(failures: &[ProviderFailure]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// AI error types.
#[derive(Debug, thiserror::Error)]
pub enum AIError {
    #[error("Missing AI API key. Set GEMINI_API_KEY or GROQ_API_KEY")]
    MissingApiKey,

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Rate limited")]
    RateLimited,

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No response from AI")]
    NoResponse,

    #[error("All AI providers failed ({})", join_failures(.0))]
    AllProvidersFailed(Vec<ProviderFailure>),
}

impl AIError {
    /// Map a non-success HTTP status to an error.
    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimited
        } else {
            Self::Api { status: status.as_u16(), body }
        }
    }
}

/// Ordered provider chain.
///
/// Each provider is tried once, in order; a failure is logged and the next
/// provider is tried.
pub struct AIGateway {
    providers: Vec<Box<dyn TextCompletionProvider>>,
}

impl AIGateway {
    /// Create a gateway over the given providers.
    ///
    /// Fails with [`AIError::MissingApiKey`] when the list is empty.
    pub fn new(providers: Vec<Box<dyn TextCompletionProvider>>) -> Result<Self, AIError> {
        if providers.is_empty() {
            return Err(AIError::MissingApiKey);
        }
        Ok(Self { providers })
    }

    /// Build the Gemini -> Groq chain from configuration, skipping providers
    /// without an API key.
    pub fn from_config(config: &AiConfig) -> Result<Self, AIError> {
        let timeout = Duration::from_secs(config.request_timeout_secs.max(1));
        let mut providers: Vec<Box<dyn TextCompletionProvider>> = Vec::new();

        if let Some(gemini) = GeminiProvider::from_config(&config.gemini, timeout)? {
            providers.push(Box::new(gemini));
        }
        if let Some(groq) = GroqProvider::from_config(&config.groq, timeout)? {
            providers.push(Box::new(groq));
        }

        Self::new(providers)
    }

    /// Names of the configured providers, in order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Send a prompt through the chain.
    pub async fn complete(&self, prompt: &str) -> Result<String, AIError> {
        let mut failures = Vec::new();

        for provider in &self.providers {
            match provider.complete(prompt).await {
                Ok(text) => {
                    tracing::debug!(provider = provider.name(), "AI provider answered");
                    return Ok(text);
                }
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        error = %e,
                        "Provider failed, trying next"
                    );
                    failures.push(ProviderFailure {
                        provider: provider.name().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::error!(failures = %join_failures(&failures), "All AI providers failed");
        Err(AIError::AllProvidersFailed(failures))
    }
}

impl fmt::Debug for AIGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AIGateway").field("providers", &self.provider_names()).finish()
    }
}

/// Build the HTTP client shared by the hosted providers.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, AIError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}
