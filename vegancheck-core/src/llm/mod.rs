//! LLM provider abstraction used by the classification oracle.
//!
//! This module provides a trait-based abstraction over chat-completion providers
//! with a real OpenAI-compatible implementation (OpenRouter by default) and a
//! fake for tests.

mod config;
mod fake;
mod openai_compat;
mod types;

pub use config::{
    ConfigError, LlmConfig, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_RETRY_BACKOFF_MS,
    DEFAULT_TIMEOUT_MS,
};
pub use fake::FakeProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use types::{ChatMessage, ChatRequest, Role};

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Error type for LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("API request timed out")]
    Timeout,

    #[error("API returned error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Failed to parse response envelope: {0}")]
    ParseError(String),

    #[error("Response had no content")]
    EmptyResponse,

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl LlmError {
    /// Whether retrying the same request might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::RequestFailed(_) | LlmError::Timeout | LlmError::RateLimited { .. } => true,
            LlmError::ApiError { status, .. } => *status >= 500,
            LlmError::ParseError(_) | LlmError::EmptyResponse | LlmError::NotConfigured(_) => {
                false
            }
        }
    }
}

/// Trait for LLM providers.
///
/// Implementations should be stateless and thread-safe. The provider is responsible
/// for making API calls and returning the model's text response.
#[async_trait]
pub trait LlmProvider: Send + Sync + fmt::Debug {
    /// Send a chat request and get the text of the first completion.
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError>;

    /// Get the provider name (e.g., "openrouter", "fake").
    fn provider_name(&self) -> &'static str;

    /// Get the model name (e.g., "openai/gpt-4o-mini").
    fn model_name(&self) -> &str;
}

/// Build a provider from environment configuration.
///
/// Returns `Ok(None)` when `OPENROUTER_API_KEY` is not set, so callers can run
/// without an oracle. Invalid values for the optional variables are errors.
pub fn create_provider_from_env() -> Result<Option<OpenAiCompatProvider>, LlmError> {
    match LlmConfig::from_env() {
        Ok(config) => OpenAiCompatProvider::new(config).map(Some),
        Err(ConfigError::MissingEnvVar(var)) => {
            tracing::debug!(var = %var, "LLM provider not configured");
            Ok(None)
        }
        Err(e) => Err(LlmError::NotConfigured(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(LlmError::Timeout.is_transient());
        assert!(LlmError::RequestFailed("connection reset".to_string()).is_transient());
        assert!(LlmError::RateLimited {
            retry_after_secs: Some(1)
        }
        .is_transient());
        assert!(LlmError::ApiError {
            status: 503,
            message: "overloaded".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_permanent_errors() {
        assert!(!LlmError::ApiError {
            status: 401,
            message: "bad key".to_string()
        }
        .is_transient());
        assert!(!LlmError::EmptyResponse.is_transient());
        assert!(!LlmError::ParseError("eof".to_string()).is_transient());
    }
}
