//! Fallback classification of ingredients missing from the knowledge base.
//!
//! The oracle wraps an [`LlmProvider`] with a fixed prompt, a per-attempt
//! timeout, a single retry for transient failures, and strict validation of
//! the response.

pub mod prompt;
mod response;

pub use response::{parse_oracle_response, OracleVerdict};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::Instrument;

use crate::llm::{
    create_provider_from_env, ChatMessage, ChatRequest, LlmError, LlmProvider,
    OpenAiCompatProvider, DEFAULT_RETRY_BACKOFF_MS, DEFAULT_TIMEOUT_MS,
};
use prompt::{render_system_prompt, render_user_prompt, CLASSIFY_PROMPT_NAME};

/// Total attempts per classification: the first call plus one retry.
pub const MAX_ATTEMPTS: u32 = 2;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Oracle call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Oracle returned an empty response")]
    EmptyResponse,

    #[error("Oracle response did not match the expected schema: {0}")]
    Schema(String),
}

impl OracleError {
    /// Transport-level failures are retried; bad content is not.
    pub fn is_transient(&self) -> bool {
        match self {
            OracleError::Llm(e) => e.is_transient(),
            OracleError::Timeout(_) => true,
            OracleError::EmptyResponse | OracleError::Schema(_) => false,
        }
    }
}

/// Classifies unknown ingredients through an LLM.
#[derive(Debug, Clone)]
pub struct Oracle {
    provider: Arc<dyn LlmProvider>,
    timeout: Duration,
    retry_backoff: Duration,
}

impl Oracle {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }

    /// Build an oracle from a configured provider, taking its timeout and backoff.
    pub fn from_provider(provider: OpenAiCompatProvider) -> Self {
        let timeout = provider.config().timeout;
        let retry_backoff = provider.config().retry_backoff;
        Self::new(Arc::new(provider))
            .with_timeout(timeout)
            .with_retry_backoff(retry_backoff)
    }

    /// Oracle from environment variables, or `None` when no API key is set.
    pub fn from_env() -> Result<Option<Self>, LlmError> {
        Ok(create_provider_from_env()?.map(Self::from_provider))
    }

    /// Upper bound for each attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Delay before the retry.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    fn build_request(unknown: &[String]) -> ChatRequest {
        ChatRequest {
            messages: vec![
                ChatMessage::system(render_system_prompt()),
                ChatMessage::user(render_user_prompt(unknown)),
            ],
            max_tokens: Some(1024),
            temperature: Some(0.0),
            json_response: true,
        }
    }

    async fn attempt(&self, request: &ChatRequest) -> Result<OracleVerdict, OracleError> {
        let text = tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
            .map_err(|_| OracleError::Timeout(self.timeout))??;
        parse_oracle_response(&text)
    }

    /// Classify `unknown` ingredient names.
    pub async fn classify(&self, unknown: &[String]) -> Result<OracleVerdict, OracleError> {
        let request = Self::build_request(unknown);
        let mut attempt = 1;

        loop {
            let span = tracing::debug_span!(
                "oracle_attempt",
                prompt = CLASSIFY_PROMPT_NAME,
                provider = self.provider.provider_name(),
                model = self.provider.model_name(),
                attempt = attempt,
            );
            match self.attempt(&request).instrument(span).await {
                Ok(verdict) => return Ok(verdict),
                Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        error = %e,
                        attempt = attempt,
                        "Oracle call failed, retrying"
                    );
                    tokio::time::sleep(self.retry_backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
