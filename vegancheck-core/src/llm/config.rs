//! LLM configuration from environment variables.

use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default OpenRouter base URL.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model to use.
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// Default per-request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;

/// Default delay before the single retry, in milliseconds.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: String, value: String },
}

/// LLM client configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API key for OpenRouter (or any OpenAI-compatible endpoint).
    pub api_key: String,
    /// Model name (e.g., "openai/gpt-4o-mini").
    pub model: String,
    /// Base URL for the API.
    pub base_url: String,
    /// Upper bound for a single request.
    pub timeout: Duration,
    /// Delay before retrying a transient failure.
    pub retry_backoff: Duration,
}

impl LlmConfig {
    /// Configuration with defaults for everything but the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `OPENROUTER_API_KEY`: API key
    ///
    /// Optional:
    /// - `VEGANCHECK_ORACLE_MODEL`: Model name (default: "openai/gpt-4o-mini")
    /// - `VEGANCHECK_ORACLE_BASE_URL`: API base URL (default: "https://openrouter.ai/api/v1")
    /// - `VEGANCHECK_ORACLE_TIMEOUT_MS`: Request timeout (default: 20000)
    /// - `VEGANCHECK_ORACLE_RETRY_BACKOFF_MS`: Retry delay (default: 250)
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var("OPENROUTER_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let model =
            env::var("VEGANCHECK_ORACLE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let base_url = env::var("VEGANCHECK_ORACLE_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let timeout_ms = parse_ms("VEGANCHECK_ORACLE_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?;
        let backoff_ms = parse_ms("VEGANCHECK_ORACLE_RETRY_BACKOFF_MS", DEFAULT_RETRY_BACKOFF_MS)?;

        Ok(Self {
            api_key,
            model,
            base_url,
            timeout: Duration::from_millis(timeout_ms),
            retry_backoff: Duration::from_millis(backoff_ms),
        })
    }
}

fn parse_ms(var: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(var) {
        Ok(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
            var: var.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}
