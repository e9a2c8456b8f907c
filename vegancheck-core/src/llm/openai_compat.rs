//! OpenAI-compatible chat completions provider (OpenRouter by default).

use super::{ChatRequest, LlmConfig, LlmError, LlmProvider, Role};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Chat completions provider speaking the OpenAI wire format.
#[derive(Debug)]
pub struct OpenAiCompatProvider {
    config: LlmConfig,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a provider; the HTTP client enforces `config.timeout` on every request.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::NotConfigured(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Wire body for `request`, sent to the configured model.
    fn build_body<'a>(&'a self, request: &'a ChatRequest) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.config.model,
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role,
                    content: &m.content,
                })
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request.json_response.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        }
    }
}

/// Chat completions request format.
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

/// Chat completions response format.
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Error response from the API.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiErrorBody,
}

fn transport_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::RequestFailed(e.to_string())
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let body = self.build_body(request);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(LlmError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        let text = response.text().await.map_err(transport_error)?;

        if !(200..300).contains(&status) {
            // Try to parse error response
            if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&text) {
                return Err(LlmError::ApiError {
                    status,
                    message: error_response.error.message,
                });
            }
            return Err(LlmError::ApiError {
                status,
                message: text,
            });
        }

        let parsed: CompletionResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::ParseError(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }

    fn provider_name(&self) -> &'static str {
        "openrouter"
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
