//! Fake LLM provider for testing.
//!
//! This provider returns deterministic responses based on prompt matching,
//! allowing tests to run without network access or API costs.

use super::{ChatRequest, LlmError, LlmProvider};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A fake LLM provider for testing.
///
/// Responses are matched by checking if the request transcript contains a
/// registered substring, in registration order. Queued failures are returned
/// first, one per call.
#[derive(Debug, Default)]
pub struct FakeProvider {
    /// (transcript substring, response) pairs
    responses: Vec<(String, String)>,
    /// Default response if no match found
    default_response: Option<String>,
    /// Errors returned by the next calls, in order
    failures: Mutex<VecDeque<LlmError>>,
    /// Artificial latency per call
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeProvider {
    /// Create a new FakeProvider with no registered responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a FakeProvider that returns a specific response for prompts containing a substring.
    pub fn with_response(prompt_contains: &str, response: &str) -> Self {
        let mut provider = Self::new();
        provider.add_response(prompt_contains, response);
        provider
    }

    /// Add a response for prompts containing a specific substring.
    pub fn add_response(&mut self, prompt_contains: &str, response: &str) {
        self.responses
            .push((prompt_contains.to_lowercase(), response.to_string()));
    }

    /// Set the default response when no pattern matches.
    pub fn with_default_response(mut self, response: &str) -> Self {
        self.default_response = Some(response.to_string());
        self
    }

    /// Fail the next call with `error` (queued behind earlier failures).
    pub fn with_failure(self, error: LlmError) -> Self {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push_back(error);
        }
        self
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `complete` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for FakeProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self.failures.lock().ok().and_then(|mut f| f.pop_front());
        if let Some(error) = queued {
            return Err(error);
        }

        // Find first matching pattern (case-insensitive)
        let transcript = request.transcript().to_lowercase();
        for (pattern, response) in &self.responses {
            if transcript.contains(pattern) {
                return Ok(response.clone());
            }
        }

        match &self.default_response {
            Some(response) => Ok(response.clone()),
            None => Err(LlmError::RequestFailed(format!(
                "FakeProvider: No response configured for prompt (first 100 chars): {}",
                transcript.chars().take(100).collect::<String>()
            ))),
        }
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }
}
