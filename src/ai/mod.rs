//! Generative-AI assistance: document extraction and free-text drafting.
//!
//! The model is an unreliable collaborator. [`AiAssist`] wraps any
//! [`GenerativeModel`] with the retry policy and surfaces the last failure
//! unchanged once attempts run out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;
use tracing::warn;

pub mod extraction;
pub mod gemini;
pub mod prompts;

pub use extraction::{merge_extraction, ExtractedBid};
pub use gemini::GeminiClient;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AiError {
    #[error("AI API key is not configured")]
    MissingApiKey,
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{message}")]
    Upstream { status: Option<u16>, message: String },
    #[error("the model returned an empty response")]
    Empty,
    #[error("the model returned malformed output: {0}")]
    Malformed(String),
}

impl AiError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            AiError::Upstream { .. } | AiError::Empty | AiError::Malformed(_)
        )
    }
}

/// Inline file sent next to the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub mime_type: String,
    /// Base64 payload without any `data:` URL prefix.
    pub data: String,
}

impl Attachment {
    /// Accepts raw base64 or a `data:<mime>;base64,<payload>` URL.
    pub fn from_upload(mime_type: &str, data: &str) -> Result<Self, AiError> {
        let payload = match data.split_once(',') {
            Some((prefix, payload)) if prefix.starts_with("data:") => payload,
            _ => data,
        };
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(AiError::InvalidRequest("`data` must not be empty".into()));
        }
        if mime_type.trim().is_empty() {
            return Err(AiError::InvalidRequest("`mimeType` must not be empty".into()));
        }
        if STANDARD.decode(payload).is_err() {
            return Err(AiError::InvalidRequest("`data` is not valid base64".into()));
        }
        Ok(Self {
            mime_type: mime_type.trim().to_string(),
            data: payload.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub attachment: Option<Attachment>,
    /// Ask the model for a JSON document instead of prose.
    pub json_response: bool,
}

impl GenerateRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            attachment: None,
            json_response: false,
        }
    }

    pub fn extraction(prompt: impl Into<String>, attachment: Attachment) -> Self {
        Self {
            prompt: prompt.into(),
            attachment: Some(attachment),
            json_response: true,
        }
    }
}

#[async_trait]
pub trait GenerativeModel: Send + Sync + 'static {
    /// One attempt. Returns the model's text or why there is none.
    async fn generate(&self, api_key: &str, request: &GenerateRequest) -> Result<String, AiError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait after the given failed attempt (1-based): doubles each time.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1 << exponent)
    }
}

#[derive(Clone)]
pub struct AiAssist {
    model: Arc<dyn GenerativeModel>,
    retry: RetryPolicy,
}

impl AiAssist {
    pub fn new(model: Arc<dyn GenerativeModel>, retry: RetryPolicy) -> Self {
        Self { model, retry }
    }

    pub async fn generate(
        &self,
        api_key: Option<&str>,
        request: &GenerateRequest,
    ) -> Result<String, AiError> {
        self.run(api_key, request, Ok).await
    }

    /// Generates text and decodes it as extracted bid fields. A reply that
    /// does not decode counts as a failed attempt.
    pub async fn extract_bid(
        &self,
        api_key: Option<&str>,
        request: &GenerateRequest,
    ) -> Result<ExtractedBid, AiError> {
        self.run(api_key, request, |text| ExtractedBid::parse(&text))
            .await
    }

    async fn run<T, F>(
        &self,
        api_key: Option<&str>,
        request: &GenerateRequest,
        decode: F,
    ) -> Result<T, AiError>
    where
        F: Fn(String) -> Result<T, AiError> + Send + Sync,
    {
        let api_key = api_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(AiError::MissingApiKey)?;
        if request.prompt.trim().is_empty() {
            return Err(AiError::InvalidRequest("`prompt` must not be empty".into()));
        }

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let outcome = match self.model.generate(api_key, request).await {
                Ok(text) if text.trim().is_empty() => Err(AiError::Empty),
                Ok(text) => decode(text),
                Err(err) => Err(err),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.backoff_after(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "AI request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
