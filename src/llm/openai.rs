//! OpenAI-compatible chat-completion transport.
//!
//! Sends `POST {base_url}/chat/completions` with a bearer credential and
//! reads the generated text from `choices[0].message.content`.

use super::types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use super::{CompletionClient, CompletionRequest};
use crate::error::CompletionError;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Longest slice of an error body kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Bearer credential for the completion endpoint.
///
/// Loaded once per run and handed to the client; `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Result<Self, CompletionError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(CompletionError::authentication("API key is empty"));
        }
        Ok(Self(key.trim().to_string()))
    }

    /// Read the key from the named environment variable.
    pub fn from_env(var: &str) -> Result<Self, CompletionError> {
        let value = std::env::var(var).map_err(|_| {
            CompletionError::authentication(format!("environment variable {} is not set", var))
        })?;
        Self::new(value)
            .map_err(|_| CompletionError::authentication(format!("environment variable {} is empty", var)))
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Connection settings for [`OpenAiClient`].
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API root, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// HTTP client for an OpenAI-compatible endpoint.
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    api_key: ApiKey,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig, api_key: ApiKey) -> Result<Self, CompletionError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CompletionError::transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            api_key,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn send_error(&self, e: reqwest::Error) -> CompletionError {
        if e.is_timeout() {
            CompletionError::transport(format!(
                "request timed out after {}s",
                self.config.timeout.as_secs()
            ))
        } else if e.is_connect() {
            CompletionError::transport(format!(
                "cannot connect to {}: {}",
                self.config.base_url, e
            ))
        } else {
            CompletionError::transport(format!("failed to send request: {}", e))
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let body = ChatCompletionRequest {
            model: &request.model,
            messages: vec![
                ChatMessage::system(request.system.as_str()),
                ChatMessage::user(request.prompt.as_str()),
            ],
            max_tokens: request.max_output_tokens,
        };

        debug!(
            "Sending completion request - Model: {}, Prompt length: {}",
            request.model,
            request.prompt.len()
        );

        let response = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| CompletionError::transport(format!("failed to read response body: {}", e)))?;

        check_status(status, &text)?;
        let content = parse_completion(&text)?;

        debug!("Received completion - Length: {}", content.len());
        Ok(content)
    }
}

/// Map a non-success status to the matching error.
pub fn check_status(status: u16, body: &str) -> Result<(), CompletionError> {
    match status {
        200..=299 => Ok(()),
        401 | 403 => Err(CompletionError::authentication(format!(
            "HTTP {}: {}",
            status,
            truncate(body)
        ))),
        _ => Err(CompletionError::Service {
            status,
            body: truncate(body),
        }),
    }
}

/// Extract the generated text from a response body.
pub fn parse_completion(body: &str) -> Result<String, CompletionError> {
    let response: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| CompletionError::malformed(format!("undecodable body: {}", e)))?;

    response
        .into_text()
        .ok_or_else(|| CompletionError::malformed("no text at choices[0].message.content"))
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
