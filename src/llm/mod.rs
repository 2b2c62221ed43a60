//! Completion client abstraction.
//!
//! The pipeline only talks to [`CompletionClient`]; the HTTP transport,
//! the retry decorator and test stubs all implement it.

pub mod openai;
pub mod retry;
pub mod types;

pub use openai::{ApiKey, OpenAiClient, OpenAiConfig};
pub use retry::{RetryPolicy, Retrying};

use crate::error::CompletionError;
use crate::prompts::RenderedPrompt;
use async_trait::async_trait;

/// One request to the text-generation endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    /// Upper bound on generated tokens.
    pub max_output_tokens: u32,
}

impl CompletionRequest {
    /// Build a request from a rendered prompt.
    pub fn from_prompt(prompt: RenderedPrompt, model: &str, max_output_tokens: u32) -> Self {
        Self {
            model: model.to_string(),
            system: prompt.system,
            prompt: prompt.user,
            max_output_tokens,
        }
    }
}

/// Issues a single completion and returns the generated text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

#[async_trait]
impl<T: CompletionClient + ?Sized> CompletionClient for std::sync::Arc<T> {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        (**self).complete(request).await
    }
}
