//! Opt-in retry with exponential backoff.
//!
//! Wraps any [`CompletionClient`]. Only errors reported as retryable
//! (transport failures, 429 and 5xx) are retried. With `max_retries = 0`
//! the wrapper makes exactly one attempt.

use super::{CompletionClient, CompletionRequest};
use crate::error::CompletionError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

/// How many times to retry and how long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// A client that retries transient failures of the wrapped client.
#[derive(Debug, Clone)]
pub struct Retrying<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C> Retrying<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<C: CompletionClient> CompletionClient for Retrying<C> {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(request).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        "Completion failed (attempt {}/{}): {}. Retrying in {:?}...",
                        attempt,
                        self.policy.max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedClient, Step};

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "m".to_string(),
            system: "s".to_string(),
            prompt: "p".to_string(),
            max_output_tokens: 10,
        }
    }

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_retries_transient_failure() {
        let inner = ScriptedClient::new(vec![
            Step::Fail(CompletionError::transport("reset")),
            Step::Reply("done".to_string()),
        ]);
        let client = Retrying::new(inner.clone(), fast(2));

        assert_eq!(client.complete(&request()).await.unwrap(), "done");
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn test_default_policy_makes_one_attempt() {
        let inner = ScriptedClient::new(vec![Step::Fail(CompletionError::transport("reset"))]);
        let client = Retrying::new(inner.clone(), RetryPolicy::default());

        assert!(client.complete(&request()).await.is_err());
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn test_does_not_retry_authentication() {
        let inner = ScriptedClient::new(vec![Step::Fail(CompletionError::authentication("no"))]);
        let client = Retrying::new(inner.clone(), fast(5));

        assert!(matches!(
            client.complete(&request()).await,
            Err(CompletionError::Authentication(_))
        ));
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let inner = ScriptedClient::new(vec![
            Step::Fail(CompletionError::Service {
                status: 503,
                body: String::new(),
            });
            4
        ]);
        let client = Retrying::new(inner.clone(), fast(2));

        assert!(client.complete(&request()).await.is_err());
        assert_eq!(inner.calls(), 3);
    }
}
