//! The batched analysis pipeline.
//!
//! load → partition → concurrent per-batch analysis → one summary request.

pub mod driver;
pub mod fanout;
pub mod partition;

pub use driver::Pipeline;
pub use partition::{batch_count, partition};

use crate::error::{PipelineError, Result};
use crate::models::RunMode;
use std::time::Duration;

/// Tunables for one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub mode: RunMode,
    /// Rows per batch
    pub batch_size: usize,
    /// Maximum analysis requests in flight
    pub max_concurrency: usize,
    /// Bound on the whole fan-out; `None` waits indefinitely
    pub fanout_timeout: Option<Duration>,
    pub analysis_model: String,
    pub analysis_max_tokens: u32,
    pub summary_model: String,
    pub summary_max_tokens: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            mode: RunMode::Batched,
            batch_size: 100,
            max_concurrency: 4,
            fanout_timeout: None,
            analysis_model: "gpt-3.5-turbo".to_string(),
            analysis_max_tokens: 1000,
            summary_model: "gpt-4o".to_string(),
            summary_max_tokens: 1500,
        }
    }
}

impl From<&crate::config::Config> for PipelineSettings {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            mode: config.general.mode,
            batch_size: config.batching.batch_size,
            max_concurrency: config.batching.max_concurrency,
            fanout_timeout: config
                .batching
                .fanout_timeout_seconds
                .map(Duration::from_secs),
            analysis_model: config.api.analysis_model.clone(),
            analysis_max_tokens: config.api.analysis_max_tokens,
            summary_model: config.api.summary_model.clone(),
            summary_max_tokens: config.api.summary_max_tokens,
        }
    }
}

impl PipelineSettings {
    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(PipelineError::config("batch size must be at least 1"));
        }
        if self.max_concurrency == 0 {
            return Err(PipelineError::config("concurrency must be at least 1"));
        }
        if self.mode == RunMode::Batched && self.analysis_model.trim().is_empty() {
            return Err(PipelineError::config("analysis model cannot be empty"));
        }
        if self.summary_model.trim().is_empty() {
            return Err(PipelineError::config("summary model cannot be empty"));
        }
        if self.analysis_max_tokens == 0 || self.summary_max_tokens == 0 {
            return Err(PipelineError::config("max output tokens must be at least 1"));
        }
        Ok(())
    }
}
