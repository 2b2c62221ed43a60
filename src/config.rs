//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.roadbrief.toml` files.

use crate::models::RunMode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".roadbrief.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Completion endpoint settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Batching and fan-out settings.
    #[serde(default)]
    pub batching: BatchingConfig,

    /// Dataset loading settings.
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Prompt template settings.
    #[serde(default)]
    pub prompts: PromptsConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// `batched` (fan-out + summary) or `direct` (single call).
    #[serde(default)]
    pub mode: RunMode,
}

/// Completion endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API root URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the bearer credential.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model for per-batch analysis.
    #[serde(default = "default_analysis_model")]
    pub analysis_model: String,

    /// Output bound for per-batch analysis.
    #[serde(default = "default_analysis_max_tokens")]
    pub analysis_max_tokens: u32,

    /// Model for the final summary (and direct mode).
    #[serde(default = "default_summary_model")]
    pub summary_model: String,

    /// Output bound for the final summary.
    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Retries for transient failures. 0 disables retrying.
    #[serde(default)]
    pub retries: u32,

    /// Delay before the first retry, doubled on each further attempt.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            analysis_model: default_analysis_model(),
            analysis_max_tokens: default_analysis_max_tokens(),
            summary_model: default_summary_model(),
            summary_max_tokens: default_summary_max_tokens(),
            timeout_seconds: default_timeout(),
            retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_analysis_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_analysis_max_tokens() -> u32 {
    1000
}

fn default_summary_model() -> String {
    "gpt-4o".to_string()
}

fn default_summary_max_tokens() -> u32 {
    1500
}

fn default_timeout() -> u64 {
    120
}

fn default_retry_delay_ms() -> u64 {
    1000
}

/// Batching and fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchingConfig {
    /// Rows per analysis request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum analysis requests in flight.
    #[serde(default = "default_concurrency")]
    pub max_concurrency: usize,

    /// Bound on the whole fan-out in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fanout_timeout_seconds: Option<u64>,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_concurrency: default_concurrency(),
            fanout_timeout_seconds: None,
        }
    }
}

fn default_batch_size() -> usize {
    100
}

fn default_concurrency() -> usize {
    4
}

/// Dataset loading settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Field delimiter (one ASCII character).
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Columns to keep, in order. All columns when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,

    /// Columns to drop before selection.
    #[serde(default)]
    pub drop_columns: Vec<String>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            columns: None,
            drop_columns: Vec::new(),
        }
    }
}

fn default_delimiter() -> String {
    ",".to_string()
}

impl DatasetConfig {
    /// The delimiter as a byte. Falls back to `,` if it is not one ASCII character.
    pub fn delimiter_byte(&self) -> u8 {
        match self.delimiter.as_bytes() {
            [b] if b.is_ascii() => *b,
            _ => b',',
        }
    }
}

/// Prompt template settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// Region named in the analysis prompt.
    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_system: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_instructions: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_system: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_instructions: Option<String>,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            analysis_system: None,
            analysis_instructions: None,
            summary_system: None,
            summary_instructions: None,
        }
    }
}

fn default_region() -> String {
    "포항".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings; only
    /// values the user actually supplied override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if args.direct {
            self.general.mode = RunMode::Direct;
        }

        if let Some(ref url) = args.base_url {
            self.api.base_url = url.clone();
        }
        if let Some(ref model) = args.analysis_model {
            self.api.analysis_model = model.clone();
        }
        if let Some(ref model) = args.summary_model {
            self.api.summary_model = model.clone();
        }
        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }
        if let Some(retries) = args.retries {
            self.api.retries = retries;
        }

        if let Some(batch_size) = args.batch_size {
            self.batching.batch_size = batch_size;
        }
        if let Some(concurrency) = args.concurrency {
            self.batching.max_concurrency = concurrency;
        }
        if let Some(limit) = args.fanout_timeout {
            self.batching.fanout_timeout_seconds = Some(limit);
        }

        if let Some(delimiter) = args.delimiter {
            self.dataset.delimiter = delimiter.to_string();
        }
        if let Some(ref columns) = args.columns {
            self.dataset.columns = Some(columns.clone());
        }
        if let Some(ref drop) = args.drop_columns {
            self.dataset.drop_columns = drop.clone();
        }

        if let Some(ref region) = args.region {
            self.prompts.region = region.clone();
        }
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            return Err("API base URL must start with 'http://' or 'https://'".to_string());
        }
        if self.api.api_key_env.trim().is_empty() {
            return Err("api_key_env cannot be empty".to_string());
        }
        if self.api.timeout_seconds == 0 {
            return Err("Timeout must be at least 1 second".to_string());
        }
        if !matches!(self.dataset.delimiter.as_bytes(), [b] if b.is_ascii()) {
            return Err(format!(
                "Delimiter must be a single ASCII character, got '{}'",
                self.dataset.delimiter
            ));
        }
        if self.batching.fanout_timeout_seconds == Some(0) {
            return Err("Fan-out timeout must be at least 1 second".to_string());
        }

        crate::pipeline::PipelineSettings::from(self)
            .validate()
            .map_err(|e| e.to_string())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
