//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Tunables are optional here so that values
//! from `.roadbrief.toml` survive unless a flag overrides them.

use clap::Parser;
use std::path::PathBuf;

/// RoadBrief - batched LLM briefings for road-damage reports
///
/// Splits a road-damage CSV into batches, analyzes each batch with a
/// chat-completion model concurrently, then condenses the analyses into
/// one briefing printed to stdout.
///
/// Examples:
///   roadbrief --input pohang.csv
///   roadbrief --input pohang.csv --batch-size 50 --concurrency 8
///   roadbrief --input pohang.csv --direct --summary-model gpt-4o
///   roadbrief --input pohang.csv --output report.md
///   roadbrief --input pohang.csv --dry-run
///   roadbrief --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Road-damage CSV file to analyze (header row required)
    #[arg(
        short,
        long,
        value_name = "FILE",
        required_unless_present = "init_config"
    )]
    pub input: Option<PathBuf>,

    /// Rows per analysis request [default: 100]
    #[arg(short, long, value_name = "ROWS")]
    pub batch_size: Option<usize>,

    /// Maximum analysis requests in flight [default: 4]
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Model used for per-batch analysis [default: gpt-3.5-turbo]
    #[arg(long, value_name = "MODEL", env = "ROADBRIEF_ANALYSIS_MODEL")]
    pub analysis_model: Option<String>,

    /// Model used for the final summary and direct mode [default: gpt-4o]
    #[arg(long, value_name = "MODEL", env = "ROADBRIEF_SUMMARY_MODEL")]
    pub summary_model: Option<String>,

    /// OpenAI-compatible API root URL
    #[arg(long, value_name = "URL", env = "ROADBRIEF_BASE_URL")]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds [default: 120]
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Bound on the whole analysis fan-out in seconds
    #[arg(long, value_name = "SECS")]
    pub fanout_timeout: Option<u64>,

    /// Retries for transient failures (connection errors, 429, 5xx) [default: 0]
    #[arg(long, value_name = "NUM")]
    pub retries: Option<u32>,

    /// Columns to keep, in order (comma-separated)
    ///
    /// Example: --columns id,classname,time,address
    #[arg(long, value_name = "COLS", value_delimiter = ',')]
    pub columns: Option<Vec<String>>,

    /// Columns to drop (comma-separated)
    #[arg(long, value_name = "COLS", value_delimiter = ',')]
    pub drop_columns: Option<Vec<String>>,

    /// Field delimiter of the input file [default: ,]
    #[arg(long, value_name = "CHAR")]
    pub delimiter: Option<char>,

    /// Region named in the analysis prompt [default: 포항]
    #[arg(long, value_name = "NAME")]
    pub region: Option<String>,

    /// Send the whole dataset in one request instead of batching
    #[arg(long)]
    pub direct: bool,

    /// Also write a run report to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Report format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .roadbrief.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Load and partition the input, print the batch plan, make no API calls
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .roadbrief.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only, no progress bar)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.input.is_none() {
            return Err("An input file is required (--input)".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.batch_size == Some(0) {
            return Err("Batch size must be at least 1".to_string());
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.fanout_timeout == Some(0) {
            return Err("Fan-out timeout must be at least 1 second".to_string());
        }

        if let Some(ref url) = self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(delimiter) = self.delimiter {
            if !delimiter.is_ascii() {
                return Err(format!(
                    "Delimiter must be a single ASCII character, got '{}'",
                    delimiter
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
