//! RoadBrief - batched LLM briefings for road-damage reports
//!
//! Loads a road-damage CSV, fans per-batch analysis requests out to an
//! OpenAI-compatible chat completion endpoint, then asks for one summary
//! of all analyses. The summary is printed to stdout; logs, progress and
//! status lines go to stderr.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Any error (configuration, input, endpoint, timeout)

mod cli;
mod config;
mod dataset;
mod error;
mod llm;
mod models;
mod pipeline;
mod prompts;
mod report;

#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use dataset::{load_dataset, LoadOptions};
use error::{CompletionError, PipelineError};
use llm::{ApiKey, OpenAiClient, OpenAiConfig, RetryPolicy, Retrying};
use models::{RunMetadata, RunMode, RunReport};
use pipeline::{batch_count, partition, Pipeline, PipelineSettings};
use prompts::PromptRenderer;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // OPENAI_API_KEY and ROADBRIEF_* may live in a local .env
    dotenvy::dotenv().ok();

    init_logging(&args);

    info!("RoadBrief v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            report_failure(&e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .roadbrief.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    eprintln!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    eprintln!("   Edit it to customize models, batching, columns and prompts.");
    Ok(())
}

/// Initialize logging on stderr. `RUST_LOG` overrides `-v`/`-q`.
fn init_logging(args: &Args) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(args.log_level()).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Warning: a tracing subscriber was already installed");
    }
}

/// Log the failing stage and print the error chain.
fn report_failure(e: &anyhow::Error) {
    let pipeline_error = e.downcast_ref::<PipelineError>();

    match pipeline_error {
        Some(pe) => error!("Run failed during {} stage: {}", pe.stage(), pe),
        None => error!("Run failed: {:#}", e),
    }
    eprintln!("\n❌ Error: {:#}", e);

    let completion_error = pipeline_error
        .and_then(PipelineError::completion_error)
        .or_else(|| e.downcast_ref::<CompletionError>());
    if let Some(CompletionError::Authentication(_)) = completion_error {
        eprintln!("   Check the API key variable (see [api].api_key_env, default OPENAI_API_KEY).");
    }
}

/// Run the complete workflow: load, analyze, summarize, report.
async fn run(args: Args) -> Result<()> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    if let Err(e) = config.validate() {
        anyhow::bail!("Invalid configuration: {}", e);
    }

    let input = args
        .input
        .clone()
        .context("An input file is required (--input)")?;

    let options = LoadOptions::from(&config.dataset);
    let settings = PipelineSettings::from(&config);
    let renderer = PromptRenderer::from(&config.prompts);

    if args.dry_run {
        return handle_dry_run(&input, &options, &settings, &renderer).await;
    }

    let api_key = ApiKey::from_env(&config.api.api_key_env)
        .with_context(|| format!("No usable credential in ${}", config.api.api_key_env))?;

    let client = OpenAiClient::new(
        OpenAiConfig {
            base_url: config.api.base_url.clone(),
            timeout: Duration::from_secs(config.api.timeout_seconds),
        },
        api_key,
    )
    .context("Failed to create HTTP client")?;

    let client = Retrying::new(
        client,
        RetryPolicy {
            max_retries: config.api.retries,
            base_delay: Duration::from_millis(config.api.retry_delay_ms),
        },
    );

    if !args.quiet {
        eprintln!("🛣️  Analyzing: {}", input.display());
        eprintln!("   Mode: {}", settings.mode);
        if settings.mode == RunMode::Batched {
            eprintln!(
                "   Analysis: {} (batches of {}, {} in flight)",
                settings.analysis_model, settings.batch_size, settings.max_concurrency
            );
        }
        eprintln!("   Summary: {}", settings.summary_model);
        eprintln!("   Endpoint: {}", config.api.base_url);
        if config.api.retries > 0 {
            eprintln!("   Retries: {}", config.api.retries);
        }
        eprintln!();
    }

    let pipeline = Pipeline::new(client, renderer, settings).with_progress(!args.quiet);
    let outcome = pipeline.run_file(&input, &options).await?;
    let duration = start_time.elapsed().as_secs_f64();

    // The briefing itself is the only thing on stdout.
    println!("{}", outcome.summary.text);

    if let Some(ref output_path) = args.output {
        let settings = pipeline.settings();
        let report = RunReport {
            metadata: RunMetadata {
                source: input.display().to_string(),
                analysis_date: Utc::now(),
                mode: settings.mode,
                rows: outcome.rows,
                batches: outcome.batch_sizes.len(),
                batch_size: settings.batch_size,
                analysis_model: (settings.mode == RunMode::Batched)
                    .then(|| settings.analysis_model.clone()),
                summary_model: outcome.summary.model.clone(),
                duration_seconds: duration,
            },
            summary: outcome.summary.clone(),
            analyses: outcome.analyses.clone(),
        };

        let content = match args.format {
            OutputFormat::Json => report::generate_json_report(&report)?,
            OutputFormat::Markdown => report::generate_markdown_report(&report),
        };

        std::fs::write(output_path, &content)
            .with_context(|| format!("Failed to write report to {}", output_path.display()))?;
        info!("Report saved to {}", output_path.display());
    }

    if !args.quiet {
        eprintln!(
            "\n✅ Done: {} rows, {} batches, {:.1}s",
            outcome.rows,
            outcome.batch_sizes.len(),
            duration
        );
    }

    Ok(())
}

/// Handle --dry-run: load and partition, print the request plan, exit.
async fn handle_dry_run(
    input: &Path,
    options: &LoadOptions,
    settings: &PipelineSettings,
    renderer: &PromptRenderer,
) -> Result<()> {
    println!("\n🔍 Dry run: loading dataset (no API calls)...\n");

    settings.validate()?;
    let dataset = load_dataset(input, options).await?;
    println!(
        "   {} rows, {} columns: {}",
        dataset.len(),
        dataset.columns().len(),
        dataset.columns().join(", ")
    );

    match settings.mode {
        RunMode::Direct => {
            let prompt = renderer.render_direct(&dataset);
            println!(
                "   Direct mode: 1 request to {} ({} bytes)",
                settings.summary_model,
                prompt.len()
            );
        }
        RunMode::Batched => {
            let batches = partition(&dataset, settings.batch_size)?;
            println!(
                "   {} batches of up to {} rows ({} in flight) to {}\n",
                batch_count(dataset.len(), settings.batch_size),
                settings.batch_size,
                settings.max_concurrency,
                settings.analysis_model
            );

            let mut total = 0;
            for batch in &batches {
                let prompt = renderer.render_analysis(batch);
                total += prompt.len();
                println!(
                    "     📦 Batch {:>3}: rows {}..{} ({} bytes)",
                    batch.index,
                    batch.start,
                    batch.start + batch.len(),
                    prompt.len()
                );
            }
            println!(
                "\n   Total: {} analysis requests, {} bytes; then 1 summary request to {}",
                batches.len(),
                total,
                settings.summary_model
            );
        }
    }

    println!("\n✅ Dry run complete. No API calls were made.");
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
