//! Pipeline driver.
//!
//! Runs one end-to-end pass: dataset in, final summary out. Any failure
//! aborts the run; the summary request is never sent after a failed
//! fan-out.

use super::fanout::analyze_batches;
use super::partition::partition;
use super::PipelineSettings;
use crate::dataset::{load_dataset, LoadOptions};
use crate::error::{PipelineError, Result};
use crate::llm::{CompletionClient, CompletionRequest};
use crate::models::{AnalysisResult, Dataset, FinalSummary, RunMode};
use crate::prompts::PromptRenderer;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::info;

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Rows in the input dataset.
    pub rows: usize,
    /// Size of every batch, in order. Empty in direct mode.
    pub batch_sizes: Vec<usize>,
    /// Per-batch analyses in batch order. Empty in direct mode.
    pub analyses: Vec<AnalysisResult>,
    pub summary: FinalSummary,
}

/// The batched analysis pipeline bound to one completion client.
pub struct Pipeline<C> {
    client: C,
    renderer: PromptRenderer,
    settings: PipelineSettings,
    show_progress: bool,
}

impl<C: CompletionClient> Pipeline<C> {
    pub fn new(client: C, renderer: PromptRenderer, settings: PipelineSettings) -> Self {
        Self {
            client,
            renderer,
            settings,
            show_progress: false,
        }
    }

    /// Show a progress bar on stderr while batches are analyzed.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Load a dataset from disk and run the configured mode on it.
    pub async fn run_file(&self, path: &Path, options: &LoadOptions) -> Result<PipelineOutcome> {
        self.settings.validate()?;
        let dataset = load_dataset(path, options).await?;
        self.execute(&dataset).await
    }

    /// Run the configured mode on an already loaded dataset.
    pub async fn execute(&self, dataset: &Dataset) -> Result<PipelineOutcome> {
        match self.settings.mode {
            RunMode::Batched => self.run(dataset).await,
            RunMode::Direct => self.run_direct(dataset).await,
        }
    }

    /// Batched mode: fan out one analysis per batch, then summarize.
    pub async fn run(&self, dataset: &Dataset) -> Result<PipelineOutcome> {
        self.settings.validate()?;

        let batches = partition(dataset, self.settings.batch_size)?;
        info!(
            "Partitioned {} rows into {} batches of up to {}",
            dataset.len(),
            batches.len(),
            self.settings.batch_size
        );

        let progress = self.progress_bar(batches.len() as u64);
        let analyses = analyze_batches(
            &self.client,
            &self.renderer,
            &batches,
            &self.settings,
            Some(&progress),
        )
        .await;
        progress.finish_and_clear();
        let analyses = analyses?;
        info!("Collected {} batch analyses", analyses.len());

        let request = CompletionRequest::from_prompt(
            self.renderer.render_summary(&analyses),
            &self.settings.summary_model,
            self.settings.summary_max_tokens,
        );
        info!(
            "Requesting final summary ({} bytes of analyses)",
            request.prompt.len()
        );
        let text = self
            .client
            .complete(&request)
            .await
            .map_err(PipelineError::Summary)?;

        Ok(PipelineOutcome {
            rows: dataset.len(),
            batch_sizes: batches.iter().map(|b| b.len()).collect(),
            analyses,
            summary: FinalSummary {
                text: text.trim().to_string(),
                model: self.settings.summary_model.clone(),
            },
        })
    }

    /// Direct mode: the whole dataset in a single briefing request.
    pub async fn run_direct(&self, dataset: &Dataset) -> Result<PipelineOutcome> {
        self.settings.validate()?;

        let request = CompletionRequest::from_prompt(
            self.renderer.render_direct(dataset),
            &self.settings.summary_model,
            self.settings.summary_max_tokens,
        );
        info!(
            "Requesting single-call briefing for {} rows ({} bytes)",
            dataset.len(),
            request.prompt.len()
        );
        let text = self
            .client
            .complete(&request)
            .await
            .map_err(PipelineError::Summary)?;

        Ok(PipelineOutcome {
            rows: dataset.len(),
            batch_sizes: Vec::new(),
            analyses: Vec::new(),
            summary: FinalSummary {
                text: text.trim().to_string(),
                model: self.settings.summary_model.clone(),
            },
        })
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress || len == 0 {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        pb.set_style(style);
        pb
    }
}
