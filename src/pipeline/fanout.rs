//! Concurrent per-batch analysis.
//!
//! Every batch becomes one completion request. At most
//! `max_concurrency` requests are in flight; responses are stored by
//! batch position so the result order never depends on arrival order.

use super::PipelineSettings;
use crate::error::{CompletionError, PipelineError, Result};
use crate::llm::{CompletionClient, CompletionRequest};
use crate::models::{AnalysisResult, Batch};
use crate::prompts::PromptRenderer;
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use tracing::{debug, info, warn};

/// Analyze all batches and return one result per batch, in batch order.
///
/// The first failed request aborts the whole fan-out and drops the
/// requests still in flight; no partial results are returned. When
/// `fanout_timeout` is set the whole gather is bounded by it.
pub async fn analyze_batches<C>(
    client: &C,
    renderer: &PromptRenderer,
    batches: &[Batch<'_>],
    settings: &PipelineSettings,
    progress: Option<&ProgressBar>,
) -> Result<Vec<AnalysisResult>>
where
    C: CompletionClient + ?Sized,
{
    if settings.max_concurrency == 0 {
        return Err(PipelineError::config("concurrency must be at least 1"));
    }

    info!(
        "Dispatching {} analysis requests (max {} in flight)",
        batches.len(),
        settings.max_concurrency
    );

    let gather = gather(client, renderer, batches, settings, progress);

    match settings.fanout_timeout {
        Some(limit) => tokio::time::timeout(limit, gather).await.map_err(|_| {
            warn!("Analysis fan-out exceeded {:?}; cancelling", limit);
            PipelineError::Timeout {
                seconds: limit.as_secs(),
            }
        })?,
        None => gather.await,
    }
}

async fn gather<C>(
    client: &C,
    renderer: &PromptRenderer,
    batches: &[Batch<'_>],
    settings: &PipelineSettings,
    progress: Option<&ProgressBar>,
) -> Result<Vec<AnalysisResult>>
where
    C: CompletionClient + ?Sized,
{
    let requests = batches.iter().enumerate().map(|(slot, batch)| {
        let request = CompletionRequest::from_prompt(
            renderer.render_analysis(batch),
            &settings.analysis_model,
            settings.analysis_max_tokens,
        );
        debug!(
            "Batch {}: rows {}..{}, prompt {} bytes",
            batch.index,
            batch.start,
            batch.start + batch.len(),
            request.prompt.len()
        );
        async move {
            let outcome = client.complete(&request).await;
            (slot, outcome)
        }
    });

    let mut in_flight = stream::iter(requests).buffer_unordered(settings.max_concurrency);
    let mut slots: Vec<Option<String>> = vec![None; batches.len()];

    while let Some((slot, outcome)) = in_flight.next().await {
        let index = batches[slot].index;
        match outcome {
            Ok(text) => {
                debug!("Batch {} analyzed ({} chars)", index, text.len());
                slots[slot] = Some(text);
                if let Some(pb) = progress {
                    pb.inc(1);
                }
            }
            Err(source) => {
                warn!("Batch {} failed: {}; aborting fan-out", index, source);
                return Err(PipelineError::Analysis { index, source });
            }
        }
    }

    slots
        .into_iter()
        .zip(batches)
        .map(|(text, batch)| match text {
            Some(text) => Ok(AnalysisResult {
                batch_index: batch.index,
                text,
            }),
            None => Err(PipelineError::Analysis {
                index: batch.index,
                source: CompletionError::malformed("no response recorded"),
            }),
        })
        .collect()
}
