//! Markdown and JSON run reports.
//!
//! The final summary always goes to stdout; these reports are the
//! optional on-disk record of a run (`--output`).

use crate::models::{AnalysisResult, FinalSummary, RunMetadata, RunMode, RunReport};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &RunReport) -> String {
    let mut output = String::new();

    output.push_str("# RoadBrief Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary));
    output.push_str(&generate_analyses_section(&report.analyses));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &RunMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** `{}`\n", metadata.source));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Mode:** {}\n", metadata.mode));
    section.push_str(&format!("- **Rows:** {}\n", metadata.rows));
    if metadata.mode == RunMode::Batched {
        section.push_str(&format!(
            "- **Batches:** {} (up to {} rows each)\n",
            metadata.batches, metadata.batch_size
        ));
    }
    if let Some(ref model) = metadata.analysis_model {
        section.push_str(&format!("- **Analysis Model:** `{}`\n", model));
    }
    section.push_str(&format!(
        "- **Summary Model:** `{}`\n",
        metadata.summary_model
    ));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn generate_summary_section(summary: &FinalSummary) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    if summary.text.is_empty() {
        section.push_str("*The model returned an empty summary.*\n\n");
    } else {
        section.push_str(&summary.text);
        section.push_str("\n\n");
    }

    section
}

/// Per-batch analyses, one subsection each. Omitted in direct mode.
fn generate_analyses_section(analyses: &[AnalysisResult]) -> String {
    if analyses.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Batch Analyses\n\n");

    for analysis in analyses {
        section.push_str(&format!("### Batch {}\n\n", analysis.batch_index + 1));
        section.push_str(analysis.text.trim());
        section.push_str("\n\n");
    }

    section
}

fn generate_footer() -> String {
    format!(
        "---\n\n*Report generated by RoadBrief v{}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// Generate a JSON report.
pub fn generate_json_report(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
