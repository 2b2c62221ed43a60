//! Prompt templates and rendering.
//!
//! Every prompt is `preamble`, the serialized input, then `instructions`,
//! joined by newlines, plus a system instruction sent as its own message.
//! Rendering never fails: an empty batch renders as `[]` and an empty
//! result list renders an empty body.

use crate::models::{AnalysisResult, Batch, Dataset};
use serde::Serialize;

/// System instruction for per-batch analysis.
pub const ANALYSIS_SYSTEM_PROMPT: &str = "You are an expert in data analysis and problem-solving. Provide detailed analysis and recommendations based on the given data.";

/// System instruction for the closing summary.
pub const SUMMARY_SYSTEM_PROMPT: &str = "You are an expert in summarizing and synthesizing information. Provide a concise summary based on the given data.";

/// System instruction for single-call briefings.
pub const DIRECT_SYSTEM_PROMPT: &str = "You are an assistant that summarizes data.";

const ANALYSIS_INSTRUCTIONS: &str = r#"------ 분석 시작 -----
다음 항목에 대해 분석과 제안을 제공해 주세요:
1. 패턴 및 트렌드 분석: 손상 사건이 특정 지역이나 시간대에 집중되는지 분석할 것
2. 위치 기반 정보 제공: 각 사건의 위치를 분석하여 지역별 위치 정보를 제공할 것
3. 몇 시에, 언제, 몇 월에 가장 많이 발생하는지 정보 요약
4. 어디에서 도로가 손상될지 예측해 볼 것

각 항목에 대해 구체적이고 명확한 분석 및 제안을 제공할 것
------ 분석 끝 -------"#;

const SUMMARY_PREAMBLE: &str = "다음은 여러 분석 결과를 종합한 내용입니다:";

const SUMMARY_INSTRUCTIONS: &str = r#"
위 내용을 바탕으로 바로 본론으로 최종 요약을 제공해 주세요:
1. 전체 분석 결과 요약
2. 주요 패턴 및 트렌드 요약
3. 지역별 도로 손상 정보 요약
4. 몇 시에, 언제, 몇 월에 가장 많이 발생하는지 정보 요약
5. 권장 사항 및 개선 방안 요약

최종 요약을 간결하고 명확하게 작성해 주세요."#;

const DIRECT_PREAMBLE: &str =
    "다음 데이터를 공무원이 주무관에게 보고하는 것처럼 정리하면서 향후 손상 예측도 진행해 주세요:";

const DIRECT_INSTRUCTIONS: &str = "요약:";

/// One system instruction plus the text wrapped around the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub system: String,
    pub preamble: String,
    pub instructions: String,
}

impl PromptTemplate {
    /// Built-in per-batch analysis template.
    pub fn analysis(region: &str) -> Self {
        Self {
            system: ANALYSIS_SYSTEM_PROMPT.to_string(),
            preamble: format!("다음 데이터는 {} 도로 손상 사건에 대한 정보입니다:", region),
            instructions: ANALYSIS_INSTRUCTIONS.to_string(),
        }
    }

    /// Built-in final summary template.
    pub fn summary() -> Self {
        Self {
            system: SUMMARY_SYSTEM_PROMPT.to_string(),
            preamble: SUMMARY_PREAMBLE.to_string(),
            instructions: SUMMARY_INSTRUCTIONS.to_string(),
        }
    }

    /// Built-in single-call briefing template.
    pub fn direct() -> Self {
        Self {
            system: DIRECT_SYSTEM_PROMPT.to_string(),
            preamble: DIRECT_PREAMBLE.to_string(),
            instructions: DIRECT_INSTRUCTIONS.to_string(),
        }
    }

    fn wrap(&self, body: &str) -> RenderedPrompt {
        RenderedPrompt {
            system: self.system.clone(),
            user: format!("{}\n{}\n{}\n", self.preamble, body, self.instructions),
        }
    }
}

/// A prompt ready to be sent: system message and user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

impl RenderedPrompt {
    /// Total prompt size in bytes (used for dry-run output and logs).
    pub fn len(&self) -> usize {
        self.system.len() + self.user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Renders batches, result lists and whole datasets into prompts.
#[derive(Debug, Clone)]
pub struct PromptRenderer {
    analysis: PromptTemplate,
    summary: PromptTemplate,
    direct: PromptTemplate,
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new(
            PromptTemplate::analysis("포항"),
            PromptTemplate::summary(),
            PromptTemplate::direct(),
        )
    }
}

impl From<&crate::config::PromptsConfig> for PromptRenderer {
    fn from(config: &crate::config::PromptsConfig) -> Self {
        let mut analysis = PromptTemplate::analysis(&config.region);
        if let Some(ref system) = config.analysis_system {
            analysis.system = system.clone();
        }
        if let Some(ref instructions) = config.analysis_instructions {
            analysis.instructions = instructions.clone();
        }

        let mut summary = PromptTemplate::summary();
        if let Some(ref system) = config.summary_system {
            summary.system = system.clone();
        }
        if let Some(ref instructions) = config.summary_instructions {
            summary.instructions = instructions.clone();
        }

        Self::new(analysis, summary, PromptTemplate::direct())
    }
}

impl PromptRenderer {
    pub fn new(analysis: PromptTemplate, summary: PromptTemplate, direct: PromptTemplate) -> Self {
        Self {
            analysis,
            summary,
            direct,
        }
    }

    /// Render the analysis prompt for one batch.
    pub fn render_analysis(&self, batch: &Batch<'_>) -> RenderedPrompt {
        let rows: Vec<_> = batch.views().collect();
        self.analysis.wrap(&to_pretty_json(&rows))
    }

    /// Render the summary prompt from analyses in batch order.
    pub fn render_summary(&self, results: &[AnalysisResult]) -> RenderedPrompt {
        let combined = results
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.summary.wrap(&combined)
    }

    /// Render the whole dataset into a single briefing prompt.
    pub fn render_direct(&self, dataset: &Dataset) -> RenderedPrompt {
        let rows: Vec<_> = dataset.views().collect();
        self.direct.wrap(&to_pretty_json(&rows))
    }
}

/// Two-space indented JSON; non-ASCII text is written verbatim.
///
/// Rows are string-keyed maps of scalars, which always serialize.
fn to_pretty_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).expect("rows of scalars always serialize to JSON")
}
