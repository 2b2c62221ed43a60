//! Data models for the analysis pipeline.
//!
//! This module contains the core data structures used throughout the
//! application: dataset rows, batches, per-batch results, the final
//! summary and the run report.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Timestamp layouts accepted when inferring cell types.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
];

/// Layout used when a timestamp is written into a prompt or report.
const TIMESTAMP_OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Empty cell
    Null,
    Integer(i64),
    /// Always finite
    Float(f64),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl Scalar {
    /// Infer the most specific scalar type for a raw cell.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Scalar::Null;
        }

        if let Ok(i) = trimmed.parse::<i64>() {
            return Scalar::Integer(i);
        }

        if let Ok(f) = trimmed.parse::<f64>() {
            // "NaN" and "inf" parse as floats but have no JSON form
            if f.is_finite() {
                return Scalar::Float(f);
            }
        }

        for format in TIMESTAMP_FORMATS {
            if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Scalar::Timestamp(ts);
            }
        }

        Scalar::Text(raw.to_string())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_OUTPUT_FORMAT)),
            Scalar::Text(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Integer(i) => serializer.serialize_i64(*i),
            Scalar::Float(x) => serializer.serialize_f64(*x),
            Scalar::Timestamp(ts) => {
                serializer.collect_str(&ts.format(TIMESTAMP_OUTPUT_FORMAT))
            }
            Scalar::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// One row of the dataset, positionally aligned with the column schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Vec<Scalar>,
}

impl Record {
    pub fn new(values: Vec<Scalar>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    /// Build a new record keeping only the given column positions, in order.
    pub(crate) fn project(&self, positions: &[usize]) -> Self {
        Self {
            values: positions
                .iter()
                .map(|&i| self.values.get(i).cloned().unwrap_or(Scalar::Null))
                .collect(),
        }
    }
}

/// A record paired with its column names, serialized as a JSON object
/// whose keys follow schema order.
pub struct RecordView<'a> {
    pub columns: &'a [String],
    pub record: &'a Record,
}

impl Serialize for RecordView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(self.record.values()) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// An ordered sequence of records sharing one column schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl Dataset {
    /// Creates a dataset. Every record must have one value per column.
    pub fn new(columns: Vec<String>, records: Vec<Record>) -> crate::error::Result<Self> {
        if let Some(pos) = records
            .iter()
            .position(|r| r.values().len() != columns.len())
        {
            return Err(crate::error::PipelineError::config(format!(
                "record {} has {} values but the schema has {} columns",
                pos,
                records[pos].values().len(),
                columns.len()
            )));
        }
        Ok(Self { columns, records })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Position of a column in the schema.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterate over records as serializable views.
    pub fn views(&self) -> impl Iterator<Item = RecordView<'_>> {
        self.records.iter().map(move |record| RecordView {
            columns: &self.columns,
            record,
        })
    }
}

/// A contiguous slice of the dataset processed as one request.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    /// Position of this batch in the partition (0-based).
    pub index: usize,
    /// Row offset of the first record in the dataset.
    pub start: usize,
    pub columns: &'a [String],
    pub records: &'a [Record],
}

impl<'a> Batch<'a> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over records as serializable views.
    pub fn views(&self) -> impl Iterator<Item = RecordView<'a>> + 'a {
        let columns = self.columns;
        let records = self.records;
        records
            .iter()
            .map(move |record| RecordView { columns, record })
    }
}

/// Free-text answer for one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub batch_index: usize,
    pub text: String,
}

/// The terminal output of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalSummary {
    pub text: String,
    /// Model that produced the summary.
    pub model: String,
}

/// How the dataset was sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Per-batch analyses followed by one summary request
    #[default]
    Batched,
    /// Whole dataset in one request
    Direct,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Batched => write!(f, "Batched (fan-out + summary)"),
            RunMode::Direct => write!(f, "Direct (single call)"),
        }
    }
}

/// Metadata about a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Path of the input dataset.
    pub source: String,
    /// Date and time of the run.
    pub analysis_date: DateTime<Utc>,
    pub mode: RunMode,
    /// Number of rows loaded.
    pub rows: usize,
    /// Number of batches sent for analysis.
    pub batches: usize,
    pub batch_size: usize,
    /// Model used for per-batch analysis (batched mode only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_model: Option<String>,
    /// Model used for the final summary.
    pub summary_model: String,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// Everything a report needs about one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub summary: FinalSummary,
    /// Per-batch analyses in batch order.
    pub analyses: Vec<AnalysisResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_inference() {
        assert_eq!(Scalar::infer(""), Scalar::Null);
        assert_eq!(Scalar::infer("   "), Scalar::Null);
        assert_eq!(Scalar::infer("42"), Scalar::Integer(42));
        assert_eq!(Scalar::infer("-7"), Scalar::Integer(-7));
        assert_eq!(Scalar::infer("129.3651"), Scalar::Float(129.3651));
        assert_eq!(Scalar::infer("NaN"), Scalar::Text("NaN".to_string()));
        assert_eq!(
            Scalar::infer("포항시 남구 대잠동"),
            Scalar::Text("포항시 남구 대잠동".to_string())
        );
        assert!(matches!(
            Scalar::infer("2023-05-01 14:03:22.417"),
            Scalar::Timestamp(_)
        ));
        assert!(matches!(
            Scalar::infer("2023-05-01T14:03:22"),
            Scalar::Timestamp(_)
        ));
    }

    #[test]
    fn test_timestamp_drops_fraction() {
        let ts = Scalar::infer("2023-05-01 14:03:22.417");
        assert_eq!(ts.to_string(), "2023-05-01 14:03:22");
        assert_eq!(
            serde_json::to_string(&ts).unwrap(),
            "\"2023-05-01 14:03:22\""
        );
    }

    #[test]
    fn test_record_view_keeps_column_order() {
        let columns = vec!["id".to_string(), "classname".to_string(), "lat".to_string()];
        let record = Record::new(vec![
            Scalar::Integer(3),
            Scalar::Text("crack".to_string()),
            Scalar::Null,
        ]);
        let view = RecordView {
            columns: &columns,
            record: &record,
        };
        assert_eq!(
            serde_json::to_string(&view).unwrap(),
            r#"{"id":3,"classname":"crack","lat":null}"#
        );
    }

    #[test]
    fn test_dataset_rejects_ragged_records() {
        let columns = vec!["a".to_string(), "b".to_string()];
        let records = vec![Record::new(vec![Scalar::Integer(1)])];
        assert!(Dataset::new(columns, records).is_err());
    }

    #[test]
    fn test_record_projection() {
        let record = Record::new(vec![
            Scalar::Integer(1),
            Scalar::Integer(2),
            Scalar::Integer(3),
        ]);
        let projected = record.project(&[2, 0]);
        assert_eq!(
            projected.values(),
            &[Scalar::Integer(3), Scalar::Integer(1)]
        );
    }
}
