//! Dataset loading and column projection.
//!
//! Reads a delimited text file with a header row into a [`Dataset`],
//! inferring a [`Scalar`] per cell, then applies the configured column
//! drop/select steps.

use crate::error::{PipelineError, Result};
use crate::models::{Dataset, Record, Scalar};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// Options controlling how a dataset is read.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Field delimiter (single byte)
    pub delimiter: u8,
    /// Columns to keep, in output order. `None` keeps every column.
    pub columns: Option<Vec<String>>,
    /// Columns to remove before selection.
    pub drop_columns: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            columns: None,
            drop_columns: Vec::new(),
        }
    }
}

impl From<&crate::config::DatasetConfig> for LoadOptions {
    fn from(config: &crate::config::DatasetConfig) -> Self {
        Self {
            delimiter: config.delimiter_byte(),
            columns: config.columns.clone(),
            drop_columns: config.drop_columns.clone(),
        }
    }
}

/// Load a dataset from a file.
pub async fn load_dataset(path: &Path, options: &LoadOptions) -> Result<Dataset> {
    info!("Loading dataset: {}", path.display());

    let bytes = tokio::fs::read(path).await.map_err(|e| {
        PipelineError::config(format!("cannot read input file {}: {}", path.display(), e))
    })?;

    let dataset = read_dataset(bytes.as_slice(), &path.display().to_string(), options)?;
    info!(
        "Loaded {} rows x {} columns",
        dataset.len(),
        dataset.columns().len()
    );
    Ok(dataset)
}

/// Parse a dataset from any reader. `source` is only used in error messages.
pub fn read_dataset<R: Read>(reader: R, source: &str, options: &LoadOptions) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(options.delimiter)
        .from_reader(reader);

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| csv_error(source, 1, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    debug!("Columns: {:?}", columns);

    let mut records = Vec::new();
    let mut line = 2; // Line 1 is the header

    for result in reader.records() {
        let row = result.map_err(|e| csv_error(source, line, e))?;
        records.push(Record::new(row.iter().map(Scalar::infer).collect()));
        line += 1;
    }

    let dataset = Dataset::new(columns, records)?;
    project(dataset, options)
}

fn csv_error(source: &str, line: u64, err: csv::Error) -> PipelineError {
    let line = err.position().map(|p| p.line()).unwrap_or(line);
    PipelineError::Dataset {
        path: source.to_string(),
        line,
        message: err.to_string(),
    }
}

/// Apply drop and select steps.
pub fn project(dataset: Dataset, options: &LoadOptions) -> Result<Dataset> {
    if options.drop_columns.is_empty() && options.columns.is_none() {
        return Ok(dataset);
    }

    let mut keep: Vec<usize> = (0..dataset.columns().len()).collect();

    for name in &options.drop_columns {
        match dataset.column_index(name) {
            Some(pos) => keep.retain(|&i| i != pos),
            None => warn!("Cannot drop unknown column '{}'", name),
        }
    }

    if let Some(ref selected) = options.columns {
        let mut positions = Vec::with_capacity(selected.len());
        for name in selected {
            let pos = dataset
                .column_index(name)
                .filter(|pos| keep.contains(pos))
                .ok_or_else(|| PipelineError::config(format!("unknown column '{}'", name)))?;
            positions.push(pos);
        }
        keep = positions;
    }

    let columns = keep
        .iter()
        .map(|&i| dataset.columns()[i].clone())
        .collect();
    let records = dataset
        .records()
        .iter()
        .map(|r| r.project(&keep))
        .collect();

    Dataset::new(columns, records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
id,longitude,latitude,classname,time,address,status
1,129.3651,36.0190,crack,2023-05-01 14:03:22.417,포항시 남구 대잠동,open
2,129.3702,36.0211,pothole,2023-05-02 09:10:00.000,포항시 북구 양덕동,
";

    #[test]
    fn test_read_dataset_infers_types() {
        let dataset = read_dataset(SAMPLE.as_bytes(), "sample", &LoadOptions::default()).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.columns()[0], "id");
        let first = dataset.records()[0].values();
        assert_eq!(first[0], Scalar::Integer(1));
        assert_eq!(first[1], Scalar::Float(129.3651));
        assert!(matches!(first[4], Scalar::Timestamp(_)));
        assert_eq!(first[5], Scalar::Text("포항시 남구 대잠동".to_string()));
        assert_eq!(dataset.records()[1].values()[6], Scalar::Null);
    }

    #[test]
    fn test_drop_then_select_reorders() {
        let options = LoadOptions {
            drop_columns: vec!["status".to_string(), "missing".to_string()],
            columns: Some(vec![
                "id".to_string(),
                "classname".to_string(),
                "address".to_string(),
            ]),
            ..LoadOptions::default()
        };
        let dataset = read_dataset(SAMPLE.as_bytes(), "sample", &options).unwrap();

        assert_eq!(dataset.columns(), &["id", "classname", "address"]);
        assert_eq!(
            dataset.records()[1].values()[1],
            Scalar::Text("pothole".to_string())
        );
    }

    #[test]
    fn test_select_unknown_column_fails() {
        let options = LoadOptions {
            columns: Some(vec!["gu".to_string()]),
            ..LoadOptions::default()
        };
        let err = read_dataset(SAMPLE.as_bytes(), "sample", &options).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_select_dropped_column_fails() {
        let options = LoadOptions {
            drop_columns: vec!["id".to_string()],
            columns: Some(vec!["id".to_string()]),
            ..LoadOptions::default()
        };
        assert!(read_dataset(SAMPLE.as_bytes(), "sample", &options).is_err());
    }

    #[test]
    fn test_ragged_row_reports_line() {
        let data = "a,b\n1,2\n3\n";
        let err = read_dataset(data.as_bytes(), "ragged.csv", &LoadOptions::default()).unwrap_err();
        match err {
            PipelineError::Dataset { path, line, .. } => {
                assert_eq!(path, "ragged.csv");
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_custom_delimiter() {
        let data = "a;b\n1;x\n";
        let options = LoadOptions {
            delimiter: b';',
            ..LoadOptions::default()
        };
        let dataset = read_dataset(data.as_bytes(), "semi", &options).unwrap();
        assert_eq!(dataset.columns(), &["a", "b"]);
        assert_eq!(dataset.records()[0].values()[1], Scalar::Text("x".to_string()));
    }

    #[test]
    fn test_header_only_file_is_empty_dataset() {
        let dataset = read_dataset("a,b\n".as_bytes(), "empty", &LoadOptions::default()).unwrap();
        assert!(dataset.is_empty());
        assert_eq!(dataset.columns().len(), 2);
    }

    #[tokio::test]
    async fn test_load_dataset_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let dataset = load_dataset(file.path(), &LoadOptions::default())
            .await
            .unwrap();
        assert_eq!(dataset.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_configuration_error() {
        let err = load_dataset(Path::new("/nonexistent/roads.csv"), &LoadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfiguration(_)));
    }
}
