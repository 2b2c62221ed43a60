//! Batch partitioning.

use crate::error::{PipelineError, Result};
use crate::models::{Batch, Dataset};

/// Split a dataset into contiguous batches of at most `batch_size` rows.
///
/// Batches cover the dataset exactly once, in row order; only the last
/// batch may be shorter. An empty dataset yields no batches.
pub fn partition(dataset: &Dataset, batch_size: usize) -> Result<Vec<Batch<'_>>> {
    if batch_size == 0 {
        return Err(PipelineError::config("batch size must be at least 1"));
    }

    Ok(dataset
        .records()
        .chunks(batch_size)
        .enumerate()
        .map(|(index, records)| Batch {
            index,
            start: index * batch_size,
            columns: dataset.columns(),
            records,
        })
        .collect())
}

/// Number of batches `partition` produces for `rows` rows.
pub fn batch_count(rows: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        0
    } else {
        rows.div_ceil(batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use crate::test_support::synthetic_dataset;

    #[test]
    fn test_partition_covers_dataset_in_order() {
        for (rows, batch_size) in [(0, 1), (1, 1), (7, 3), (9, 3), (250, 100), (5, 100)] {
            let dataset = synthetic_dataset(rows);
            let batches = partition(&dataset, batch_size).unwrap();

            assert_eq!(batches.len(), batch_count(rows, batch_size));
            assert_eq!(batches.iter().map(|b| b.len()).sum::<usize>(), rows);
            assert!(batches.iter().all(|b| b.len() <= batch_size && !b.is_empty()));

            let rejoined: Vec<Record> = batches
                .iter()
                .flat_map(|b| b.records.iter().cloned())
                .collect();
            assert_eq!(rejoined.as_slice(), dataset.records());

            for (i, batch) in batches.iter().enumerate() {
                assert_eq!(batch.index, i);
                assert_eq!(batch.start, i * batch_size);
            }
        }
    }

    #[test]
    fn test_only_last_batch_is_short() {
        let dataset = synthetic_dataset(250);
        let sizes: Vec<usize> = partition(&dataset, 100)
            .unwrap()
            .iter()
            .map(|b| b.len())
            .collect();
        assert_eq!(sizes, vec![100, 100, 50]);
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let dataset = synthetic_dataset(3);
        assert!(matches!(
            partition(&dataset, 0),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_empty_dataset_has_no_batches() {
        let dataset = synthetic_dataset(0);
        assert!(partition(&dataset, 100).unwrap().is_empty());
    }
}
