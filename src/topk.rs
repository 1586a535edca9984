//! Top-K selection over leaderboard scores
//!
//! **Problem**: ranking a leaderboard with a full sort is O(N log N), though a report only
//! ever shows the best few experiments.
//!
//! **Solution**: heap-based Top-K selection, O(N log K), over a `Float64` score column.
//! Nulls and NaN scores never rank.

use crate::Error;
use arrow::array::{Array, Float64Array, UInt64Array};
use arrow::compute::take_record_batch;
use arrow::record_batch::RecordBatch;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Sort order for Top-K selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending order (smallest K values)
    Ascending,
    /// Descending order (largest K values)
    Descending,
}

impl SortOrder {
    /// Order that puts the best score first for a metric direction.
    #[must_use]
    pub const fn best_first(greater_is_better: bool) -> Self {
        if greater_is_better {
            Self::Descending
        } else {
            Self::Ascending
        }
    }

    const fn prefers(self, a: f64, b: f64) -> bool {
        match self {
            Self::Descending => a > b,
            Self::Ascending => a < b,
        }
    }
}

/// Trait for Top-K selection on record batches
pub trait TopKSelection {
    /// Select top K rows by a `Float64` column
    ///
    /// # Arguments
    /// * `column_index` - Index of the score column
    /// * `k` - Number of rows to select
    /// * `order` - Sort order (Ascending or Descending)
    ///
    /// # Returns
    /// A new `RecordBatch` containing at most K rows, best first
    ///
    /// # Errors
    /// Returns error if:
    /// - Column index is out of bounds
    /// - Column is not `Float64`
    /// - K is zero
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hyperhunt::topk::{TopKSelection, SortOrder};
    /// use arrow::array::{Float64Array, RecordBatch};
    /// use arrow::datatypes::{DataType, Field, Schema};
    /// use std::sync::Arc;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let schema = Arc::new(Schema::new(vec![
    ///     Field::new("value", DataType::Float64, false),
    /// ]));
    /// let batch = RecordBatch::try_new(
    ///     schema,
    ///     vec![Arc::new(Float64Array::from(vec![0.71, 0.93, 0.88, 0.64, 0.90]))],
    /// )?;
    ///
    /// // Three best ROC AUC scores
    /// let top3 = batch.top_k(0, 3, SortOrder::Descending)?;
    /// assert_eq!(top3.num_rows(), 3);
    /// # Ok(())
    /// # }
    /// ```
    fn top_k(&self, column_index: usize, k: usize, order: SortOrder) -> crate::Result<RecordBatch>;
}

impl TopKSelection for RecordBatch {
    fn top_k(&self, column_index: usize, k: usize, order: SortOrder) -> crate::Result<RecordBatch> {
        if column_index >= self.num_columns() {
            return Err(Error::InvalidInput(format!(
                "Column index {} out of bounds (batch has {} columns)",
                column_index,
                self.num_columns()
            )));
        }

        let column = self
            .column(column_index)
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "Top-K requires a Float64 column, found {:?}",
                    self.column(column_index).data_type()
                ))
            })?;

        let indices = top_k_indices(column, k, order)?;
        let indices = UInt64Array::from(indices.into_iter().map(|i| i as u64).collect::<Vec<_>>());
        Ok(take_record_batch(self, &indices)?)
    }
}

/// Indices of the K best non-null, non-NaN values, best first.
///
/// Ties keep row order.
///
/// # Errors
/// Returns `InvalidInput` if K is zero
pub fn top_k_indices(array: &Float64Array, k: usize, order: SortOrder) -> crate::Result<Vec<usize>> {
    if k == 0 {
        return Err(Error::InvalidInput("k must be greater than 0".to_string()));
    }

    // The heap top is the worst of the kept items, so it is the one to evict.
    let mut heap: BinaryHeap<HeapItem> = BinaryHeap::with_capacity(k.min(array.len()) + 1);
    for index in 0..array.len() {
        if array.is_null(index) || array.value(index).is_nan() {
            continue;
        }
        let item = HeapItem {
            value: array.value(index),
            index,
            order,
        };
        if heap.len() < k {
            heap.push(item);
        } else if let Some(top) = heap.peek() {
            if order.prefers(item.value, top.value) {
                heap.pop();
                heap.push(item);
            }
        }
    }

    let mut result = heap.into_sorted_vec();
    result.truncate(k);
    Ok(result.into_iter().map(|item| item.index).collect())
}

// Ordered so that "greater" means "worse": the max-heap keeps the worst kept item on top,
// and an ascending sort yields best first.
#[derive(Debug)]
struct HeapItem {
    value: f64,
    index: usize,
    order: SortOrder,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapItem {}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_value = match self.order {
            SortOrder::Descending => other.value.total_cmp(&self.value),
            SortOrder::Ascending => self.value.total_cmp(&other.value),
        };
        by_value.then(self.index.cmp(&other.index))
    }
}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::StringArray;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn create_test_batch(values: Vec<Option<f64>>) -> RecordBatch {
        let ids: Vec<String> = (0..values.len()).map(|i| format!("exp-{i}")).collect();
        let schema = Arc::new(Schema::new(vec![
            Field::new("experiment_id", DataType::Utf8, false),
            Field::new("value", DataType::Float64, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(Float64Array::from(values)),
            ],
        )
        .unwrap()
    }

    fn values(batch: &RecordBatch) -> Vec<f64> {
        batch
            .column(1)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap()
            .values()
            .to_vec()
    }

    fn ids(batch: &RecordBatch) -> Vec<String> {
        let array = batch.column(0).as_any().downcast_ref::<StringArray>().unwrap();
        (0..array.len()).map(|i| array.value(i).to_string()).collect()
    }

    #[test]
    fn test_top_k_descending_basic() {
        let batch = create_test_batch(vec![Some(0.7), Some(0.9), Some(0.8), Some(0.6)]);
        let top = batch.top_k(1, 2, SortOrder::Descending).unwrap();
        assert_eq!(values(&top), vec![0.9, 0.8]);
        assert_eq!(ids(&top), vec!["exp-1", "exp-2"]);
    }

    #[test]
    fn test_top_k_ascending_basic() {
        let batch = create_test_batch(vec![Some(0.7), Some(0.9), Some(0.8), Some(0.6)]);
        let top = batch.top_k(1, 3, SortOrder::Ascending).unwrap();
        assert_eq!(values(&top), vec![0.6, 0.7, 0.8]);
    }

    #[test]
    fn test_top_k_greater_than_length() {
        let batch = create_test_batch(vec![Some(0.2), Some(0.1)]);
        let top = batch.top_k(1, 10, SortOrder::Descending).unwrap();
        assert_eq!(values(&top), vec![0.2, 0.1]);
    }

    #[test]
    fn test_top_k_skips_nulls_and_nan() {
        let batch = create_test_batch(vec![None, Some(f64::NAN), Some(0.5), Some(0.4)]);
        let top = batch.top_k(1, 4, SortOrder::Descending).unwrap();
        assert_eq!(ids(&top), vec!["exp-2", "exp-3"]);
    }

    #[test]
    fn test_top_k_ties_keep_row_order() {
        let batch = create_test_batch(vec![Some(0.5), Some(0.9), Some(0.5), Some(0.5)]);
        let top = batch.top_k(1, 3, SortOrder::Descending).unwrap();
        assert_eq!(ids(&top), vec!["exp-1", "exp-0", "exp-2"]);
    }

    #[test]
    fn test_top_k_k_zero_fails() {
        let batch = create_test_batch(vec![Some(1.0)]);
        assert!(matches!(
            batch.top_k(1, 0, SortOrder::Descending),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_top_k_invalid_column() {
        let batch = create_test_batch(vec![Some(1.0)]);
        assert!(batch.top_k(5, 1, SortOrder::Descending).is_err());
        assert!(batch.top_k(0, 1, SortOrder::Descending).is_err());
    }

    #[test]
    fn test_best_first() {
        assert_eq!(SortOrder::best_first(true), SortOrder::Descending);
        assert_eq!(SortOrder::best_first(false), SortOrder::Ascending);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_top_k_matches_full_sort(
                values in prop::collection::vec(-1000.0f64..1000.0, 1..200),
                k in 1usize..50,
                descending in any::<bool>(),
            ) {
                let order = if descending { SortOrder::Descending } else { SortOrder::Ascending };
                let array = Float64Array::from(values.clone());
                let selected: Vec<f64> = top_k_indices(&array, k, order)
                    .unwrap()
                    .into_iter()
                    .map(|i| values[i])
                    .collect();

                let mut sorted = values;
                sorted.sort_by(f64::total_cmp);
                if descending {
                    sorted.reverse();
                }
                sorted.truncate(k);
                prop_assert_eq!(selected, sorted);
            }
        }
    }
}
