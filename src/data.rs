//! Arrow dataset adapters
//!
//! Datasets arrive as Arrow `RecordBatch`es. Models consume a dense, row-major `f64`
//! feature matrix plus a target vector; this module does that conversion once per dataset.

use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;

/// Dense feature matrix and target extracted from a `RecordBatch`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    feature_names: Vec<String>,
    features: Vec<Vec<f64>>,
    target: Vec<f64>,
}

impl Dataset {
    /// Extract features (every column except `target_column`) and the target.
    ///
    /// # Errors
    ///
    /// Returns error if the target column is missing, or a column is not castable
    /// to `Float64`, or contains nulls.
    pub fn from_batch(batch: &RecordBatch, target_column: &str) -> Result<Self> {
        let target_index = column_index(batch, target_column)?;
        let target = column_to_f64(batch.column(target_index), target_column)?;
        let (feature_names, features) = feature_matrix(batch, Some(target_index))?;
        Ok(Self {
            feature_names,
            features,
            target,
        })
    }

    /// Extract the target and the features named in `feature_names`, in that order.
    ///
    /// Used for holdout sets so that their columns line up with the training matrix
    /// regardless of schema order.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the target or any named feature is missing, or a
    /// column is not numeric.
    pub fn from_batch_aligned(
        batch: &RecordBatch,
        target_column: &str,
        feature_names: &[String],
    ) -> Result<Self> {
        let target_index = column_index(batch, target_column)?;
        let target = column_to_f64(batch.column(target_index), target_column)?;
        Ok(Self {
            feature_names: feature_names.to_vec(),
            features: aligned_matrix(batch, feature_names)?,
            target,
        })
    }

    /// Extract the features named in `feature_names`, in that order, without a target.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a named feature is missing or not numeric.
    pub fn features_aligned(batch: &RecordBatch, feature_names: &[String]) -> Result<Self> {
        Ok(Self {
            feature_names: feature_names.to_vec(),
            features: aligned_matrix(batch, feature_names)?,
            target: Vec::new(),
        })
    }

    /// Feature column names, in schema order.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Row-major feature matrix.
    #[must_use]
    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    /// Target values (empty for feature-only datasets).
    #[must_use]
    pub fn target(&self) -> &[f64] {
        &self.target
    }

    /// Number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.features.len()
    }

    /// Select rows by index, preserving the given order.
    #[must_use]
    pub fn take(&self, indices: &[usize]) -> Self {
        Self {
            feature_names: self.feature_names.clone(),
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            target: if self.target.is_empty() {
                Vec::new()
            } else {
                indices.iter().map(|&i| self.target[i]).collect()
            },
        }
    }
}

/// Index of `name` in the batch schema.
///
/// # Errors
///
/// Returns a validation error if the column is missing.
pub fn column_index(batch: &RecordBatch, name: &str) -> Result<usize> {
    batch.schema().index_of(name).map_err(|_| {
        Error::Validation(format!(
            "target_column '{name}' not found in dataset columns {:?}",
            column_names(batch)
        ))
    })
}

/// Column names of a batch, in schema order.
#[must_use]
pub fn column_names(batch: &RecordBatch) -> Vec<String> {
    batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect()
}

/// Whether two batches carry the same set of column names.
#[must_use]
pub fn same_columns(a: &RecordBatch, b: &RecordBatch) -> bool {
    let mut left = column_names(a);
    let mut right = column_names(b);
    left.sort();
    right.sort();
    left == right
}

/// Check that `other` carries exactly the feature columns of `train`.
///
/// The target column is ignored on both sides, so `other` may omit it.
///
/// # Errors
///
/// Returns `Validation("Mismatched columns ...")` naming both column lists.
pub fn check_feature_columns(
    train: &RecordBatch,
    other: &RecordBatch,
    target_column: &str,
    label: &str,
) -> Result<()> {
    let features = |batch: &RecordBatch| {
        let mut names: Vec<String> = column_names(batch)
            .into_iter()
            .filter(|name| name != target_column)
            .collect();
        names.sort();
        names
    };
    if features(train) == features(other) {
        return Ok(());
    }
    Err(Error::Validation(format!(
        "Mismatched columns\nTrain columns: {:?}\n{label} columns: {:?}",
        column_names(train),
        column_names(other)
    )))
}

fn aligned_matrix(batch: &RecordBatch, feature_names: &[String]) -> Result<Vec<Vec<f64>>> {
    let schema = batch.schema();
    let columns = feature_names
        .iter()
        .map(|name| {
            let index = schema.index_of(name).map_err(|_| {
                Error::Validation(format!(
                    "Mismatched columns: feature '{name}' not found in {:?}",
                    column_names(batch)
                ))
            })?;
            column_to_f64(batch.column(index), name)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((0..batch.num_rows())
        .map(|row| columns.iter().map(|col| col[row]).collect())
        .collect())
}

fn feature_matrix(
    batch: &RecordBatch,
    skip: Option<usize>,
) -> Result<(Vec<String>, Vec<Vec<f64>>)> {
    let schema = batch.schema();
    let mut names = Vec::with_capacity(batch.num_columns());
    let mut columns = Vec::with_capacity(batch.num_columns());

    for (index, field) in schema.fields().iter().enumerate() {
        if Some(index) == skip {
            continue;
        }
        names.push(field.name().clone());
        columns.push(column_to_f64(batch.column(index), field.name())?);
    }

    let rows = (0..batch.num_rows())
        .map(|row| columns.iter().map(|col| col[row]).collect())
        .collect();
    Ok((names, rows))
}

fn column_to_f64(column: &ArrayRef, name: &str) -> Result<Vec<f64>> {
    if column.null_count() > 0 {
        return Err(Error::Validation(format!(
            "column '{name}' contains {} null values",
            column.null_count()
        )));
    }

    let casted = cast(column, &DataType::Float64).map_err(|e| {
        Error::Validation(format!("column '{name}' is not numeric: {e}"))
    })?;
    // safe casts turn unparseable cells into nulls
    if casted.null_count() > 0 {
        return Err(Error::Validation(format!("column '{name}' is not numeric")));
    }
    let values = casted
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| Error::Other(format!("Failed to downcast column '{name}' to Float64Array")))?;

    Ok(values.values().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int32Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    fn sample() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Float64, false),
            Field::new("b", DataType::Int32, false),
            Field::new("label", DataType::Int32, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Float64Array::from(vec![0.5, 1.5, 2.5])),
                Arc::new(Int32Array::from(vec![1, 2, 3])),
                Arc::new(Int32Array::from(vec![0, 1, 0])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_from_batch_splits_target() {
        let ds = Dataset::from_batch(&sample(), "label").unwrap();
        assert_eq!(ds.feature_names(), &["a".to_string(), "b".to_string()]);
        assert_eq!(ds.features()[1], vec![1.5, 2.0]);
        assert_eq!(ds.target(), &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_missing_target_is_validation_error() {
        let err = Dataset::from_batch(&sample(), "diagnosis").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_take_preserves_order() {
        let ds = Dataset::from_batch(&sample(), "label").unwrap();
        let sub = ds.take(&[2, 0]);
        assert_eq!(sub.target(), &[0.0, 0.0]);
        assert_eq!(sub.features()[0][0], 2.5);
    }

    #[test]
    fn test_aligned_follows_given_order() {
        let names = vec!["b".to_string(), "a".to_string()];
        let ds = Dataset::from_batch_aligned(&sample(), "label", &names).unwrap();
        assert_eq!(ds.feature_names(), names.as_slice());
        assert_eq!(ds.features()[0], vec![1.0, 0.5]);
        assert_eq!(ds.target(), &[0.0, 1.0, 0.0]);

        let test = Dataset::features_aligned(&sample(), &names).unwrap();
        assert_eq!(test.features(), ds.features());
        assert!(test.target().is_empty());
    }

    #[test]
    fn test_aligned_missing_feature_rejected() {
        let names = vec!["a".to_string(), "c".to_string()];
        let err = Dataset::features_aligned(&sample(), &names).unwrap_err();
        assert!(matches!(err, Error::Validation(m) if m.starts_with("Mismatched columns")));
    }

    #[test]
    fn test_check_feature_columns_ignores_target_and_order() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("b", DataType::Int32, false),
            Field::new("a", DataType::Float64, false),
        ]));
        let test = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int32Array::from(vec![7])),
                Arc::new(Float64Array::from(vec![0.1])),
            ],
        )
        .unwrap();
        assert!(check_feature_columns(&sample(), &test, "label", "Test").is_ok());

        let narrow = test.project(&[0]).unwrap();
        let err = check_feature_columns(&sample(), &narrow, "label", "Test").unwrap_err();
        assert!(matches!(err, Error::Validation(m) if m.contains("Test columns")));
    }

    #[test]
    fn test_non_numeric_column_rejected() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("name", DataType::Utf8, false),
            Field::new("label", DataType::Int32, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["x", "y"])),
                Arc::new(Int32Array::from(vec![0, 1])),
            ],
        )
        .unwrap();
        assert!(Dataset::from_batch(&batch, "label").is_err());
    }
}
