//! Holdout dataset definition

use crate::data::{column_names, same_columns};
use crate::storage::load_parquet_batch;
use crate::{Error, Result};
use arrow::record_batch::RecordBatch;
use std::fmt;
use std::path::PathBuf;

type SplitFn = dyn Fn(&RecordBatch, &str) -> Result<(RecordBatch, RecordBatch)>;

/// Where the holdout dataset comes from.
pub enum HoldoutSource {
    /// A ready batch
    Dataset(RecordBatch),
    /// A Parquet file
    Path(PathBuf),
    /// A function `(train, target_column) -> (train, holdout)`
    Split(Box<SplitFn>),
}

impl HoldoutSource {
    /// Wrap a split function.
    pub fn split<F>(f: F) -> Self
    where
        F: Fn(&RecordBatch, &str) -> Result<(RecordBatch, RecordBatch)> + 'static,
    {
        Self::Split(Box::new(f))
    }
}

impl fmt::Debug for HoldoutSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dataset(batch) => f
                .debug_tuple("Dataset")
                .field(&format_args!("{} rows", batch.num_rows()))
                .finish(),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Split(_) => f.write_str("Split(<fn>)"),
        }
    }
}

/// Resolve the holdout dataset, possibly replacing `train`.
///
/// # Errors
///
/// - `NotFound` for a missing holdout path
/// - `Validation` for an unsupported file extension
/// - `Validation("Mismatched columns ...")` when holdout and train columns differ
pub fn define_holdout_set(
    train: RecordBatch,
    source: Option<HoldoutSource>,
    target_column: &str,
) -> Result<(RecordBatch, Option<RecordBatch>)> {
    let (train, holdout) = match source {
        None => return Ok((train, None)),
        Some(HoldoutSource::Dataset(holdout)) => (train, holdout),
        Some(HoldoutSource::Path(path)) => {
            if !path.exists() {
                return Err(Error::not_found(path));
            }
            match path.extension().and_then(|e| e.to_str()) {
                Some("parquet") => (train, load_parquet_batch(&path)?),
                other => {
                    return Err(Error::Validation(format!(
                        "Unsupported holdout file extension {other:?} for {}; expected .parquet",
                        path.display()
                    )))
                }
            }
        }
        Some(HoldoutSource::Split(split)) => split(&train, target_column)?,
    };

    if !same_columns(&train, &holdout) {
        return Err(Error::Validation(format!(
            "Mismatched columns\nTrain columns: {:?}\nHoldout columns: {:?}",
            column_names(&train),
            column_names(&holdout)
        )));
    }
    Ok((train, Some(holdout)))
}
