//! Global leaderboard
//!
//! One long-format row per (experiment, evaluation set, metric), kept as a single Arrow
//! `RecordBatch` and persisted to `Leaderboards/GlobalLeaderboard.parquet`.
//!
//! ```text
//! experiment_id | cross_experiment_key | hyperparameter_key | algorithm_name
//!               | dataset | metric | value | recorded_at
//! ```
//!
//! Rows are only ever appended. Ranking filters to one (dataset, metric) pair and runs
//! heap-based Top-K over `value`.

use crate::experiment::ExperimentDescription;
use crate::metrics::EvaluationSet;
use crate::storage::{load_parquet, write_parquet};
use crate::topk::{SortOrder, TopKSelection};
use crate::{Error, Result};
use arrow::array::{
    Array, BooleanArray, Float64Array, StringArray, TimestampMillisecondArray,
};
use arrow::compute::{concat_batches, filter_record_batch};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::{Arc, OnceLock};

const VALUE_COLUMN: usize = 6;

/// Arrow schema of the leaderboard.
#[must_use]
pub fn leaderboard_schema() -> SchemaRef {
    static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
    SCHEMA
        .get_or_init(|| {
            Arc::new(Schema::new(vec![
                Field::new("experiment_id", DataType::Utf8, false),
                Field::new("cross_experiment_key", DataType::Utf8, false),
                Field::new("hyperparameter_key", DataType::Utf8, false),
                Field::new("algorithm_name", DataType::Utf8, false),
                Field::new("dataset", DataType::Utf8, false),
                Field::new("metric", DataType::Utf8, false),
                Field::new("value", DataType::Float64, true),
                Field::new(
                    "recorded_at",
                    DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into())),
                    false,
                ),
            ]))
        })
        .clone()
}

/// One ranked leaderboard row.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    /// Experiment id
    pub experiment_id: String,
    /// Environment fingerprint
    pub cross_experiment_key: String,
    /// Hyperparameter fingerprint
    pub hyperparameter_key: String,
    /// Algorithm name
    pub algorithm_name: String,
    /// Evaluation set
    pub dataset: EvaluationSet,
    /// Metric id
    pub metric: String,
    /// Metric value
    pub value: f64,
    /// Completion time of the experiment
    pub recorded_at: DateTime<Utc>,
}

/// In-memory leaderboard table.
#[derive(Debug, Clone)]
pub struct Leaderboard {
    batch: RecordBatch,
}

impl Default for Leaderboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Leaderboard {
    /// Empty leaderboard.
    #[must_use]
    pub fn new() -> Self {
        Self {
            batch: RecordBatch::new_empty(leaderboard_schema()),
        }
    }

    /// Load from a Parquet file; a missing file is an empty leaderboard.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or has a different schema.
    pub fn load(path: &Path) -> Result<Self> {
        let batches = match load_parquet(path) {
            Ok(batches) => batches,
            Err(Error::NotFound { .. }) => return Ok(Self::new()),
            Err(e) => return Err(e),
        };
        let schema = leaderboard_schema();
        let batches = batches
            .into_iter()
            .map(|b| RecordBatch::try_new(schema.clone(), b.columns().to_vec()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Storage(format!("Leaderboard schema mismatch in {}: {e}", path.display())))?;
        Ok(Self {
            batch: concat_batches(&schema, &batches)?,
        })
    }

    /// Write the whole table to `path`.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_parquet(path, &leaderboard_schema(), std::slice::from_ref(&self.batch))
    }

    /// Append one row per final evaluation of `description`.
    ///
    /// # Errors
    ///
    /// Returns error if the rows cannot be assembled.
    pub fn append(&mut self, description: &ExperimentDescription) -> Result<()> {
        let rows = rows_for(description)?;
        tracing::debug!(
            experiment_id = description.experiment_id(),
            rows = rows.num_rows(),
            "Appending leaderboard rows"
        );
        self.batch = concat_batches(&leaderboard_schema(), [&self.batch, &rows])?;
        Ok(())
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batch.num_rows()
    }

    /// Whether there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    /// Underlying Arrow table.
    #[must_use]
    pub const fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Best `k` rows for one (dataset, metric) pair.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `k` is zero.
    pub fn rank(
        &self,
        dataset: EvaluationSet,
        metric: &str,
        k: usize,
        greater_is_better: bool,
    ) -> Result<Vec<LeaderboardEntry>> {
        let datasets = string_column(&self.batch, 4)?;
        let metrics = string_column(&self.batch, 5)?;
        let mask: BooleanArray = (0..self.batch.num_rows())
            .map(|i| Some(datasets.value(i) == dataset.name() && metrics.value(i) == metric))
            .collect();
        let selected = filter_record_batch(&self.batch, &mask)?;
        let ranked = selected.top_k(VALUE_COLUMN, k, SortOrder::best_first(greater_is_better))?;
        entries(&ranked)
    }
}

/// Load, append and save in one step.
///
/// # Errors
///
/// Returns error if the leaderboard cannot be read or written.
pub fn append_to_leaderboard(path: &Path, description: &ExperimentDescription) -> Result<()> {
    let mut leaderboard = Leaderboard::load(path)?;
    leaderboard.append(description)?;
    leaderboard.save(path)
}

fn rows_for(description: &ExperimentDescription) -> Result<RecordBatch> {
    let rows: Vec<(EvaluationSet, &String, f64)> = description
        .evaluations()
        .iter()
        .flat_map(|(set, values)| values.iter().map(move |(metric, value)| (set, metric, *value)))
        .collect();
    let n = rows.len();
    let repeat = |s: &str| -> Arc<dyn Array> { Arc::new(StringArray::from(vec![s; n])) };
    let recorded_at = description.created_at().timestamp_millis();

    Ok(RecordBatch::try_new(
        leaderboard_schema(),
        vec![
            repeat(description.experiment_id()),
            repeat(description.cross_experiment_key()),
            repeat(description.hyperparameter_key()),
            repeat(description.algorithm_name()),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.0.name()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.1.as_str()))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.2))),
            Arc::new(
                TimestampMillisecondArray::from(vec![recorded_at; n]).with_timezone("UTC"),
            ),
        ],
    )?)
}

fn string_column(batch: &RecordBatch, index: usize) -> Result<&StringArray> {
    batch
        .column(index)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::Storage(format!("Leaderboard column {index} is not Utf8")))
}

fn entries(batch: &RecordBatch) -> Result<Vec<LeaderboardEntry>> {
    let experiment_ids = string_column(batch, 0)?;
    let cross_keys = string_column(batch, 1)?;
    let hyper_keys = string_column(batch, 2)?;
    let algorithms = string_column(batch, 3)?;
    let datasets = string_column(batch, 4)?;
    let metrics = string_column(batch, 5)?;
    let values = batch
        .column(VALUE_COLUMN)
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| Error::Storage("Leaderboard value column is not Float64".to_string()))?;
    let recorded = batch
        .column(7)
        .as_any()
        .downcast_ref::<TimestampMillisecondArray>()
        .ok_or_else(|| Error::Storage("Leaderboard recorded_at column is not a timestamp".to_string()))?;

    (0..batch.num_rows())
        .map(|i| {
            Ok(LeaderboardEntry {
                experiment_id: experiment_ids.value(i).to_string(),
                cross_experiment_key: cross_keys.value(i).to_string(),
                hyperparameter_key: hyper_keys.value(i).to_string(),
                algorithm_name: algorithms.value(i).to_string(),
                dataset: EvaluationSet::from_name(datasets.value(i))?,
                metric: metrics.value(i).to_string(),
                value: values.value(i),
                recorded_at: DateTime::from_timestamp_millis(recorded.value(i)).unwrap_or_default(),
            })
        })
        .collect()
}
