//! Metric Record - per-fold metric values

use crate::metrics::EvaluationSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metric Record represents one metric computed on one fold.
///
/// Stored ordered by `step`, where `step = repetition * n_splits + fold`, so a
/// fold-by-fold curve can be read back for any metric.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRecord {
    experiment_id: String,
    dataset: EvaluationSet,
    key: String,
    step: u64,
    value: f64,
    timestamp: DateTime<Utc>,
}

impl MetricRecord {
    /// Create a new metric record.
    ///
    /// # Arguments
    ///
    /// * `experiment_id` - ID of the parent experiment
    /// * `dataset` - Data the metric was computed on
    /// * `key` - Metric id (e.g., "roc", "f1")
    /// * `step` - Fold position across repetitions
    /// * `value` - Metric value
    #[must_use]
    pub fn new(
        experiment_id: impl Into<String>,
        dataset: EvaluationSet,
        key: impl Into<String>,
        step: u64,
        value: f64,
    ) -> Self {
        MetricRecordBuilder::new(experiment_id, dataset, key, step, value).build()
    }

    /// Create a builder for constructing a metric record with optional fields.
    #[must_use]
    pub fn builder(
        experiment_id: impl Into<String>,
        dataset: EvaluationSet,
        key: impl Into<String>,
        step: u64,
        value: f64,
    ) -> MetricRecordBuilder {
        MetricRecordBuilder::new(experiment_id, dataset, key, step, value)
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the data set.
    #[must_use]
    pub const fn dataset(&self) -> EvaluationSet {
        self.dataset
    }

    /// Get the metric id.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the step.
    #[must_use]
    pub const fn step(&self) -> u64 {
        self.step
    }

    /// Get the metric value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Get the timestamp when the metric was recorded.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Builder for `MetricRecord`.
#[derive(Debug)]
pub struct MetricRecordBuilder {
    record: MetricRecord,
}

impl MetricRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(
        experiment_id: impl Into<String>,
        dataset: EvaluationSet,
        key: impl Into<String>,
        step: u64,
        value: f64,
    ) -> Self {
        Self {
            record: MetricRecord {
                experiment_id: experiment_id.into(),
                dataset,
                key: key.into(),
                step,
                value,
                timestamp: Utc::now(),
            },
        }
    }

    /// Set a custom timestamp.
    #[must_use]
    pub const fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.record.timestamp = timestamp;
        self
    }

    /// Build the `MetricRecord`.
    #[must_use]
    pub fn build(self) -> MetricRecord {
        self.record
    }
}
