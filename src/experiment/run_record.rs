//! Run Record - one model fit inside a cross-validated experiment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run is created but not yet started.
    Pending,
    /// Model is fitting or predicting.
    Running,
    /// Fit and predictions completed.
    Success,
    /// Fit or prediction failed.
    Failed,
}

/// Run Record represents a single fit at a (repetition, fold, run) position.
///
/// A cross-validated experiment has `repetitions * n_splits * runs` of these. A run
/// tracks the fit lifecycle from start to completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRecord {
    run_id: String,
    experiment_id: String,
    repetition: usize,
    fold: usize,
    run: usize,
    seed: u64,
    status: RunStatus,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// Create a new run record in Pending status at position (0, 0, 0).
    ///
    /// # Arguments
    ///
    /// * `run_id` - Unique identifier for the run
    /// * `experiment_id` - ID of the parent experiment
    #[must_use]
    pub fn new(run_id: impl Into<String>, experiment_id: impl Into<String>) -> Self {
        RunRecordBuilder::new(run_id, experiment_id).build()
    }

    /// Create a builder for constructing a run record with its position and seed.
    #[must_use]
    pub fn builder(
        run_id: impl Into<String>,
        experiment_id: impl Into<String>,
    ) -> RunRecordBuilder {
        RunRecordBuilder::new(run_id, experiment_id)
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the parent experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the CV repetition index.
    #[must_use]
    pub const fn repetition(&self) -> usize {
        self.repetition
    }

    /// Get the fold index within the repetition.
    #[must_use]
    pub const fn fold(&self) -> usize {
        self.fold
    }

    /// Get the run index within the fold.
    #[must_use]
    pub const fn run(&self) -> usize {
        self.run
    }

    /// Get the model seed.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Get the current run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Get the start timestamp, if the run has started.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Get the end timestamp, if the run has completed.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Start the run, transitioning from Pending to Running.
    ///
    /// Sets the `started_at` timestamp to now.
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Complete the run with the given final status.
    ///
    /// Sets the `ended_at` timestamp to now.
    pub fn complete(&mut self, status: RunStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }
}

/// Builder for `RunRecord`.
#[derive(Debug)]
#[allow(clippy::struct_field_names)]
pub struct RunRecordBuilder {
    run_id: String,
    experiment_id: String,
    repetition: usize,
    fold: usize,
    run: usize,
    seed: u64,
}

impl RunRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(run_id: impl Into<String>, experiment_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            experiment_id: experiment_id.into(),
            repetition: 0,
            fold: 0,
            run: 0,
            seed: 0,
        }
    }

    /// Set the (repetition, fold, run) position.
    #[must_use]
    pub const fn position(mut self, repetition: usize, fold: usize, run: usize) -> Self {
        self.repetition = repetition;
        self.fold = fold;
        self.run = run;
        self
    }

    /// Set the model seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Build the `RunRecord`.
    #[must_use]
    pub fn build(self) -> RunRecord {
        RunRecord {
            run_id: self.run_id,
            experiment_id: self.experiment_id,
            repetition: self.repetition,
            fold: self.fold,
            run: self.run,
            seed: self.seed,
            status: RunStatus::Pending,
            started_at: None,
            ended_at: None,
        }
    }
}
