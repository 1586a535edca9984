//! Experiment Description - the persisted record of one completed experiment

use super::{ArtifactRecord, MetricRecord, RunRecord};
use crate::metrics::EvaluationSet;
use crate::model::Hyperparameters;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Final evaluations per data set (`metric id -> value`); `None` where skipped.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Evaluations {
    /// Average over folds of metrics on the training rows
    #[serde(default)]
    pub in_fold: Option<BTreeMap<String, f64>>,
    /// Metrics on the full out-of-fold prediction vector
    #[serde(default)]
    pub oof: Option<BTreeMap<String, f64>>,
    /// Metrics on the averaged holdout predictions
    #[serde(default)]
    pub holdout: Option<BTreeMap<String, f64>>,
}

impl Evaluations {
    /// Evaluations for one set.
    #[must_use]
    pub const fn get(&self, set: EvaluationSet) -> Option<&BTreeMap<String, f64>> {
        match set {
            EvaluationSet::InFold => self.in_fold.as_ref(),
            EvaluationSet::Oof => self.oof.as_ref(),
            EvaluationSet::Holdout => self.holdout.as_ref(),
        }
    }

    /// Replace the evaluations for one set.
    pub fn set(&mut self, set: EvaluationSet, values: Option<BTreeMap<String, f64>>) {
        match set {
            EvaluationSet::InFold => self.in_fold = values,
            EvaluationSet::Oof => self.oof = values,
            EvaluationSet::Holdout => self.holdout = values,
        }
    }

    /// Single metric value.
    #[must_use]
    pub fn value(&self, set: EvaluationSet, metric: &str) -> Option<f64> {
        self.get(set).and_then(|m| m.get(metric)).copied()
    }

    /// Present evaluations in report order (OOF, Holdout, In-Fold).
    pub fn iter(&self) -> impl Iterator<Item = (EvaluationSet, &BTreeMap<String, f64>)> {
        EvaluationSet::ALL
            .into_iter()
            .filter_map(|set| self.get(set).map(|m| (set, m)))
    }
}

/// Experiment Description represents a completed experiment.
///
/// This is the root entity in the result store. It is written once, when the
/// experiment finishes, and read back by similarity lookups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentDescription {
    experiment_id: String,
    cross_experiment_key: String,
    hyperparameter_key: String,
    algorithm_name: String,
    hyperparameters: Hyperparameters,
    evaluations: Evaluations,
    #[serde(default)]
    runs: Vec<RunRecord>,
    #[serde(default)]
    fold_metrics: Vec<MetricRecord>,
    #[serde(default)]
    artifacts: Vec<ArtifactRecord>,
    created_at: DateTime<Utc>,
    elapsed_seconds: f64,
    #[serde(default)]
    notes: Option<String>,
}

impl ExperimentDescription {
    /// Create a builder with the identifying fields.
    #[must_use]
    pub fn builder(
        experiment_id: impl Into<String>,
        cross_experiment_key: impl Into<String>,
        hyperparameter_key: impl Into<String>,
        algorithm_name: impl Into<String>,
    ) -> ExperimentDescriptionBuilder {
        ExperimentDescriptionBuilder::new(
            experiment_id,
            cross_experiment_key,
            hyperparameter_key,
            algorithm_name,
        )
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the Environment fingerprint.
    #[must_use]
    pub fn cross_experiment_key(&self) -> &str {
        &self.cross_experiment_key
    }

    /// Get the hyperparameter fingerprint.
    #[must_use]
    pub fn hyperparameter_key(&self) -> &str {
        &self.hyperparameter_key
    }

    /// Get the algorithm name.
    #[must_use]
    pub fn algorithm_name(&self) -> &str {
        &self.algorithm_name
    }

    /// Get the hyperparameters.
    #[must_use]
    pub const fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyperparameters
    }

    /// Get the final evaluations.
    #[must_use]
    pub const fn evaluations(&self) -> &Evaluations {
        &self.evaluations
    }

    /// Get the per-fit run records.
    #[must_use]
    pub fn runs(&self) -> &[RunRecord] {
        &self.runs
    }

    /// Get the per-fold metric records.
    #[must_use]
    pub fn fold_metrics(&self) -> &[MetricRecord] {
        &self.fold_metrics
    }

    /// Get the persisted artifacts.
    #[must_use]
    pub fn artifacts(&self) -> &[ArtifactRecord] {
        &self.artifacts
    }

    /// Get the completion timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get the wall-clock duration in seconds.
    #[must_use]
    pub const fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    /// Get the free-form notes, if any.
    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
}

/// Builder for `ExperimentDescription`.
#[derive(Debug)]
pub struct ExperimentDescriptionBuilder {
    inner: ExperimentDescription,
}

impl ExperimentDescriptionBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(
        experiment_id: impl Into<String>,
        cross_experiment_key: impl Into<String>,
        hyperparameter_key: impl Into<String>,
        algorithm_name: impl Into<String>,
    ) -> Self {
        Self {
            inner: ExperimentDescription {
                experiment_id: experiment_id.into(),
                cross_experiment_key: cross_experiment_key.into(),
                hyperparameter_key: hyperparameter_key.into(),
                algorithm_name: algorithm_name.into(),
                hyperparameters: Hyperparameters::new(),
                evaluations: Evaluations::default(),
                runs: Vec::new(),
                fold_metrics: Vec::new(),
                artifacts: Vec::new(),
                created_at: Utc::now(),
                elapsed_seconds: 0.0,
                notes: None,
            },
        }
    }

    /// Set the hyperparameters.
    #[must_use]
    pub fn hyperparameters(mut self, hyperparameters: Hyperparameters) -> Self {
        self.inner.hyperparameters = hyperparameters;
        self
    }

    /// Set the final evaluations.
    #[must_use]
    pub fn evaluations(mut self, evaluations: Evaluations) -> Self {
        self.inner.evaluations = evaluations;
        self
    }

    /// Set the run records.
    #[must_use]
    pub fn runs(mut self, runs: Vec<RunRecord>) -> Self {
        self.inner.runs = runs;
        self
    }

    /// Set the per-fold metric records.
    #[must_use]
    pub fn fold_metrics(mut self, metrics: Vec<MetricRecord>) -> Self {
        self.inner.fold_metrics = metrics;
        self
    }

    /// Set the artifact records.
    #[must_use]
    pub fn artifacts(mut self, artifacts: Vec<ArtifactRecord>) -> Self {
        self.inner.artifacts = artifacts;
        self
    }

    /// Set a custom completion timestamp (useful for deserialization/testing).
    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.inner.created_at = created_at;
        self
    }

    /// Set the elapsed time.
    #[must_use]
    pub const fn elapsed_seconds(mut self, seconds: f64) -> Self {
        self.inner.elapsed_seconds = seconds;
        self
    }

    /// Attach notes.
    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.inner.notes = Some(notes.into());
        self
    }

    /// Build the `ExperimentDescription`.
    #[must_use]
    pub fn build(self) -> ExperimentDescription {
        self.inner
    }
}
