//! Experiment Store - in-memory index over recorded experiments
//!
//! Loaded from a [`ResultStore`] by cross-experiment key, this is what similarity lookups
//! and fold-metric queries read.

use rustc_hash::FxHashMap;

use super::{ExperimentDescription, MetricRecord, RunRecord};
use crate::metrics::EvaluationSet;
use crate::storage::ResultStore;
use crate::Result;

/// In-memory store of experiment descriptions.
///
/// ## Design
///
/// Descriptions are indexed by experiment id, with a secondary index from
/// cross-experiment key to the ids recorded under it (in insertion order).
///
/// ## Time-Series Queries
///
/// `get_fold_metrics` returns one metric's per-fold values ordered by step, so the
/// fold-by-fold curve of an experiment can be read back.
#[derive(Debug, Default)]
pub struct ExperimentStore {
    experiments: FxHashMap<String, ExperimentDescription>,
    by_cross_key: FxHashMap<String, Vec<String>>,
}

impl ExperimentStore {
    /// Create a new empty experiment store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every experiment recorded under `cross_experiment_key`.
    ///
    /// Tested keys that point at a missing or corrupt description are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns error if the tested-keys file itself cannot be decoded.
    pub fn load(results: &ResultStore, cross_experiment_key: &str) -> Result<Self> {
        let mut store = Self::new();
        for (hyperparameter_key, ids) in results.tested_keys(cross_experiment_key)? {
            for id in ids {
                match results.read_description(&id) {
                    Ok(description) => store.add_experiment(description),
                    Err(e) => tracing::warn!(
                        experiment_id = %id,
                        hyperparameter_key = %hyperparameter_key,
                        error = %e,
                        "Skipping unreadable experiment description"
                    ),
                }
            }
        }
        tracing::debug!(
            cross_experiment_key,
            experiments = store.experiment_count(),
            "Loaded experiment store"
        );
        Ok(store)
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// Get the number of experiments in the store.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Add an experiment to the store, replacing any with the same id.
    pub fn add_experiment(&mut self, experiment: ExperimentDescription) {
        let id = experiment.experiment_id().to_string();
        let ids = self
            .by_cross_key
            .entry(experiment.cross_experiment_key().to_string())
            .or_default();
        if !ids.contains(&id) {
            ids.push(id.clone());
        }
        self.experiments.insert(id, experiment);
    }

    /// Get an experiment by ID.
    #[must_use]
    pub fn get_experiment(&self, experiment_id: &str) -> Option<&ExperimentDescription> {
        self.experiments.get(experiment_id)
    }

    /// Experiments recorded under a cross-experiment key, in insertion order.
    #[must_use]
    pub fn experiments_for_cross_key(&self, cross_experiment_key: &str) -> Vec<&ExperimentDescription> {
        self.by_cross_key
            .get(cross_experiment_key)
            .into_iter()
            .flatten()
            .filter_map(|id| self.experiments.get(id))
            .collect()
    }

    /// Experiments with the given hyperparameter key, in any cross key.
    #[must_use]
    pub fn experiments_for_hyperparameter_key(&self, hyperparameter_key: &str) -> Vec<&ExperimentDescription> {
        self.experiments
            .values()
            .filter(|e| e.hyperparameter_key() == hyperparameter_key)
            .collect()
    }

    /// Get all runs of an experiment.
    #[must_use]
    pub fn get_runs_for_experiment(&self, experiment_id: &str) -> &[RunRecord] {
        self.experiments
            .get(experiment_id)
            .map(ExperimentDescription::runs)
            .unwrap_or_default()
    }

    /// Get one metric's per-fold values for an experiment, ordered by step.
    ///
    /// ```rust
    /// use hyperhunt::experiment::{ExperimentDescription, ExperimentStore, MetricRecord};
    /// use hyperhunt::metrics::EvaluationSet;
    ///
    /// let metrics = (0..5)
    ///     .rev()
    ///     .map(|step| MetricRecord::new("exp-1", EvaluationSet::InFold, "roc", step, 0.8))
    ///     .collect();
    /// let description = ExperimentDescription::builder("exp-1", "cross", "hyper", "Algo")
    ///     .fold_metrics(metrics)
    ///     .build();
    ///
    /// let mut store = ExperimentStore::new();
    /// store.add_experiment(description);
    /// let curve = store.get_fold_metrics("exp-1", EvaluationSet::InFold, "roc");
    /// assert_eq!(curve.first().map(MetricRecord::step), Some(0));
    /// ```
    #[must_use]
    pub fn get_fold_metrics(
        &self,
        experiment_id: &str,
        dataset: EvaluationSet,
        key: &str,
    ) -> Vec<MetricRecord> {
        let mut metrics: Vec<MetricRecord> = self
            .experiments
            .get(experiment_id)
            .map(ExperimentDescription::fold_metrics)
            .unwrap_or_default()
            .iter()
            .filter(|m| m.dataset() == dataset && m.key() == key)
            .cloned()
            .collect();

        metrics.sort_by_key(MetricRecord::step);

        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ResultStore;
    use tempfile::tempdir;

    fn description(id: &str, cross: &str) -> ExperimentDescription {
        ExperimentDescription::builder(id, cross, "hyper", "Algo").build()
    }

    #[test]
    fn test_store_default() {
        let store = ExperimentStore::new();
        assert!(store.is_empty());
        assert_eq!(store.experiment_count(), 0);
        assert!(store.experiments_for_cross_key("x").is_empty());
    }

    #[test]
    fn test_cross_key_index() {
        let mut store = ExperimentStore::new();
        store.add_experiment(description("exp-1", "a"));
        store.add_experiment(description("exp-2", "b"));
        store.add_experiment(description("exp-3", "a"));
        store.add_experiment(description("exp-1", "a"));

        let ids: Vec<_> = store
            .experiments_for_cross_key("a")
            .iter()
            .map(|e| e.experiment_id())
            .collect();
        assert_eq!(ids, vec!["exp-1", "exp-3"]);
        assert_eq!(store.experiments_for_hyperparameter_key("hyper").len(), 3);
    }

    #[test]
    fn test_fold_metrics_ordering() {
        let metrics = vec![
            MetricRecord::new("exp-1", EvaluationSet::InFold, "loss", 2, 0.2),
            MetricRecord::new("exp-1", EvaluationSet::InFold, "loss", 0, 0.0),
            MetricRecord::new("exp-1", EvaluationSet::Oof, "loss", 1, 9.0),
            MetricRecord::new("exp-1", EvaluationSet::InFold, "loss", 1, 0.1),
        ];
        let mut store = ExperimentStore::new();
        store.add_experiment(
            ExperimentDescription::builder("exp-1", "a", "h", "Algo")
                .fold_metrics(metrics)
                .build(),
        );

        let curve = store.get_fold_metrics("exp-1", EvaluationSet::InFold, "loss");
        let steps: Vec<_> = curve.iter().map(MetricRecord::step).collect();
        assert_eq!(steps, vec![0, 1, 2]);
        assert!(store.get_fold_metrics("nope", EvaluationSet::InFold, "loss").is_empty());
    }

    #[test]
    fn test_load_skips_corrupt_descriptions() {
        let dir = tempdir().unwrap();
        let results = ResultStore::new(dir.path());
        results.ensure_layout().unwrap();

        results.write_description(&description("good", "cross")).unwrap();
        std::fs::write(results.description_path("bad"), b"{not json").unwrap();
        for id in ["good", "bad", "missing"] {
            results.add_tested_key("cross", "hyper", id).unwrap();
        }

        let store = ExperimentStore::load(&results, "cross").unwrap();
        assert_eq!(store.experiment_count(), 1);
        assert!(store.get_experiment("good").is_some());
    }
}
