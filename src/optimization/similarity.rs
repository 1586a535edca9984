//! Lookup of recorded experiments that fit the current guidelines

use super::SearchSpace;
use crate::experiment::ExperimentStore;
use crate::metrics::EvaluationSet;
use crate::model::Hyperparameters;
use std::cmp::Ordering;
use std::fmt;

/// The evaluation an optimizer maximizes (or minimizes): a dataset plus a metric id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetMetric {
    /// Evaluation set the value is read from
    pub dataset: EvaluationSet,
    /// Metric id in the Environment's metrics map
    pub metric: String,
}

impl TargetMetric {
    /// Target `(dataset, metric)`.
    pub fn new(dataset: EvaluationSet, metric: impl Into<String>) -> Self {
        Self {
            dataset,
            metric: metric.into(),
        }
    }

    /// OOF target for `metric`.
    pub fn oof(metric: impl Into<String>) -> Self {
        Self::new(EvaluationSet::Oof, metric)
    }
}

impl fmt::Display for TargetMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.dataset.name(), self.metric)
    }
}

/// A recorded experiment compatible with the current search.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarExperiment {
    /// Recorded experiment id
    pub experiment_id: String,
    /// Full hyperparameter set of the experiment
    pub hyperparameters: Hyperparameters,
    /// Its target evaluation
    pub value: f64,
}

/// Experiments in `store` that ran under `cross_experiment_key` with `algorithm_name` and whose
/// hyperparameters satisfy `space`, best first.
///
/// Experiments without a value for `target` are skipped.
#[must_use]
pub fn find_similar_experiments(
    store: &ExperimentStore,
    cross_experiment_key: &str,
    algorithm_name: &str,
    space: &SearchSpace,
    target: &TargetMetric,
    greater_is_better: bool,
) -> Vec<SimilarExperiment> {
    let mut similar: Vec<SimilarExperiment> = store
        .experiments_for_cross_key(cross_experiment_key)
        .into_iter()
        .filter(|e| e.algorithm_name() == algorithm_name && space.contains(e.hyperparameters()))
        .filter_map(|e| {
            let Some(value) = e.evaluations().value(target.dataset, &target.metric) else {
                tracing::debug!(
                    experiment_id = e.experiment_id(),
                    %target,
                    "Similar experiment has no target evaluation"
                );
                return None;
            };
            Some(SimilarExperiment {
                experiment_id: e.experiment_id().to_string(),
                hyperparameters: e.hyperparameters().clone(),
                value,
            })
        })
        .collect();

    similar.sort_by(|a, b| {
        a.cmp_best_first(b, greater_is_better)
            .then_with(|| a.experiment_id.cmp(&b.experiment_id))
    });
    tracing::info!(
        cross_experiment_key,
        algorithm_name,
        found = similar.len(),
        "Similar experiment lookup"
    );
    similar
}

impl SimilarExperiment {
    /// Compare by value in the direction of the metric, best first.
    #[must_use]
    pub fn cmp_best_first(&self, other: &Self, greater_is_better: bool) -> Ordering {
        let order = self.value.total_cmp(&other.value);
        if greater_is_better {
            order.reverse()
        } else {
            order
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{Evaluations, ExperimentDescription};
    use crate::optimization::{Dimension, Guideline};
    use std::collections::BTreeMap;

    fn description(id: &str, cross: &str, algo: &str, lr: f64, roc: f64) -> ExperimentDescription {
        let hyperparameters = Hyperparameters::from([
            ("learning_rate".to_string(), lr.into()),
            ("l2".to_string(), 0.0.into()),
        ]);
        ExperimentDescription::builder(id, cross, format!("h-{id}"), algo)
            .hyperparameters(hyperparameters)
            .evaluations(Evaluations {
                oof: Some(BTreeMap::from([("roc".to_string(), roc)])),
                ..Evaluations::default()
            })
            .build()
    }

    fn space() -> SearchSpace {
        SearchSpace::new([
            ("learning_rate", Guideline::from(Dimension::real(0.01, 0.2).unwrap())),
            ("l2", Guideline::fixed(0.0)),
        ])
        .unwrap()
    }

    fn store() -> ExperimentStore {
        let mut store = ExperimentStore::new();
        store.add_experiment(description("a", "cross", "LogisticRegression", 0.1, 0.7));
        store.add_experiment(description("b", "cross", "LogisticRegression", 0.15, 0.9));
        // Outside the dimension
        store.add_experiment(description("c", "cross", "LogisticRegression", 0.5, 0.99));
        // Different algorithm
        store.add_experiment(description("d", "cross", "Other", 0.1, 0.95));
        // Different Environment
        store.add_experiment(description("e", "cross-2", "LogisticRegression", 0.1, 0.95));
        store
    }

    #[test]
    fn test_only_matching_experiments_best_first() {
        let found = find_similar_experiments(
            &store(),
            "cross",
            "LogisticRegression",
            &space(),
            &TargetMetric::oof("roc"),
            true,
        );
        let ids: Vec<_> = found.iter().map(|s| s.experiment_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!((found[0].value - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_lower_is_better_ordering() {
        let found = find_similar_experiments(
            &store(),
            "cross",
            "LogisticRegression",
            &space(),
            &TargetMetric::oof("roc"),
            false,
        );
        assert_eq!(found[0].experiment_id, "a");
        assert_eq!(found[0].cmp_best_first(&found[1], false), Ordering::Less);
    }

    #[test]
    fn test_missing_target_skipped() {
        let found = find_similar_experiments(
            &store(),
            "cross",
            "LogisticRegression",
            &space(),
            &TargetMetric::new(EvaluationSet::Holdout, "roc"),
            true,
        );
        assert!(found.is_empty());
    }
}
