//! Experiment Tracking
//!
//! This module runs cross-validation experiments and defines the records they leave
//! behind in the result store.
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentDescription (1) ──< RunRecord (N)      one per (repetition, fold, run)
//!                           ├──< MetricRecord (N)   per-fold in-fold metrics [time-series]
//!                           └──< ArtifactRecord (N) prediction files [CAS]
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hyperhunt::environment::Environment;
//! use hyperhunt::experiment::CvExperiment;
//! use hyperhunt::model::{Hyperparameters, LogisticRegression};
//! # fn demo(env: &Environment) -> hyperhunt::Result<()> {
//! let mut hyperparameters = Hyperparameters::new();
//! hyperparameters.insert("learning_rate".to_string(), 0.05.into());
//!
//! let description = CvExperiment::new(env, &LogisticRegression, hyperparameters).execute()?;
//! println!("{:?}", description.evaluations().oof);
//! # Ok(())
//! # }
//! ```

mod artifact_record;
mod cv_experiment;
mod description;
mod metric_record;
mod run_record;
mod store;

pub use artifact_record::{cas_hash, ArtifactRecord};
pub use cv_experiment::CvExperiment;
pub use description::{Evaluations, ExperimentDescription, ExperimentDescriptionBuilder};
pub use metric_record::{MetricRecord, MetricRecordBuilder};
pub use run_record::{RunRecord, RunRecordBuilder, RunStatus};
pub use store::ExperimentStore;

use crate::fingerprint::{fingerprint, ConfigValue};
use crate::model::Hyperparameters;

/// Fingerprint of an algorithm name plus its hyperparameters.
#[must_use]
pub fn hyperparameter_key(algorithm_name: &str, hyperparameters: &Hyperparameters) -> String {
    fingerprint(&ConfigValue::map([
        ("algorithm_name", ConfigValue::from(algorithm_name)),
        ("hyperparameters", ConfigValue::Map(hyperparameters.clone())),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hyperparameter_key_depends_on_algorithm_and_values() {
        let mut a = Hyperparameters::new();
        a.insert("max_iter".to_string(), 100.into());
        let mut b = a.clone();
        b.insert("max_iter".to_string(), 100.0.into());

        assert_eq!(hyperparameter_key("Algo", &a), hyperparameter_key("Algo", &a.clone()));
        assert_ne!(hyperparameter_key("Algo", &a), hyperparameter_key("Other", &a));
        assert_ne!(hyperparameter_key("Algo", &a), hyperparameter_key("Algo", &b));
    }

    #[test]
    fn test_hyperparameter_key_separates_strings_from_infinity() {
        let mut label = Hyperparameters::new();
        label.insert("solver".to_string(), "inf".into());
        let mut number = Hyperparameters::new();
        number.insert("solver".to_string(), f64::INFINITY.into());

        assert_ne!(hyperparameter_key("Algo", &label), hyperparameter_key("Algo", &number));
    }
}
