//! Model abstraction
//!
//! A [`ModelInitializer`] is the "algorithm": it has a stable name that takes part in the
//! hyperparameter key, and it builds fresh [`Model`]s from hyperparameters and a seed.

mod logistic;

pub use logistic::LogisticRegression;

use crate::fingerprint::ConfigValue;
use crate::Result;
use std::collections::BTreeMap;
use std::fmt;

/// Hyperparameter assignment, key-sorted.
pub type Hyperparameters = BTreeMap<String, ConfigValue>;

/// A trainable model over a dense `f64` feature matrix.
pub trait Model {
    /// Fit on row-major `features` and `target`.
    ///
    /// # Errors
    ///
    /// Returns error if the data is unusable (empty, ragged).
    fn fit(&mut self, features: &[Vec<f64>], target: &[f64]) -> Result<()>;

    /// Predict the model's natural output (class labels for classifiers).
    ///
    /// # Errors
    ///
    /// Returns error if called before `fit` or on mismatched widths.
    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>>;

    /// Predict the positive-class probability. Defaults to `predict`.
    ///
    /// # Errors
    ///
    /// Same as `predict`.
    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        self.predict(features)
    }
}

/// Builds models of one algorithm.
pub trait ModelInitializer {
    /// Algorithm name (part of the hyperparameter key).
    fn name(&self) -> &str;

    /// Build an untrained model.
    ///
    /// # Errors
    ///
    /// Returns a model error for unknown or ill-typed hyperparameters.
    fn build(&self, hyperparameters: &Hyperparameters, seed: u64) -> Result<Box<dyn Model>>;
}

type BuildFn = dyn Fn(&Hyperparameters, u64) -> Result<Box<dyn Model>>;

/// Initializer backed by a closure.
pub struct FnInitializer {
    name: String,
    build: Box<BuildFn>,
}

impl FnInitializer {
    /// Wrap `build` under the algorithm name `name`.
    pub fn new<F>(name: impl Into<String>, build: F) -> Self
    where
        F: Fn(&Hyperparameters, u64) -> Result<Box<dyn Model>> + 'static,
    {
        Self {
            name: name.into(),
            build: Box::new(build),
        }
    }
}

impl ModelInitializer for FnInitializer {
    fn name(&self) -> &str {
        &self.name
    }

    fn build(&self, hyperparameters: &Hyperparameters, seed: u64) -> Result<Box<dyn Model>> {
        (self.build)(hyperparameters, seed)
    }
}

impl fmt::Debug for FnInitializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnInitializer")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant(f64);

    impl Model for Constant {
        fn fit(&mut self, _features: &[Vec<f64>], target: &[f64]) -> Result<()> {
            #[allow(clippy::cast_precision_loss)]
            let mean = target.iter().sum::<f64>() / target.len() as f64;
            self.0 = mean;
            Ok(())
        }

        fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
            Ok(vec![self.0; features.len()])
        }
    }

    #[test]
    fn test_fn_initializer_builds_models() {
        let init = FnInitializer::new("Constant", |_params, _seed| {
            Ok(Box::new(Constant(0.0)) as Box<dyn Model>)
        });
        assert_eq!(init.name(), "Constant");

        let mut model = init.build(&Hyperparameters::new(), 0).unwrap();
        model.fit(&[vec![0.0], vec![1.0]], &[1.0, 3.0]).unwrap();
        assert_eq!(model.predict_proba(&[vec![5.0]]).unwrap(), vec![2.0]);
    }
}
