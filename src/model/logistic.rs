//! Binary logistic regression trained with full-batch gradient descent

use super::{Hyperparameters, Model, ModelInitializer};
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DEFAULT_LEARNING_RATE: f64 = 0.1;
const DEFAULT_MAX_ITER: i64 = 100;
const DEFAULT_L2: f64 = 0.0;

/// Logistic regression initializer.
///
/// Hyperparameters:
/// - `learning_rate` (float, default 0.1)
/// - `max_iter` (integer, default 100)
/// - `l2` (float, default 0.0)
///
/// Features are standardized internally with statistics from the training rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogisticRegression;

impl ModelInitializer for LogisticRegression {
    fn name(&self) -> &str {
        "LogisticRegression"
    }

    fn build(&self, hyperparameters: &Hyperparameters, seed: u64) -> Result<Box<dyn Model>> {
        let mut config = Config {
            learning_rate: DEFAULT_LEARNING_RATE,
            max_iter: DEFAULT_MAX_ITER,
            l2: DEFAULT_L2,
        };
        for (name, value) in hyperparameters {
            let invalid =
                || Error::Model(format!("LogisticRegression: invalid value {value:?} for '{name}'"));
            match name.as_str() {
                "learning_rate" => config.learning_rate = value.as_f64().ok_or_else(invalid)?,
                "max_iter" => config.max_iter = value.as_i64().ok_or_else(invalid)?,
                "l2" => config.l2 = value.as_f64().ok_or_else(invalid)?,
                other => {
                    return Err(Error::Model(format!(
                        "LogisticRegression: unknown hyperparameter '{other}'"
                    )))
                }
            }
        }
        if config.learning_rate <= 0.0 || config.max_iter < 1 || config.l2 < 0.0 {
            return Err(Error::Model(format!(
                "LogisticRegression: out-of-range hyperparameters {config:?}"
            )));
        }
        Ok(Box::new(Fitted {
            config,
            seed,
            state: None,
        }))
    }
}

#[derive(Debug, Clone, Copy)]
struct Config {
    learning_rate: f64,
    max_iter: i64,
    l2: f64,
}

#[derive(Debug)]
struct State {
    means: Vec<f64>,
    scales: Vec<f64>,
    weights: Vec<f64>,
    bias: f64,
}

#[derive(Debug)]
struct Fitted {
    config: Config,
    seed: u64,
    state: Option<State>,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl State {
    fn logit(&self, row: &[f64]) -> f64 {
        row.iter()
            .zip(&self.means)
            .zip(&self.scales)
            .zip(&self.weights)
            .map(|(((x, m), s), w)| (x - m) / s * w)
            .sum::<f64>()
            + self.bias
    }
}

impl Fitted {
    fn state(&self, features: &[Vec<f64>]) -> Result<&State> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| Error::Model("LogisticRegression: predict called before fit".into()))?;
        if let Some(row) = features.iter().find(|r| r.len() != state.weights.len()) {
            return Err(Error::Model(format!(
                "LogisticRegression: expected {} features, got {}",
                state.weights.len(),
                row.len()
            )));
        }
        Ok(state)
    }
}

impl Model for Fitted {
    #[allow(clippy::cast_precision_loss)]
    fn fit(&mut self, features: &[Vec<f64>], target: &[f64]) -> Result<()> {
        if features.is_empty() || features.len() != target.len() {
            return Err(Error::Model(format!(
                "LogisticRegression: {} rows but {} targets",
                features.len(),
                target.len()
            )));
        }
        let width = features[0].len();
        if features.iter().any(|r| r.len() != width) {
            return Err(Error::Model("LogisticRegression: ragged feature matrix".into()));
        }

        let n = features.len() as f64;
        let means: Vec<f64> = (0..width)
            .map(|j| features.iter().map(|r| r[j]).sum::<f64>() / n)
            .collect();
        let scales: Vec<f64> = (0..width)
            .map(|j| {
                let var = features.iter().map(|r| (r[j] - means[j]).powi(2)).sum::<f64>() / n;
                if var > 0.0 {
                    var.sqrt()
                } else {
                    1.0
                }
            })
            .collect();

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut state = State {
            means,
            scales,
            weights: (0..width).map(|_| (rng.random::<f64>() - 0.5) * 0.01).collect(),
            bias: 0.0,
        };

        for _ in 0..self.config.max_iter {
            let mut grad_w = vec![0.0; width];
            let mut grad_b = 0.0;
            for (row, &y) in features.iter().zip(target) {
                let err = sigmoid(state.logit(row)) - y;
                for (j, g) in grad_w.iter_mut().enumerate() {
                    *g += err * (row[j] - state.means[j]) / state.scales[j];
                }
                grad_b += err;
            }
            for (w, g) in state.weights.iter_mut().zip(&grad_w) {
                *w -= self.config.learning_rate * (g / n + self.config.l2 * *w);
            }
            state.bias -= self.config.learning_rate * grad_b / n;
        }

        self.state = Some(state);
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        Ok(self
            .predict_proba(features)?
            .into_iter()
            .map(crate::metrics::to_label)
            .collect())
    }

    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        let state = self.state(features)?;
        Ok(features.iter().map(|row| sigmoid(state.logit(row))).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::ConfigValue;

    fn separable() -> (Vec<Vec<f64>>, Vec<f64>) {
        let features = (0..40).map(|i| vec![f64::from(i), f64::from(i % 3)]).collect();
        let target = (0..40).map(|i| if i >= 20 { 1.0 } else { 0.0 }).collect();
        (features, target)
    }

    #[test]
    fn test_fits_separable_data() {
        let (x, y) = separable();
        let params = Hyperparameters::from([
            ("learning_rate".to_string(), ConfigValue::Float(0.5)),
            ("max_iter".to_string(), ConfigValue::Int(300)),
        ]);
        let mut model = LogisticRegression.build(&params, 7).unwrap();
        model.fit(&x, &y).unwrap();
        let labels = model.predict(&x).unwrap();
        let correct = labels.iter().zip(&y).filter(|(p, t)| p == t).count();
        assert!(correct >= 36, "only {correct} of 40 correct");
    }

    #[test]
    fn test_unknown_hyperparameter_rejected() {
        let params = Hyperparameters::from([("depth".to_string(), ConfigValue::Int(3))]);
        assert!(matches!(
            LogisticRegression.build(&params, 0),
            Err(Error::Model(_))
        ));
    }

    #[test]
    fn test_predict_before_fit_errors() {
        let model = LogisticRegression.build(&Hyperparameters::new(), 0).unwrap();
        assert!(model.predict(&[vec![1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_same_seed_same_predictions() {
        let (x, y) = separable();
        let fit = |seed| {
            let mut m = LogisticRegression.build(&Hyperparameters::new(), seed).unwrap();
            m.fit(&x, &y).unwrap();
            m.predict_proba(&x).unwrap()
        };
        assert_eq!(fit(3), fit(3));
    }
}
