//! Search dimensions and guidelines

use crate::fingerprint::ConfigValue;
use crate::model::Hyperparameters;
use crate::{Error, Result};
use rand::Rng;
use std::collections::BTreeMap;

/// A searchable hyperparameter domain.
#[derive(Debug, Clone, PartialEq)]
pub enum Dimension {
    /// Continuous range `[low, high]`
    Real {
        /// Inclusive lower bound
        low: f64,
        /// Inclusive upper bound
        high: f64,
    },
    /// Integer range `[low, high]`
    Integer {
        /// Inclusive lower bound
        low: i64,
        /// Inclusive upper bound
        high: i64,
    },
    /// Unordered choices
    Categorical {
        /// Allowed values
        choices: Vec<ConfigValue>,
    },
}

impl Dimension {
    /// Continuous dimension.
    ///
    /// # Errors
    ///
    /// Returns a validation error unless `low < high` and both the bounds and the width
    /// `high - low` are finite.
    pub fn real(low: f64, high: f64) -> Result<Self> {
        if !(low.is_finite() && high.is_finite() && low < high && (high - low).is_finite()) {
            return Err(Error::Validation(format!(
                "Real dimension requires finite low < high with a finite width. Received: [{low}, {high}]"
            )));
        }
        Ok(Self::Real { low, high })
    }

    /// Integer dimension.
    ///
    /// # Errors
    ///
    /// Returns a validation error unless `low <= high`.
    pub fn integer(low: i64, high: i64) -> Result<Self> {
        if low > high {
            return Err(Error::Validation(format!(
                "Integer dimension requires low <= high. Received: [{low}, {high}]"
            )));
        }
        Ok(Self::Integer { low, high })
    }

    /// Categorical dimension.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty choice list.
    pub fn categorical<T: Into<ConfigValue>>(choices: Vec<T>) -> Result<Self> {
        if choices.is_empty() {
            return Err(Error::Validation(
                "Categorical dimension requires at least one choice".to_string(),
            ));
        }
        Ok(Self::Categorical {
            choices: choices.into_iter().map(Into::into).collect(),
        })
    }

    /// Draw a value uniformly.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> ConfigValue {
        match self {
            Self::Real { low, high } => ConfigValue::Float(rng.random_range(*low..=*high)),
            Self::Integer { low, high } => ConfigValue::Int(rng.random_range(*low..=*high)),
            Self::Categorical { choices } => choices[rng.random_range(0..choices.len())].clone(),
        }
    }

    /// Whether `value` lies in this dimension (bounds inclusive).
    #[must_use]
    pub fn contains(&self, value: &ConfigValue) -> bool {
        match self {
            Self::Real { low, high } => value
                .as_f64()
                .is_some_and(|v| *low <= v && v <= *high),
            Self::Integer { low, high } => value
                .as_i64()
                .is_some_and(|v| *low <= v && v <= *high),
            Self::Categorical { choices } => choices.contains(value),
        }
    }

    /// Width of this dimension in the surrogate's unit cube.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Real { .. } | Self::Integer { .. } => 1,
            Self::Categorical { choices } => choices.len(),
        }
    }

    /// Map `value` into `[0, 1]` coordinates (one-hot for categoricals).
    #[allow(clippy::cast_precision_loss)]
    fn encode_into(&self, value: &ConfigValue, out: &mut Vec<f64>) {
        match self {
            Self::Real { low, high } => {
                let v = value.as_f64().unwrap_or(*low);
                out.push(((v - low) / (high - low)).clamp(0.0, 1.0));
            }
            Self::Integer { low, high } => {
                let v = value.as_i64().unwrap_or(*low);
                let span = (i128::from(*high) - i128::from(*low)) as f64;
                out.push(if span == 0.0 {
                    0.5
                } else {
                    ((i128::from(v) - i128::from(*low)) as f64 / span).clamp(0.0, 1.0)
                });
            }
            Self::Categorical { choices } => {
                out.extend(choices.iter().map(|c| if c == value { 1.0 } else { 0.0 }));
            }
        }
    }
}

/// Per-hyperparameter guideline: a fixed value or a search dimension.
#[derive(Debug, Clone, PartialEq)]
pub enum Guideline {
    /// Always this value
    Fixed(ConfigValue),
    /// Searched over
    Dimension(Dimension),
}

impl Guideline {
    /// Fixed guideline.
    pub fn fixed(value: impl Into<ConfigValue>) -> Self {
        Self::Fixed(value.into())
    }

    /// Whether `value` satisfies the guideline.
    #[must_use]
    pub fn matches(&self, value: &ConfigValue) -> bool {
        match self {
            Self::Fixed(fixed) => fixed == value,
            Self::Dimension(dimension) => dimension.contains(value),
        }
    }
}

impl From<Dimension> for Guideline {
    fn from(dimension: Dimension) -> Self {
        Self::Dimension(dimension)
    }
}

/// Guidelines for every hyperparameter of one algorithm.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSpace {
    guidelines: BTreeMap<String, Guideline>,
}

impl SearchSpace {
    /// Build from `(name, guideline)` pairs.
    ///
    /// # Errors
    ///
    /// Returns an optimization error if no guideline is a dimension.
    pub fn new<K, G, I>(guidelines: I) -> Result<Self>
    where
        K: Into<String>,
        G: Into<Guideline>,
        I: IntoIterator<Item = (K, G)>,
    {
        let guidelines: BTreeMap<String, Guideline> = guidelines
            .into_iter()
            .map(|(k, g)| (k.into(), g.into()))
            .collect();
        if !guidelines.values().any(|g| matches!(g, Guideline::Dimension(_))) {
            return Err(Error::Optimization(
                "Guidelines must contain at least one search dimension".to_string(),
            ));
        }
        Ok(Self { guidelines })
    }

    /// All guidelines, key-sorted.
    #[must_use]
    pub const fn guidelines(&self) -> &BTreeMap<String, Guideline> {
        &self.guidelines
    }

    /// Names of the searched hyperparameters, sorted.
    pub fn dimension_names(&self) -> impl Iterator<Item = &str> {
        self.dimensions().map(|(name, _)| name)
    }

    fn dimensions(&self) -> impl Iterator<Item = (&str, &Dimension)> {
        self.guidelines.iter().filter_map(|(name, g)| match g {
            Guideline::Dimension(d) => Some((name.as_str(), d)),
            Guideline::Fixed(_) => None,
        })
    }

    /// Draw a full hyperparameter set (fixed values included).
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Hyperparameters {
        self.guidelines
            .iter()
            .map(|(name, g)| {
                let value = match g {
                    Guideline::Fixed(v) => v.clone(),
                    Guideline::Dimension(d) => d.sample(rng),
                };
                (name.clone(), value)
            })
            .collect()
    }

    /// Whether `hyperparameters` names exactly the guideline keys and fits every guideline.
    #[must_use]
    pub fn contains(&self, hyperparameters: &Hyperparameters) -> bool {
        hyperparameters.len() == self.guidelines.len()
            && self.guidelines.iter().all(|(name, guideline)| {
                hyperparameters
                    .get(name)
                    .is_some_and(|value| guideline.matches(value))
            })
    }

    /// Searched values only, for reporting.
    #[must_use]
    pub fn point(&self, hyperparameters: &Hyperparameters) -> Hyperparameters {
        self.dimension_names()
            .filter_map(|name| hyperparameters.get(name).map(|v| (name.to_string(), v.clone())))
            .collect()
    }

    /// Unit-cube coordinates of the searched values.
    #[must_use]
    pub fn encode(&self, hyperparameters: &Hyperparameters) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.encoded_len());
        for (name, dimension) in self.dimensions() {
            dimension.encode_into(
                hyperparameters.get(name).unwrap_or(&ConfigValue::Null),
                &mut out,
            );
        }
        out
    }

    fn encoded_len(&self) -> usize {
        self.dimensions().map(|(_, d)| d.encoded_len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn space() -> SearchSpace {
        SearchSpace::new([
            ("learning_rate", Guideline::from(Dimension::real(0.01, 0.5).unwrap())),
            ("max_iter", Dimension::integer(10, 200).unwrap().into()),
            ("l2", Guideline::fixed(0.0)),
        ])
        .unwrap()
    }

    fn hyperparameters(lr: ConfigValue, iters: ConfigValue, l2: ConfigValue) -> Hyperparameters {
        Hyperparameters::from([
            ("learning_rate".to_string(), lr),
            ("max_iter".to_string(), iters),
            ("l2".to_string(), l2),
        ])
    }

    #[test]
    fn test_invalid_dimensions() {
        assert!(Dimension::real(1.0, 1.0).is_err());
        assert!(Dimension::real(0.0, f64::INFINITY).is_err());
        assert!(Dimension::integer(3, 2).is_err());
        assert!(Dimension::categorical::<&str>(vec![]).is_err());
    }

    #[test]
    fn test_extreme_bounds() {
        assert!(Dimension::real(-f64::MAX, f64::MAX).is_err());

        let space = SearchSpace::new([(
            "seed",
            Guideline::from(Dimension::integer(i64::MIN, i64::MAX).unwrap()),
        )])
        .unwrap();
        let at = |v: i64| space.encode(&Hyperparameters::from([("seed".to_string(), v.into())]));
        assert_eq!(at(i64::MIN), vec![0.0]);
        assert_eq!(at(i64::MAX), vec![1.0]);
        assert!((at(0)[0] - 0.5).abs() < 1e-9);

        let sample = space.sample(&mut StdRng::seed_from_u64(7));
        assert!(space.contains(&sample));
    }

    #[test]
    fn test_fixed_only_space_rejected() {
        let err = SearchSpace::new([("l2", Guideline::fixed(0.0))]).unwrap_err();
        assert!(matches!(err, Error::Optimization(_)));
    }

    #[test]
    fn test_samples_are_contained() {
        let space = space();
        let mut rng = StdRng::seed_from_u64(32);
        for _ in 0..100 {
            let sample = space.sample(&mut rng);
            assert!(space.contains(&sample), "{sample:?}");
            assert_eq!(sample["l2"], ConfigValue::Float(0.0));
        }
    }

    #[test]
    fn test_contains_rules() {
        let space = space();
        assert!(space.contains(&hyperparameters(0.01.into(), 200.into(), 0.0.into())));
        assert!(space.contains(&hyperparameters(0.5.into(), 10.0.into(), 0.0.into())));
        // Out of range
        assert!(!space.contains(&hyperparameters(0.6.into(), 100.into(), 0.0.into())));
        // Non-integral value for an integer dimension
        assert!(!space.contains(&hyperparameters(0.1.into(), 10.5.into(), 0.0.into())));
        // Fixed guideline compares exactly: int 0 is not float 0.0
        assert!(!space.contains(&hyperparameters(0.1.into(), 100.into(), 0.into())));

        let mut extra = hyperparameters(0.1.into(), 100.into(), 0.0.into());
        extra.insert("tol".to_string(), 1e-4.into());
        assert!(!space.contains(&extra));
        extra.remove("tol");
        extra.remove("l2");
        assert!(!space.contains(&extra));
    }

    #[test]
    fn test_categorical_encoding_is_one_hot() {
        let space = SearchSpace::new([(
            "solver",
            Dimension::categorical(vec!["lbfgs", "sgd", "adam"]).unwrap(),
        )])
        .unwrap();
        let point = Hyperparameters::from([("solver".to_string(), "sgd".into())]);
        assert_eq!(space.encode(&point), vec![0.0, 1.0, 0.0]);
        assert!(!space.contains(&Hyperparameters::from([("solver".to_string(), "newton".into())])));
    }

    #[test]
    fn test_point_and_encoding_skip_fixed() {
        let space = space();
        let hp = hyperparameters(0.255.into(), 10.into(), 0.0.into());
        assert_eq!(space.point(&hp).len(), 2);
        let encoded = space.encode(&hp);
        assert_eq!(encoded.len(), 2);
        assert!((encoded[0] - 0.5).abs() < 1e-12);
        assert!(encoded[1].abs() < 1e-12);
    }
}
