//! Cross-validation splitters
//!
//! `CvType` is resolved once from its name when the Environment is built; splitting
//! afterwards is a plain match, no string dispatch.

use crate::fingerprint::ConfigValue;
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Repetitions used by the repeated splitters when `n_repeats` is not given.
pub const DEFAULT_N_REPEATS: usize = 10;

/// Cross-validation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CvType {
    /// Contiguous folds (optionally shuffled)
    KFold,
    /// Folds preserving the class distribution of the target
    StratifiedKFold,
    /// `KFold` repeated with a fresh shuffle each time
    RepeatedKFold,
    /// `StratifiedKFold` repeated with a fresh shuffle each time
    RepeatedStratifiedKFold,
}

impl CvType {
    /// Canonical name, as used in fingerprints and config files.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::KFold => "KFold",
            Self::StratifiedKFold => "StratifiedKFold",
            Self::RepeatedKFold => "RepeatedKFold",
            Self::RepeatedStratifiedKFold => "RepeatedStratifiedKFold",
        }
    }

    /// Whether folds preserve class proportions.
    #[must_use]
    pub const fn is_stratified(self) -> bool {
        matches!(self, Self::StratifiedKFold | Self::RepeatedStratifiedKFold)
    }

    /// Whether the splitter repeats by default.
    #[must_use]
    pub const fn is_repeated(self) -> bool {
        matches!(self, Self::RepeatedKFold | Self::RepeatedStratifiedKFold)
    }
}

impl fmt::Display for CvType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CvType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "KFold" => Ok(Self::KFold),
            "StratifiedKFold" => Ok(Self::StratifiedKFold),
            "RepeatedKFold" => Ok(Self::RepeatedKFold),
            "RepeatedStratifiedKFold" => Ok(Self::RepeatedStratifiedKFold),
            other => Err(Error::Validation(format!(
                "cross_validation_type must be one of [KFold, StratifiedKFold, RepeatedKFold, \
                 RepeatedStratifiedKFold]. Received: {other}"
            ))),
        }
    }
}

/// Cross-validation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CvParams {
    n_splits: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    n_repeats: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    shuffle: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    random_state: Option<u64>,
}

impl Default for CvParams {
    fn default() -> Self {
        Self::new(5)
    }
}

impl CvParams {
    /// Parameters with `n_splits` folds and nothing else set.
    #[must_use]
    pub const fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            n_repeats: None,
            shuffle: None,
            random_state: None,
        }
    }

    /// Set the number of repetitions.
    #[must_use]
    pub const fn n_repeats(mut self, n_repeats: usize) -> Self {
        self.n_repeats = Some(n_repeats);
        self
    }

    /// Set whether rows are shuffled before splitting.
    #[must_use]
    pub const fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = Some(shuffle);
        self
    }

    /// Set the shuffling seed.
    #[must_use]
    pub const fn random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self
    }

    /// Parse from a configuration map such as `{n_splits: 5, n_repeats: 2, random_state: 32}`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for non-map input, unknown keys, or mistyped values.
    pub fn from_config(value: &ConfigValue) -> Result<Self> {
        let map = value.as_map().ok_or_else(|| {
            Error::Validation(format!(
                "cross_validation_params must be a mapping. Received: {}",
                value.to_canonical_string()
            ))
        })?;

        let mut params = Self::new(0);
        let mut n_splits = None;
        for (key, v) in map {
            match key.as_str() {
                "n_splits" => n_splits = Some(positive_usize(key, v)?),
                "n_repeats" => params.n_repeats = Some(positive_usize(key, v)?),
                "shuffle" => {
                    params.shuffle = Some(v.as_bool().ok_or_else(|| type_error(key, "bool", v))?);
                }
                "random_state" => match v {
                    ConfigValue::Null => params.random_state = None,
                    _ => {
                        let seed = v
                            .as_i64()
                            .and_then(|s| u64::try_from(s).ok())
                            .ok_or_else(|| type_error(key, "non-negative integer", v))?;
                        params.random_state = Some(seed);
                    }
                },
                other => {
                    return Err(Error::Validation(format!(
                        "Unknown cross_validation_params key: {other}"
                    )))
                }
            }
        }
        params.n_splits = n_splits.unwrap_or(5);
        Ok(params)
    }

    /// Configuration map containing only the parameters that were set.
    #[must_use]
    pub fn to_config(&self) -> ConfigValue {
        let mut map = BTreeMap::new();
        map.insert("n_splits".to_string(), ConfigValue::from(self.n_splits));
        if let Some(n) = self.n_repeats {
            map.insert("n_repeats".to_string(), ConfigValue::from(n));
        }
        if let Some(s) = self.shuffle {
            map.insert("shuffle".to_string(), ConfigValue::Bool(s));
        }
        if let Some(r) = self.random_state {
            map.insert("random_state".to_string(), ConfigValue::from(r));
        }
        ConfigValue::Map(map)
    }

    /// Configuration map of the resolved parameters for `cv_type`.
    ///
    /// Parameters that produce the same folds produce the same map, whether defaults
    /// were spelled out or left unset.
    #[must_use]
    pub fn effective_config(&self, cv_type: CvType) -> ConfigValue {
        ConfigValue::map([
            ("n_splits", ConfigValue::from(self.n_splits)),
            ("n_repeats", ConfigValue::from(self.repetitions(cv_type))),
            ("shuffle", ConfigValue::Bool(self.shuffles(cv_type))),
            ("random_state", ConfigValue::from(self.random_state)),
        ])
    }

    /// Number of folds.
    #[must_use]
    pub const fn n_splits_value(&self) -> usize {
        self.n_splits
    }

    /// Shuffling seed, if fixed.
    #[must_use]
    pub const fn random_state_value(&self) -> Option<u64> {
        self.random_state
    }

    /// Number of repetitions for `cv_type`.
    #[must_use]
    pub fn repetitions(&self, cv_type: CvType) -> usize {
        self.n_repeats
            .unwrap_or(if cv_type.is_repeated() { DEFAULT_N_REPEATS } else { 1 })
    }

    /// Whether rows are shuffled. Repetition without shuffling would repeat identical folds,
    /// so any multi-repetition scheme shuffles.
    #[must_use]
    pub fn shuffles(&self, cv_type: CvType) -> bool {
        cv_type.is_repeated() || self.repetitions(cv_type) > 1 || self.shuffle.unwrap_or(false)
    }

    /// Check the parameters against `cv_type`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `n_splits < 2` or `n_repeats == 0`.
    pub fn validate(&self, cv_type: CvType) -> Result<()> {
        if self.n_splits < 2 {
            return Err(Error::Validation(format!(
                "n_splits must be at least 2. Received: {}",
                self.n_splits
            )));
        }
        if self.repetitions(cv_type) == 0 {
            return Err(Error::Validation("n_repeats must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn positive_usize(key: &str, v: &ConfigValue) -> Result<usize> {
    v.as_i64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| type_error(key, "non-negative integer", v))
}

fn type_error(key: &str, expected: &str, v: &ConfigValue) -> Error {
    Error::Validation(format!(
        "{key} must be a {expected}. Received: {}",
        v.to_canonical_string()
    ))
}

/// Train/validation row indices of one fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    /// Training rows
    pub train: Vec<usize>,
    /// Validation rows
    pub validation: Vec<usize>,
}

/// Generate folds for every repetition.
///
/// Returns `repetitions × n_splits` folds; within one repetition every row is
/// a validation row exactly once.
///
/// # Errors
///
/// Returns a validation error if there are fewer rows than folds.
pub fn split(
    cv_type: CvType,
    params: &CvParams,
    target: &[f64],
) -> Result<Vec<Vec<Fold>>> {
    params.validate(cv_type)?;
    let n_rows = target.len();
    let k = params.n_splits;
    if n_rows < k {
        return Err(Error::Validation(format!(
            "Cannot have n_splits={k} greater than the number of samples: {n_rows}"
        )));
    }

    let shuffle = params.shuffles(cv_type);
    let base_seed = params.random_state.unwrap_or_else(rand::random);

    (0..params.repetitions(cv_type))
        .map(|rep| {
            let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(rep as u64));
            let assignment = if cv_type.is_stratified() {
                stratified_assignment(target, k, shuffle, &mut rng)
            } else {
                contiguous_assignment(n_rows, k, shuffle, &mut rng)
            };
            Ok(folds_from_assignment(&assignment, k))
        })
        .collect()
}

fn contiguous_assignment(n_rows: usize, k: usize, shuffle: bool, rng: &mut StdRng) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n_rows).collect();
    if shuffle {
        order.shuffle(rng);
    }

    // First n % k folds get one extra row
    let mut assignment = vec![0; n_rows];
    let (base, extra) = (n_rows / k, n_rows % k);
    let mut cursor = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        for &row in &order[cursor..cursor + size] {
            assignment[row] = fold;
        }
        cursor += size;
    }
    assignment
}

fn stratified_assignment(target: &[f64], k: usize, shuffle: bool, rng: &mut StdRng) -> Vec<usize> {
    let mut classes: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
    for (row, value) in target.iter().enumerate() {
        classes.entry(value.to_bits()).or_default().push(row);
    }

    let mut assignment = vec![0; target.len()];
    let mut counter = 0usize;
    for (label, rows) in &mut classes {
        if rows.len() < k {
            tracing::warn!(
                class = f64::from_bits(*label),
                members = rows.len(),
                n_splits = k,
                "Least populated class has fewer members than n_splits"
            );
        }
        if shuffle {
            rows.shuffle(rng);
        }
        for &row in rows.iter() {
            assignment[row] = counter % k;
            counter += 1;
        }
    }
    assignment
}

fn folds_from_assignment(assignment: &[usize], k: usize) -> Vec<Fold> {
    (0..k)
        .map(|fold| {
            let (validation, train): (Vec<usize>, Vec<usize>) =
                (0..assignment.len()).partition(|&row| assignment[row] == fold);
            Fold { train, validation }
        })
        .collect()
}
