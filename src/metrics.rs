//! Metrics registry and evaluation
//!
//! A metrics map assigns an id (`"roc"`, `"f1"`) to either a named built-in metric or a
//! custom callable. Custom callables carry an explicit identity string, and that identity
//! is all the fingerprint sees of them.

use crate::fingerprint::ConfigValue;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Signature of a metric function: `(y_true, y_pred) -> score`.
pub type MetricFn = Arc<dyn Fn(&[f64], &[f64]) -> f64 + Send + Sync>;

/// Built-in metrics, addressed by their conventional names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinMetric {
    /// Area under the ROC curve
    RocAuc,
    /// Binary F1 (positive label 1)
    F1,
    /// Fraction of correct labels
    Accuracy,
    /// Binary precision
    Precision,
    /// Binary recall
    Recall,
    /// Binary cross-entropy
    LogLoss,
    /// Mean squared error
    MeanSquaredError,
    /// Mean absolute error
    MeanAbsoluteError,
    /// Coefficient of determination
    R2,
}

impl BuiltinMetric {
    /// Every built-in metric.
    pub const ALL: [Self; 9] = [
        Self::RocAuc,
        Self::F1,
        Self::Accuracy,
        Self::Precision,
        Self::Recall,
        Self::LogLoss,
        Self::MeanSquaredError,
        Self::MeanAbsoluteError,
        Self::R2,
    ];

    /// Look up a built-in metric by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Registry name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RocAuc => "roc_auc_score",
            Self::F1 => "f1_score",
            Self::Accuracy => "accuracy_score",
            Self::Precision => "precision_score",
            Self::Recall => "recall_score",
            Self::LogLoss => "log_loss",
            Self::MeanSquaredError => "mean_squared_error",
            Self::MeanAbsoluteError => "mean_absolute_error",
            Self::R2 => "r2_score",
        }
    }

    /// Whether larger values are better.
    #[must_use]
    pub const fn greater_is_better(self) -> bool {
        !matches!(
            self,
            Self::LogLoss | Self::MeanSquaredError | Self::MeanAbsoluteError
        )
    }

    /// Evaluate on `(y_true, y_pred)`.
    ///
    /// # Errors
    ///
    /// Returns error if the metric is undefined for the input (e.g. ROC AUC with one class).
    pub fn evaluate(self, y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
        match self {
            Self::RocAuc => roc_auc(y_true, y_pred),
            Self::F1 => {
                let c = Confusion::new(y_true, y_pred);
                Ok(ratio(2 * c.tp, 2 * c.tp + c.fp + c.fn_))
            }
            Self::Accuracy => Ok(accuracy(y_true, y_pred)),
            Self::Precision => {
                let c = Confusion::new(y_true, y_pred);
                Ok(ratio(c.tp, c.tp + c.fp))
            }
            Self::Recall => {
                let c = Confusion::new(y_true, y_pred);
                Ok(ratio(c.tp, c.tp + c.fn_))
            }
            Self::LogLoss => Ok(log_loss(y_true, y_pred)),
            Self::MeanSquaredError => Ok(mean(y_true, y_pred, |d| d * d)),
            Self::MeanAbsoluteError => Ok(mean(y_true, y_pred, f64::abs)),
            Self::R2 => Ok(r2(y_true, y_pred)),
        }
    }
}

/// How a metric id is computed.
#[derive(Clone)]
pub enum MetricSpec {
    /// A registry name such as `"roc_auc_score"`
    Named(String),
    /// A custom callable with a stable identity
    Custom {
        /// Identity used for fingerprinting
        identity: String,
        /// The metric function
        func: MetricFn,
        /// Direction of improvement
        greater_is_better: bool,
    },
}

impl MetricSpec {
    /// Named metric.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Custom metric where greater is better.
    pub fn custom<F>(identity: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[f64], &[f64]) -> f64 + Send + Sync + 'static,
    {
        Self::Custom {
            identity: identity.into(),
            func: Arc::new(func),
            greater_is_better: true,
        }
    }

    /// Custom metric where lower is better (a loss).
    pub fn custom_loss<F>(identity: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[f64], &[f64]) -> f64 + Send + Sync + 'static,
    {
        Self::Custom {
            identity: identity.into(),
            func: Arc::new(func),
            greater_is_better: false,
        }
    }

    /// Fingerprint representation: names stay strings, callables become identities.
    #[must_use]
    pub fn to_config(&self) -> ConfigValue {
        match self {
            Self::Named(name) => ConfigValue::Str(name.clone()),
            Self::Custom { identity, .. } => ConfigValue::callable(identity.clone()),
        }
    }

    /// Whether larger values are better. Unknown names default to `true`.
    #[must_use]
    pub fn greater_is_better(&self) -> bool {
        match self {
            Self::Named(name) => {
                BuiltinMetric::from_name(name).map_or(true, BuiltinMetric::greater_is_better)
            }
            Self::Custom {
                greater_is_better, ..
            } => *greater_is_better,
        }
    }

    /// Evaluate on `(y_true, y_pred)`.
    ///
    /// # Errors
    ///
    /// Returns error on length mismatch, empty input, unknown names, or undefined metrics.
    pub fn evaluate(&self, y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
        if y_true.len() != y_pred.len() {
            return Err(Error::InvalidInput(format!(
                "y_true has {} values but y_pred has {}",
                y_true.len(),
                y_pred.len()
            )));
        }
        if y_true.is_empty() {
            return Err(Error::InvalidInput("cannot evaluate empty predictions".to_string()));
        }
        match self {
            Self::Named(name) => BuiltinMetric::from_name(name)
                .ok_or_else(|| Error::Validation(format!("Unknown metric: {name}")))?
                .evaluate(y_true, y_pred),
            Self::Custom { func, .. } => Ok(func(y_true, y_pred)),
        }
    }
}

impl fmt::Debug for MetricSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Custom {
                identity,
                greater_is_better,
                ..
            } => f
                .debug_struct("Custom")
                .field("identity", identity)
                .field("greater_is_better", greater_is_better)
                .finish_non_exhaustive(),
        }
    }
}

/// Insertion-ordered map of metric id to spec.
///
/// The first entry is the default optimization target.
#[derive(Debug, Clone, Default)]
pub struct MetricsMap {
    entries: Vec<(String, MetricSpec)>,
}

impl MetricsMap {
    /// Empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map where each built-in name is its own id.
    #[must_use]
    pub fn from_names(names: &[&str]) -> Self {
        names
            .iter()
            .fold(Self::new(), |map, name| map.with(*name, MetricSpec::named(*name)))
    }

    /// Add or replace a metric.
    #[must_use]
    pub fn with(mut self, id: impl Into<String>, spec: MetricSpec) -> Self {
        let id = id.into();
        if let Some(slot) = self.entries.iter_mut().find(|(existing, _)| *existing == id) {
            slot.1 = spec;
        } else {
            self.entries.push((id, spec));
        }
        self
    }

    /// Look up a metric by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&MetricSpec> {
        self.entries.iter().find(|(k, _)| k == id).map(|(_, v)| v)
    }

    /// Metric ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Iterate `(id, spec)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricSpec)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of metrics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check that the map is non-empty and every named metric exists.
    ///
    /// # Errors
    ///
    /// Returns a validation error otherwise.
    pub fn validate(&self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(Error::Validation("metrics_map must contain at least one metric".to_string()));
        }
        for (id, spec) in &self.entries {
            if let MetricSpec::Named(name) = spec {
                if BuiltinMetric::from_name(name).is_none() {
                    return Err(Error::Validation(format!(
                        "Unknown metric '{name}' for id '{id}'"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Fingerprint representation: key-sorted `id -> name | callable`.
    #[must_use]
    pub fn to_config(&self) -> ConfigValue {
        ConfigValue::map(self.entries.iter().map(|(k, v)| (k.clone(), v.to_config())))
    }
}

/// Which data a metric evaluation was computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationSet {
    /// Training rows of each fold
    InFold,
    /// Out-of-fold predictions over the full train set
    Oof,
    /// Holdout dataset
    Holdout,
}

impl EvaluationSet {
    /// Every evaluation set, in reporting order.
    pub const ALL: [Self; 3] = [Self::Oof, Self::Holdout, Self::InFold];

    /// Short name (`in_fold`, `oof`, `holdout`).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::InFold => "in_fold",
            Self::Oof => "oof",
            Self::Holdout => "holdout",
        }
    }

    /// Display label used in reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::InFold => "In-Fold",
            Self::Oof => "OOF",
            Self::Holdout => "Holdout",
        }
    }

    /// Parse a short name.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown names.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "in_fold" => Ok(Self::InFold),
            "oof" => Ok(Self::Oof),
            "holdout" => Ok(Self::Holdout),
            other => Err(Error::Validation(format!(
                "Unknown evaluation set: {other}. Expected one of [in_fold, oof, holdout]"
            ))),
        }
    }
}

/// Metric selection for one evaluation set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MetricSelection {
    /// Every metric in the map
    #[default]
    All,
    /// Only these metric ids
    Only(Vec<String>),
    /// Skip this evaluation set
    Skip,
}

impl MetricSelection {
    fn to_config(&self) -> ConfigValue {
        match self {
            Self::All => ConfigValue::from("all"),
            Self::Only(ids) => ConfigValue::from(ids.clone()),
            Self::Skip => ConfigValue::Null,
        }
    }

    fn includes(&self, id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(ids) => ids.iter().any(|i| i == id),
            Self::Skip => false,
        }
    }
}

/// Per-evaluation-set metric selection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetricsParams {
    /// In-fold selection
    #[serde(default)]
    pub in_fold: MetricSelection,
    /// Out-of-fold selection
    #[serde(default)]
    pub oof: MetricSelection,
    /// Holdout selection
    #[serde(default)]
    pub holdout: MetricSelection,
}

impl MetricsParams {
    /// Selection for `set`.
    #[must_use]
    pub const fn selection(&self, set: EvaluationSet) -> &MetricSelection {
        match set {
            EvaluationSet::InFold => &self.in_fold,
            EvaluationSet::Oof => &self.oof,
            EvaluationSet::Holdout => &self.holdout,
        }
    }

    /// Check that every selected id exists in `metrics`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for ids missing from the map.
    pub fn validate(&self, metrics: &MetricsMap) -> Result<()> {
        for set in EvaluationSet::ALL {
            if let MetricSelection::Only(ids) = self.selection(set) {
                if let Some(missing) = ids.iter().find(|id| metrics.get(id).is_none()) {
                    return Err(Error::Validation(format!(
                        "metrics_params.{} selects '{missing}', which is not in metrics_map",
                        set.name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Fingerprint representation.
    #[must_use]
    pub fn to_config(&self) -> ConfigValue {
        ConfigValue::map([
            ("in_fold", self.in_fold.to_config()),
            ("oof", self.oof.to_config()),
            ("holdout", self.holdout.to_config()),
        ])
    }

    /// Evaluate the metrics selected for `set`.
    ///
    /// Returns `None` when the set is skipped.
    ///
    /// # Errors
    ///
    /// Returns the first metric evaluation error.
    pub fn evaluate(
        &self,
        metrics: &MetricsMap,
        set: EvaluationSet,
        y_true: &[f64],
        y_pred: &[f64],
    ) -> Result<Option<BTreeMap<String, f64>>> {
        let selection = self.selection(set);
        if *selection == MetricSelection::Skip {
            return Ok(None);
        }
        let mut results = BTreeMap::new();
        for (id, spec) in metrics.iter().filter(|(id, _)| selection.includes(id)) {
            results.insert(id.to_string(), spec.evaluate(y_true, y_pred)?);
        }
        Ok(Some(results))
    }
}

/// Threshold a prediction into a binary label.
#[must_use]
pub fn to_label(prediction: f64) -> f64 {
    if prediction >= 0.5 {
        1.0
    } else {
        0.0
    }
}

struct Confusion {
    tp: usize,
    fp: usize,
    fn_: usize,
}

impl Confusion {
    fn new(y_true: &[f64], y_pred: &[f64]) -> Self {
        let mut c = Self { tp: 0, fp: 0, fn_: 0 };
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (to_label(t) > 0.5, to_label(p) > 0.5) {
                (true, true) => c.tp += 1,
                (false, true) => c.fp += 1,
                (true, false) => c.fn_ += 1,
                (false, false) => {}
            }
        }
        c
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn accuracy(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let correct = y_true
        .iter()
        .zip(y_pred)
        .filter(|(&t, &p)| class_label(t).to_bits() == class_label(p).to_bits())
        .count();
    ratio(correct, y_true.len())
}

/// Probabilities threshold at 0.5; anything outside `[0, 1]` is a class index.
fn class_label(x: f64) -> f64 {
    if (0.0..=1.0).contains(&x) {
        to_label(x)
    } else {
        x.round()
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(y_true: &[f64], y_pred: &[f64], f: impl Fn(f64) -> f64) -> f64 {
    y_true.iter().zip(y_pred).map(|(t, p)| f(t - p)).sum::<f64>() / y_true.len() as f64
}

#[allow(clippy::cast_precision_loss)]
fn r2(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let avg = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - avg).powi(2)).sum();
    if ss_tot == 0.0 {
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    }
}

#[allow(clippy::cast_precision_loss)]
fn log_loss(y_true: &[f64], y_pred: &[f64]) -> f64 {
    const EPS: f64 = 1e-15;
    let total: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(&t, &p)| {
            let p = p.clamp(EPS, 1.0 - EPS);
            -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
        })
        .sum();
    total / y_true.len() as f64
}

/// Rank-based (Mann-Whitney) ROC AUC with average ranks for ties.
#[allow(clippy::cast_precision_loss)]
fn roc_auc(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    let positives = y_true.iter().filter(|&&t| to_label(t) > 0.5).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(Error::InvalidInput(
            "Only one class present in y_true. ROC AUC score is not defined in that case."
                .to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..y_pred.len()).collect();
    order.sort_by(|&a, &b| y_pred[a].total_cmp(&y_pred[b]));

    let mut ranks = vec![0.0; y_pred.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && y_pred[order[j + 1]] == y_pred[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = y_true
        .iter()
        .zip(&ranks)
        .filter(|(&t, _)| to_label(t) > 0.5)
        .map(|(_, &r)| r)
        .sum();
    let (p, n) = (positives as f64, negatives as f64);
    Ok((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}
