//! Experiment Environment
//!
//! An [`Environment`] fixes everything that must be identical for two experiments to be
//! comparable: the data, the target, the cross-validation scheme, the metrics, and the
//! run count. Its fingerprint, the *cross-experiment key*, is what similarity lookups
//! match on.
//!
//! ```text
//! cross_experiment_key = fingerprint({
//!     cross_validation_type, cross_validation_params, metrics_map, metrics_params,
//!     runs, random_seeds, target_column, do_predict_proba,
//!     train_dataset, holdout_dataset, test_dataset   (dataset fingerprints)
//! })
//! ```
//!
//! Results path, verbosity, blacklist and reporting settings do not take part.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hyperhunt::cv::{CvParams, CvType};
//! use hyperhunt::environment::Environment;
//! use hyperhunt::metrics::MetricsMap;
//! # fn demo(train: arrow::record_batch::RecordBatch) -> hyperhunt::Result<()> {
//! let env = Environment::builder(train, "diagnosis")
//!     .results_path("results")
//!     .metrics_map(MetricsMap::from_names(&["roc_auc_score"]))
//!     .cross_validation_type(CvType::StratifiedKFold)
//!     .cross_validation_params(CvParams::new(5).shuffle(true).random_state(32))
//!     .build()?;
//! println!("{}", env.cross_experiment_key());
//! # Ok(())
//! # }
//! ```

mod blacklist;
mod holdout;

pub use blacklist::{validate_file_blacklist, FileBlacklist, ResultFile};
pub use holdout::{define_holdout_set, HoldoutSource};

use crate::cv::{CvParams, CvType};
use crate::data::{check_feature_columns, column_index};
use crate::file_utils::read_json;
use crate::fingerprint::{dataset_fingerprint, fingerprint, ConfigValue};
use crate::metrics::{MetricSpec, MetricsMap, MetricsParams};
use crate::reporting::ReportingParams;
use crate::storage::ResultStore;
use crate::{Error, Result};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Model seed base when neither `random_seeds` nor a CV `random_state` is given.
pub const DEFAULT_SEED: u64 = 32;

/// Environment settings loadable from a JSON file.
///
/// Every field is optional; builder setters take precedence over file values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentParams {
    /// Directory under which `HyperhuntAssets/` is created
    pub results_path: Option<PathBuf>,
    /// Metric id to built-in metric name
    pub metrics_map: Option<BTreeMap<String, String>>,
    /// Metric selection per data set
    pub metrics_params: Option<MetricsParams>,
    /// CV type name (e.g. `"StratifiedKFold"`)
    pub cross_validation_type: Option<String>,
    /// CV parameters mapping
    pub cross_validation_params: Option<ConfigValue>,
    /// Model fits per fold
    pub runs: Option<usize>,
    /// One model seed per run
    pub random_seeds: Option<Vec<u64>>,
    /// Use probability predictions
    pub do_predict_proba: Option<bool>,
    /// Verbose reporting
    pub verbose: Option<bool>,
    /// `"ALL"` or a list of result file names
    pub file_blacklist: Option<serde_json::Value>,
    /// Reporter settings
    pub reporting_params: Option<ReportingParams>,
}

impl EnvironmentParams {
    /// Load from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for a missing file and `Json` for malformed or unknown fields.
    pub fn from_file(path: &Path) -> Result<Self> {
        read_json(path)
    }
}

/// Validated experiment environment.
#[derive(Debug)]
pub struct Environment {
    train_dataset: RecordBatch,
    holdout_dataset: Option<RecordBatch>,
    test_dataset: Option<RecordBatch>,
    target_column: String,
    results_path: Option<PathBuf>,
    metrics_map: MetricsMap,
    metrics_params: MetricsParams,
    cross_validation_type: CvType,
    cross_validation_params: CvParams,
    runs: usize,
    random_seeds: Option<Vec<u64>>,
    do_predict_proba: bool,
    verbose: bool,
    file_blacklist: FileBlacklist,
    reporting_params: ReportingParams,
    cross_experiment_key: String,
}

impl Environment {
    /// Start building an environment.
    #[must_use]
    pub fn builder(train_dataset: RecordBatch, target_column: impl Into<String>) -> EnvironmentBuilder {
        EnvironmentBuilder::new(train_dataset, target_column)
    }

    /// Training data (after holdout definition).
    #[must_use]
    pub const fn train_dataset(&self) -> &RecordBatch {
        &self.train_dataset
    }

    /// Holdout data, if any.
    #[must_use]
    pub const fn holdout_dataset(&self) -> Option<&RecordBatch> {
        self.holdout_dataset.as_ref()
    }

    /// Test data, if any.
    #[must_use]
    pub const fn test_dataset(&self) -> Option<&RecordBatch> {
        self.test_dataset.as_ref()
    }

    /// Target column name.
    #[must_use]
    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    /// Results directory, if results are persisted.
    #[must_use]
    pub fn results_path(&self) -> Option<&Path> {
        self.results_path.as_deref()
    }

    /// Result store rooted at `results_path`.
    #[must_use]
    pub fn result_store(&self) -> Option<ResultStore> {
        self.results_path.as_deref().map(ResultStore::new)
    }

    /// Metric map.
    #[must_use]
    pub const fn metrics_map(&self) -> &MetricsMap {
        &self.metrics_map
    }

    /// Metric selection.
    #[must_use]
    pub const fn metrics_params(&self) -> &MetricsParams {
        &self.metrics_params
    }

    /// CV type.
    #[must_use]
    pub const fn cross_validation_type(&self) -> CvType {
        self.cross_validation_type
    }

    /// CV parameters.
    #[must_use]
    pub const fn cross_validation_params(&self) -> &CvParams {
        &self.cross_validation_params
    }

    /// Model fits per fold.
    #[must_use]
    pub const fn runs(&self) -> usize {
        self.runs
    }

    /// Explicit seeds, if given.
    #[must_use]
    pub fn random_seeds(&self) -> Option<&[u64]> {
        self.random_seeds.as_deref()
    }

    /// Model seed for run `run`: `random_seeds[run]`, else derived from the CV `random_state`.
    #[must_use]
    pub fn run_seed(&self, run: usize) -> u64 {
        self.random_seeds
            .as_ref()
            .and_then(|seeds| seeds.get(run).copied())
            .unwrap_or_else(|| {
                self.cross_validation_params
                    .random_state_value()
                    .unwrap_or(DEFAULT_SEED)
                    .wrapping_add(run as u64)
            })
    }

    /// Whether models predict probabilities.
    #[must_use]
    pub const fn do_predict_proba(&self) -> bool {
        self.do_predict_proba
    }

    /// Verbose reporting.
    #[must_use]
    pub const fn verbose(&self) -> bool {
        self.verbose
    }

    /// Blacklisted result files.
    #[must_use]
    pub const fn file_blacklist(&self) -> &FileBlacklist {
        &self.file_blacklist
    }

    /// Whether `file` may be written (results path set and not blacklisted).
    #[must_use]
    pub fn writes(&self, file: ResultFile) -> bool {
        self.results_path.is_some() && self.file_blacklist.allows(file)
    }

    /// Reporter settings.
    #[must_use]
    pub const fn reporting_params(&self) -> &ReportingParams {
        &self.reporting_params
    }

    /// Environment fingerprint.
    #[must_use]
    pub fn cross_experiment_key(&self) -> &str {
        &self.cross_experiment_key
    }
}

/// Builder for [`Environment`].
#[derive(Debug)]
pub struct EnvironmentBuilder {
    train_dataset: RecordBatch,
    target_column: String,
    holdout: Option<HoldoutSource>,
    test_dataset: Option<RecordBatch>,
    environment_params_path: Option<PathBuf>,
    results_path: Option<PathBuf>,
    metrics_map: Option<MetricsMap>,
    metrics_params: Option<MetricsParams>,
    cross_validation_type: Option<CvType>,
    cross_validation_params: Option<CvParams>,
    runs: Option<usize>,
    random_seeds: Option<Vec<u64>>,
    do_predict_proba: Option<bool>,
    verbose: Option<bool>,
    file_blacklist: Option<FileBlacklist>,
    reporting_params: Option<ReportingParams>,
}

impl EnvironmentBuilder {
    /// Create a builder with the required fields.
    #[must_use]
    pub fn new(train_dataset: RecordBatch, target_column: impl Into<String>) -> Self {
        Self {
            train_dataset,
            target_column: target_column.into(),
            holdout: None,
            test_dataset: None,
            environment_params_path: None,
            results_path: None,
            metrics_map: None,
            metrics_params: None,
            cross_validation_type: None,
            cross_validation_params: None,
            runs: None,
            random_seeds: None,
            do_predict_proba: None,
            verbose: None,
            file_blacklist: None,
            reporting_params: None,
        }
    }

    /// Set the holdout source.
    #[must_use]
    pub fn holdout(mut self, source: HoldoutSource) -> Self {
        self.holdout = Some(source);
        self
    }

    /// Set the test dataset.
    #[must_use]
    pub fn test_dataset(mut self, test: RecordBatch) -> Self {
        self.test_dataset = Some(test);
        self
    }

    /// Load defaults from an [`EnvironmentParams`] JSON file.
    #[must_use]
    pub fn environment_params_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.environment_params_path = Some(path.into());
        self
    }

    /// Persist results under `path`.
    #[must_use]
    pub fn results_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.results_path = Some(path.into());
        self
    }

    /// Set the metric map.
    #[must_use]
    pub fn metrics_map(mut self, metrics: MetricsMap) -> Self {
        self.metrics_map = Some(metrics);
        self
    }

    /// Set the metric selection.
    #[must_use]
    pub fn metrics_params(mut self, params: MetricsParams) -> Self {
        self.metrics_params = Some(params);
        self
    }

    /// Set the CV type.
    #[must_use]
    pub const fn cross_validation_type(mut self, cv_type: CvType) -> Self {
        self.cross_validation_type = Some(cv_type);
        self
    }

    /// Set the CV parameters.
    #[must_use]
    pub const fn cross_validation_params(mut self, params: CvParams) -> Self {
        self.cross_validation_params = Some(params);
        self
    }

    /// Set the number of model fits per fold.
    #[must_use]
    pub const fn runs(mut self, runs: usize) -> Self {
        self.runs = Some(runs);
        self
    }

    /// Set one model seed per run.
    #[must_use]
    pub fn random_seeds(mut self, seeds: Vec<u64>) -> Self {
        self.random_seeds = Some(seeds);
        self
    }

    /// Predict probabilities instead of labels.
    #[must_use]
    pub const fn do_predict_proba(mut self, proba: bool) -> Self {
        self.do_predict_proba = Some(proba);
        self
    }

    /// Verbose reporting.
    #[must_use]
    pub const fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    /// Set the result-file blacklist.
    #[must_use]
    pub fn file_blacklist(mut self, blacklist: FileBlacklist) -> Self {
        self.file_blacklist = Some(blacklist);
        self
    }

    /// Set the reporter settings.
    #[must_use]
    pub fn reporting_params(mut self, params: ReportingParams) -> Self {
        self.reporting_params = Some(params);
        self
    }

    /// Validate and build the environment.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first invalid field, or an I/O / JSON error
    /// if the params file or holdout file cannot be read.
    pub fn build(self) -> Result<Environment> {
        let file = match &self.environment_params_path {
            Some(path) => EnvironmentParams::from_file(path)?,
            None => EnvironmentParams::default(),
        };

        let metrics_map = match (self.metrics_map, file.metrics_map) {
            (Some(map), _) => map,
            (None, Some(names)) => names
                .into_iter()
                .fold(MetricsMap::new(), |map, (id, name)| map.with(id, MetricSpec::named(name))),
            (None, None) => MetricsMap::from_names(&["roc_auc_score"]),
        };
        metrics_map.validate()?;
        let metrics_params = self
            .metrics_params
            .or(file.metrics_params)
            .unwrap_or_default();
        metrics_params.validate(&metrics_map)?;

        let cross_validation_type = match (self.cross_validation_type, file.cross_validation_type) {
            (Some(cv_type), _) => cv_type,
            (None, Some(name)) => name.parse()?,
            (None, None) => CvType::KFold,
        };
        let cross_validation_params = match (self.cross_validation_params, file.cross_validation_params) {
            (Some(params), _) => params,
            (None, Some(config)) => CvParams::from_config(&config)?,
            (None, None) => CvParams::new(5).shuffle(true).random_state(DEFAULT_SEED),
        };
        cross_validation_params.validate(cross_validation_type)?;

        let runs = self.runs.or(file.runs).unwrap_or(1);
        if runs == 0 {
            return Err(Error::Validation("runs must be at least 1".to_string()));
        }
        let random_seeds = self.random_seeds.or(file.random_seeds);
        if let Some(seeds) = &random_seeds {
            if seeds.len() != runs {
                return Err(Error::Validation(format!(
                    "random_seeds must contain one seed per run: expected {runs}, received {}",
                    seeds.len()
                )));
            }
        }

        let file_blacklist = match (self.file_blacklist, file.file_blacklist) {
            (Some(blacklist), _) => blacklist,
            (None, Some(value)) => validate_file_blacklist(&value)?,
            (None, None) => FileBlacklist::none(),
        };
        let reporting_params = self
            .reporting_params
            .or(file.reporting_params)
            .unwrap_or_default();
        reporting_params.validate()?;

        let (train_dataset, holdout_dataset) =
            define_holdout_set(self.train_dataset, self.holdout, &self.target_column)?;
        column_index(&train_dataset, &self.target_column)?;
        if let Some(holdout) = &holdout_dataset {
            column_index(holdout, &self.target_column)?;
        }
        if let Some(test) = &self.test_dataset {
            check_feature_columns(&train_dataset, test, &self.target_column, "Test")?;
        }

        let mut environment = Environment {
            train_dataset,
            holdout_dataset,
            test_dataset: self.test_dataset,
            target_column: self.target_column,
            results_path: self.results_path.or(file.results_path),
            metrics_map,
            metrics_params,
            cross_validation_type,
            cross_validation_params,
            runs,
            random_seeds,
            do_predict_proba: self.do_predict_proba.or(file.do_predict_proba).unwrap_or(false),
            verbose: self.verbose.or(file.verbose).unwrap_or(true),
            file_blacklist,
            reporting_params,
            cross_experiment_key: String::new(),
        };
        environment.cross_experiment_key = fingerprint(&cross_experiment_config(&environment)?);
        tracing::debug!(
            cross_experiment_key = %environment.cross_experiment_key,
            "Environment initialized"
        );
        Ok(environment)
    }
}

/// The configuration tree hashed into the cross-experiment key.
///
/// # Errors
///
/// Returns error if a dataset cannot be fingerprinted.
pub fn cross_experiment_config(env: &Environment) -> Result<ConfigValue> {
    let optional_dataset = |batch: Option<&RecordBatch>| -> Result<ConfigValue> {
        Ok(batch.map(dataset_fingerprint).transpose()?.into())
    };
    Ok(ConfigValue::map([
        (
            "cross_validation_type",
            ConfigValue::from(env.cross_validation_type.name()),
        ),
        (
            "cross_validation_params",
            env.cross_validation_params
                .effective_config(env.cross_validation_type),
        ),
        ("metrics_map", env.metrics_map.to_config()),
        ("metrics_params", env.metrics_params.to_config()),
        ("runs", env.runs.into()),
        ("random_seeds", env.random_seeds.clone().into()),
        ("target_column", env.target_column.as_str().into()),
        ("do_predict_proba", env.do_predict_proba.into()),
        ("train_dataset", dataset_fingerprint(&env.train_dataset)?.into()),
        ("holdout_dataset", optional_dataset(env.holdout_dataset.as_ref())?),
        ("test_dataset", optional_dataset(env.test_dataset.as_ref())?),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float64Array, Int64Array};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn train() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("x", DataType::Float64, false),
            Field::new("target", DataType::Int64, false),
        ]));
        let x: ArrayRef = Arc::new(Float64Array::from((0..20).map(f64::from).collect::<Vec<_>>()));
        let y: ArrayRef = Arc::new(Int64Array::from((0..20).map(|i| i % 2).collect::<Vec<i64>>()));
        RecordBatch::try_new(schema, vec![x, y]).unwrap()
    }

    #[test]
    fn test_defaults_build() {
        let env = Environment::builder(train(), "target").build().unwrap();
        assert_eq!(env.runs(), 1);
        assert_eq!(env.cross_validation_type(), CvType::KFold);
        assert_eq!(env.cross_experiment_key().len(), crate::fingerprint::FINGERPRINT_LEN);
        assert!(!env.writes(ResultFile::Description));
    }

    #[test]
    fn test_missing_target_fails() {
        let err = Environment::builder(train(), "diagnosis").build().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_test_dataset_columns_checked_at_build() {
        let renamed = {
            let schema = Arc::new(Schema::new(vec![Field::new("z", DataType::Float64, false)]));
            let z: ArrayRef = Arc::new(Float64Array::from(vec![1.0, 2.0]));
            RecordBatch::try_new(schema, vec![z]).unwrap()
        };
        let err = Environment::builder(train(), "target")
            .test_dataset(renamed)
            .build()
            .unwrap_err();
        assert!(matches!(&err, Error::Validation(m) if m.starts_with("Mismatched columns")));

        let features_only = train().project(&[0]).unwrap();
        assert!(Environment::builder(train(), "target")
            .test_dataset(features_only)
            .build()
            .is_ok());
    }

    #[test]
    fn test_seed_count_must_match_runs() {
        let err = Environment::builder(train(), "target")
            .runs(3)
            .random_seeds(vec![1, 2])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("random_seeds"));
    }

    #[test]
    fn test_run_seed_derivation() {
        let env = Environment::builder(train(), "target")
            .runs(2)
            .cross_validation_params(CvParams::new(3).random_state(100))
            .build()
            .unwrap();
        assert_eq!(env.run_seed(0), 100);
        assert_eq!(env.run_seed(1), 101);

        let env = Environment::builder(train(), "target")
            .runs(2)
            .random_seeds(vec![7, 9])
            .build()
            .unwrap();
        assert_eq!(env.run_seed(1), 9);
    }

    #[test]
    fn test_verbose_and_results_path_do_not_change_key() {
        let a = Environment::builder(train(), "target").verbose(false).build().unwrap();
        let b = Environment::builder(train(), "target")
            .results_path("elsewhere")
            .file_blacklist(FileBlacklist::All)
            .build()
            .unwrap();
        assert_eq!(a.cross_experiment_key(), b.cross_experiment_key());
    }

    #[test]
    fn test_params_file_supplies_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("env.json");
        std::fs::write(
            &path,
            r#"{
                "runs": 2,
                "cross_validation_type": "StratifiedKFold",
                "cross_validation_params": {"n_splits": 4, "shuffle": true, "random_state": 1},
                "metrics_map": {"acc": "accuracy_score"},
                "file_blacklist": ["current_heartbeat"]
            }"#,
        )
        .unwrap();

        let env = Environment::builder(train(), "target")
            .environment_params_path(&path)
            .runs(3)
            .build()
            .unwrap();
        assert_eq!(env.runs(), 3);
        assert_eq!(env.cross_validation_type(), CvType::StratifiedKFold);
        assert_eq!(env.cross_validation_params().n_splits_value(), 4);
        assert_eq!(env.metrics_map().ids().collect::<Vec<_>>(), vec!["acc"]);
        assert!(!env.file_blacklist().allows(ResultFile::Heartbeat));
    }

    #[test]
    fn test_params_file_unknown_field() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("env.json");
        std::fs::write(&path, r#"{"runz": 2}"#).unwrap();
        let err = Environment::builder(train(), "target")
            .environment_params_path(&path)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_bad_float_format_fails() {
        let err = Environment::builder(train(), "target")
            .reporting_params(ReportingParams {
                float_format: "{:.5f".to_string(),
                ..ReportingParams::default()
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
