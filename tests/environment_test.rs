//! Environment fingerprint behavior across construction paths

use arrow::array::{ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use hyperhunt::cv::{CvParams, CvType};
use hyperhunt::environment::{Environment, HoldoutSource};
use hyperhunt::metrics::{MetricSpec, MetricsMap};
use std::sync::Arc;
use tempfile::tempdir;

fn dataset(rows: usize, offset: f64) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("radius", DataType::Float64, false),
        Field::new("texture", DataType::Float64, false),
        Field::new("diagnosis", DataType::Float64, false),
    ]));
    let radius: ArrayRef = Arc::new(Float64Array::from(
        (0..rows).map(|i| i as f64 + offset).collect::<Vec<_>>(),
    ));
    let texture: ArrayRef = Arc::new(Float64Array::from(
        (0..rows).map(|i| ((i * 7) % 11) as f64).collect::<Vec<_>>(),
    ));
    let diagnosis: ArrayRef = Arc::new(Float64Array::from(
        (0..rows).map(|i| (i % 2) as f64).collect::<Vec<_>>(),
    ));
    RecordBatch::try_new(schema, vec![radius, texture, diagnosis]).unwrap()
}

fn key_with(params: CvParams) -> String {
    Environment::builder(dataset(30, 0.0), "diagnosis")
        .cross_validation_params(params)
        .build()
        .unwrap()
        .cross_experiment_key()
        .to_string()
}

#[test]
fn test_key_is_deterministic() {
    let params = CvParams::new(5).n_repeats(2).random_state(32);
    assert_eq!(key_with(params.clone()), key_with(params));
}

#[test]
fn test_params_file_in_any_key_order_matches_builder() {
    let dir = tempdir().unwrap();
    let builder_key = key_with(CvParams::new(5).n_repeats(2).random_state(32));

    for (i, body) in [
        r#"{"cross_validation_params": {"n_splits": 5, "n_repeats": 2, "random_state": 32}}"#,
        r#"{"cross_validation_params": {"random_state": 32, "n_splits": 5, "n_repeats": 2}}"#,
        r#"{"cross_validation_params": {"n_repeats": 2, "random_state": 32, "n_splits": 5}}"#,
    ]
    .into_iter()
    .enumerate()
    {
        let path = dir.path().join(format!("env_{i}.json"));
        std::fs::write(&path, body).unwrap();
        let env = Environment::builder(dataset(30, 0.0), "diagnosis")
            .environment_params_path(&path)
            .build()
            .unwrap();
        assert_eq!(env.cross_experiment_key(), builder_key, "{body}");
    }
}

#[test]
fn test_spelled_out_defaults_keep_key() {
    assert_eq!(
        key_with(CvParams::new(5).random_state(1)),
        key_with(CvParams::new(5).random_state(1).shuffle(false).n_repeats(1))
    );
}

#[test]
fn test_meaningful_changes_alter_key() {
    let base = key_with(CvParams::new(5).random_state(32));
    assert_ne!(base, key_with(CvParams::new(4).random_state(32)));
    assert_ne!(base, key_with(CvParams::new(5).random_state(33)));
    assert_ne!(base, key_with(CvParams::new(5).random_state(32).shuffle(true)));

    let stratified = Environment::builder(dataset(30, 0.0), "diagnosis")
        .cross_validation_type(CvType::StratifiedKFold)
        .cross_validation_params(CvParams::new(5).random_state(32))
        .build()
        .unwrap();
    assert_ne!(base, stratified.cross_experiment_key());
}

#[test]
fn test_data_changes_alter_key() {
    let build = |train: RecordBatch| {
        Environment::builder(train, "diagnosis")
            .build()
            .unwrap()
            .cross_experiment_key()
            .to_string()
    };
    assert_ne!(build(dataset(30, 0.0)), build(dataset(30, 0.5)));
    assert_ne!(build(dataset(30, 0.0)), build(dataset(31, 0.0)));

    let with_holdout = Environment::builder(dataset(30, 0.0), "diagnosis")
        .holdout(HoldoutSource::Dataset(dataset(10, 100.0)))
        .build()
        .unwrap();
    assert_ne!(build(dataset(30, 0.0)), with_holdout.cross_experiment_key());
}

#[test]
fn test_metric_identity_alters_key() {
    let build = |metrics: MetricsMap| {
        Environment::builder(dataset(30, 0.0), "diagnosis")
            .metrics_map(metrics)
            .build()
            .unwrap()
            .cross_experiment_key()
            .to_string()
    };
    let named = build(MetricsMap::from_names(&["roc_auc_score"]));
    let renamed = build(MetricsMap::new().with("auc", MetricSpec::named("roc_auc_score")));
    let custom = build(MetricsMap::new().with(
        "roc_auc_score",
        MetricSpec::custom("my_auc", |_: &[f64], _: &[f64]| 0.5),
    ));
    assert_ne!(named, renamed);
    assert_ne!(named, custom);
}

#[test]
fn test_holdout_split_function() {
    let env = Environment::builder(dataset(30, 0.0), "diagnosis")
        .holdout(HoldoutSource::split(|train, _target| {
            Ok((train.slice(0, 24), train.slice(24, 6)))
        }))
        .build()
        .unwrap();
    assert_eq!(env.train_dataset().num_rows(), 24);
    assert_eq!(env.holdout_dataset().map(RecordBatch::num_rows), Some(6));
}
