//! Environment Fingerprints
//!
//! Shows which settings take part in the cross-experiment key:
//! - key order in the CV parameters does not matter
//! - n_splits, the CV type and the data do
//! - results path and verbosity do not
//!
//! Run with: cargo run --example environment_fingerprint

use anyhow::Result;
use arrow::array::{ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use hyperhunt::cv::{CvParams, CvType};
use hyperhunt::environment::Environment;
use hyperhunt::fingerprint::{fingerprint, ConfigValue};
use std::sync::Arc;

fn dataset(rows: usize) -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("feature", DataType::Float64, false),
        Field::new("target", DataType::Float64, false),
    ]));
    let feature: ArrayRef = Arc::new(Float64Array::from_iter_values((0..rows).map(|i| i as f64)));
    let target: ArrayRef = Arc::new(Float64Array::from_iter_values((0..rows).map(|i| (i % 2) as f64)));
    Ok(RecordBatch::try_new(schema, vec![feature, target])?)
}

fn main() -> Result<()> {
    hyperhunt::logging::init();

    println!("=== Configuration Fingerprints ===\n");
    let a = ConfigValue::map([("n_splits", 5), ("n_repeats", 2), ("random_state", 32)]);
    let b = ConfigValue::map([("random_state", 32), ("n_splits", 5), ("n_repeats", 2)]);
    println!("  {{n_splits, n_repeats, random_state}} -> {}", fingerprint(&a));
    println!("  {{random_state, n_splits, n_repeats}} -> {}", fingerprint(&b));
    println!("  Identical: {}\n", fingerprint(&a) == fingerprint(&b));

    println!("=== Environment Keys ===\n");
    let base = Environment::builder(dataset(100)?, "target")
        .cross_validation_params(CvParams::new(5).n_repeats(2).random_state(32))
        .build()?;
    println!("  Base:                  {}", base.cross_experiment_key());

    let relocated = Environment::builder(dataset(100)?, "target")
        .cross_validation_params(CvParams::new(5).n_repeats(2).random_state(32))
        .results_path("elsewhere")
        .verbose(false)
        .build()?;
    println!("  Other results path:    {}", relocated.cross_experiment_key());

    let more_splits = Environment::builder(dataset(100)?, "target")
        .cross_validation_params(CvParams::new(10).n_repeats(2).random_state(32))
        .build()?;
    println!("  n_splits = 10:         {}", more_splits.cross_experiment_key());

    let stratified = Environment::builder(dataset(100)?, "target")
        .cross_validation_type(CvType::RepeatedStratifiedKFold)
        .cross_validation_params(CvParams::new(5).n_repeats(2).random_state(32))
        .build()?;
    println!("  RepeatedStratifiedKFold: {}", stratified.cross_experiment_key());

    let more_rows = Environment::builder(dataset(101)?, "target")
        .cross_validation_params(CvParams::new(5).n_repeats(2).random_state(32))
        .build()?;
    println!("  One more row:          {}", more_rows.cross_experiment_key());

    Ok(())
}
