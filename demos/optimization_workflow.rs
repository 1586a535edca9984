//! Optimization Workflow
//!
//! Two optimization rounds over the same Environment. The second round finds the
//! experiments of the first, seeds its surrogate with them, and only runs new points.
//!
//! Run with: cargo run --example optimization_workflow [results_dir]

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use hyperhunt::cv::{CvParams, CvType};
use hyperhunt::environment::Environment;
use hyperhunt::leaderboard::Leaderboard;
use hyperhunt::metrics::{EvaluationSet, MetricsMap};
use hyperhunt::model::LogisticRegression;
use hyperhunt::optimization::{
    Acquisition, Dimension, Guideline, OptimizationProtocol, OptimizerConfig, OptimizerKind,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::Arc;

/// Two noisy Gaussian blobs
fn synthetic_dataset(rows: usize) -> Result<RecordBatch> {
    let mut rng = StdRng::seed_from_u64(7);
    let mut x1 = Vec::with_capacity(rows);
    let mut x2 = Vec::with_capacity(rows);
    let mut y = Vec::with_capacity(rows);
    for i in 0..rows {
        let label = (i % 2) as f64;
        x1.push(label.mul_add(1.5, rng.random_range(-1.0..1.0)));
        x2.push(label.mul_add(-0.5, rng.random_range(-1.0..1.0)));
        y.push(label);
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("x1", DataType::Float64, false),
        Field::new("x2", DataType::Float64, false),
        Field::new("label", DataType::Float64, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Float64Array::from(x1)),
        Arc::new(Float64Array::from(x2)),
        Arc::new(Float64Array::from(y)),
    ];
    Ok(RecordBatch::try_new(schema, columns)?)
}

fn round(env: &Environment, kind: OptimizerKind, iterations: usize) -> Result<OptimizationProtocol> {
    let mut protocol = OptimizationProtocol::new(
        kind,
        OptimizerConfig {
            iterations,
            n_initial_points: 3,
            ..OptimizerConfig::default()
        },
    );
    protocol.set_experiment_guidelines(
        LogisticRegression,
        [
            ("learning_rate", Guideline::from(Dimension::real(0.01, 0.5)?)),
            ("max_iter", Dimension::integer(20, 200)?.into()),
            ("l2", Guideline::fixed(0.0)),
        ],
    )?;
    protocol.go(env)?;
    Ok(protocol)
}

fn main() -> Result<()> {
    hyperhunt::logging::init();

    let results: PathBuf = std::env::args()
        .nth(1)
        .map_or_else(|| std::env::temp_dir().join("hyperhunt_demo"), PathBuf::from);

    let env = Environment::builder(synthetic_dataset(200)?, "label")
        .results_path(&results)
        .metrics_map(MetricsMap::from_names(&["roc_auc_score", "accuracy_score"]))
        .cross_validation_type(CvType::StratifiedKFold)
        .cross_validation_params(CvParams::new(5).shuffle(true).random_state(32))
        .do_predict_proba(true)
        .verbose(false)
        .build()
        .context("building environment")?;

    println!("=== Hyperhunt Optimization Workflow ===");
    println!("  Results: {}", results.display());
    println!("  Cross-experiment key: {}\n", env.cross_experiment_key());

    println!("=== Round 1: Random Search ===");
    let first = round(&env, OptimizerKind::Random, 5)?;
    println!("  Best OOF roc_auc_score: {:?}\n", first.best_score());

    println!("=== Round 2: Bayesian Optimization (UCB) ===");
    let second = round(
        &env,
        OptimizerKind::Bayesian {
            acquisition: Acquisition::UpperConfidenceBound { kappa: 1.96 },
        },
        5,
    )?;
    println!(
        "  Found {} similar experiments; best OOF roc_auc_score: {:?}\n",
        second.similar_experiments().len(),
        second.best_score()
    );

    println!("=== Global Leaderboard (top 3) ===");
    let store = env.result_store().context("results path is set")?;
    let leaderboard = Leaderboard::load(&store.leaderboard_path())?;
    for (rank, entry) in leaderboard
        .rank(EvaluationSet::Oof, "roc_auc_score", 3, true)?
        .iter()
        .enumerate()
    {
        println!(
            "  {}. {} {:.5} ({})",
            rank + 1,
            entry.experiment_id,
            entry.value,
            entry.algorithm_name
        );
    }

    Ok(())
}
