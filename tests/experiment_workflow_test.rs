//! End-to-end optimization workflow: results of one round warm-start the next

use arrow::array::{ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use hyperhunt::cv::{CvParams, CvType};
use hyperhunt::environment::{Environment, FileBlacklist, ResultFile};
use hyperhunt::leaderboard::Leaderboard;
use hyperhunt::metrics::{EvaluationSet, MetricsMap};
use hyperhunt::model::LogisticRegression;
use hyperhunt::optimization::{
    Dimension, Guideline, OptimizationProtocol, OptimizerConfig, OptimizerKind,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn train() -> RecordBatch {
    let n: i32 = 48;
    let schema = Arc::new(Schema::new(vec![
        Field::new("mean_radius", DataType::Float64, false),
        Field::new("mean_texture", DataType::Float64, false),
        Field::new("diagnosis", DataType::Float64, false),
    ]));
    let radius: ArrayRef = Arc::new(Float64Array::from(
        (0..n).map(|i| f64::from(i) / 8.0).collect::<Vec<_>>(),
    ));
    let texture: ArrayRef = Arc::new(Float64Array::from(
        (0..n).map(|i| f64::from((i * 5) % 9)).collect::<Vec<_>>(),
    ));
    let diagnosis: ArrayRef = Arc::new(Float64Array::from(
        (0..n)
            .map(|i| if i >= n / 2 || i % 6 == 0 { 1.0 } else { 0.0 })
            .collect::<Vec<_>>(),
    ));
    RecordBatch::try_new(schema, vec![radius, texture, diagnosis]).unwrap()
}

fn env(results: &Path, n_splits: usize) -> Environment {
    Environment::builder(train(), "diagnosis")
        .results_path(results)
        .metrics_map(MetricsMap::from_names(&["roc_auc_score"]))
        .cross_validation_type(CvType::StratifiedKFold)
        .cross_validation_params(CvParams::new(n_splits).shuffle(true).random_state(32))
        .do_predict_proba(true)
        .verbose(false)
        .build()
        .unwrap()
}

fn config(iterations: usize) -> OptimizerConfig {
    OptimizerConfig {
        iterations,
        n_initial_points: 2,
        verbose: false,
        ..OptimizerConfig::default()
    }
}

fn run_round(
    env: &Environment,
    kind: OptimizerKind,
    iterations: usize,
    learning_rate: (f64, f64),
    l2: f64,
) -> OptimizationProtocol {
    let mut protocol = OptimizationProtocol::new(kind, config(iterations));
    protocol
        .set_experiment_guidelines(
            LogisticRegression,
            [
                (
                    "learning_rate",
                    Guideline::from(Dimension::real(learning_rate.0, learning_rate.1).unwrap()),
                ),
                ("max_iter", Dimension::integer(20, 80).unwrap().into()),
                ("l2", Guideline::fixed(l2)),
            ],
        )
        .unwrap();
    protocol.go(env).unwrap();
    protocol
}

#[test]
fn test_second_round_finds_first_round_experiments() {
    let dir = tempdir().unwrap();
    let env = env(dir.path(), 3);

    let first = run_round(&env, OptimizerKind::Random, 3, (0.05, 0.3), 0.0);
    assert!(first.similar_experiments().is_empty());
    assert_eq!(first.observations().len(), 3);
    assert!(first.observations().iter().all(|o| !o.recorded));

    let second = run_round(&env, OptimizerKind::default(), 2, (0.01, 0.5), 0.0);
    let similar = second.similar_experiments();
    assert_eq!(similar.len(), 3);
    assert!(similar.windows(2).all(|w| w[0].value >= w[1].value));

    let store = env.result_store().unwrap();
    for s in similar {
        let id = &s.experiment_id;
        assert!(store.description_path(id).is_file(), "description for {id}");
        assert!(store.heartbeat_path(id).is_file(), "heartbeat for {id}");
        assert!(
            store.predictions_path(ResultFile::PredictionsOof, id).unwrap().is_file(),
            "oof predictions for {id}"
        );
    }

    assert_eq!(second.observations().len(), 3 + 2);
    let best = second.best_score().unwrap();
    assert!(second.observations().iter().all(|o| o.value <= best));
}

#[test]
fn test_disjoint_guidelines_find_nothing() {
    let dir = tempdir().unwrap();
    let env = env(dir.path(), 3);
    run_round(&env, OptimizerKind::Random, 2, (0.05, 0.3), 0.0);

    // Different fixed value
    let other_l2 = run_round(&env, OptimizerKind::Random, 1, (0.05, 0.3), 0.1);
    assert!(other_l2.similar_experiments().is_empty());

    // Non-overlapping range
    let other_range = run_round(&env, OptimizerKind::Random, 1, (0.6, 0.9), 0.0);
    assert!(other_range.similar_experiments().is_empty());
}

#[test]
fn test_different_environment_finds_nothing() {
    let dir = tempdir().unwrap();
    run_round(&env(dir.path(), 3), OptimizerKind::Random, 2, (0.05, 0.3), 0.0);

    let other = run_round(&env(dir.path(), 4), OptimizerKind::Random, 1, (0.05, 0.3), 0.0);
    assert!(other.similar_experiments().is_empty());
}

#[test]
fn test_leaderboard_ranks_every_experiment() {
    let dir = tempdir().unwrap();
    let env = env(dir.path(), 3);
    let protocol = run_round(&env, OptimizerKind::Random, 3, (0.05, 0.3), 0.0);

    let store = env.result_store().unwrap();
    let board = Leaderboard::load(&store.leaderboard_path()).unwrap();
    let ranked = board.rank(EvaluationSet::Oof, "roc_auc_score", 10, true).unwrap();
    assert_eq!(ranked.len(), 3);
    assert!((ranked[0].value - protocol.best_score().unwrap()).abs() < 1e-12);
}

#[test]
fn test_blacklisted_results_are_not_written() {
    let dir = tempdir().unwrap();
    let env = Environment::builder(train(), "diagnosis")
        .results_path(dir.path())
        .file_blacklist(FileBlacklist::from_names(&["heartbeat", "predictions_oof"]).unwrap())
        .verbose(false)
        .build()
        .unwrap();
    let protocol = run_round(&env, OptimizerKind::Random, 1, (0.05, 0.3), 0.0);

    let store = env.result_store().unwrap();
    let id = &protocol.observations()[0].experiment_id;
    assert!(store.description_path(id).is_file());
    assert!(!store.heartbeat_path(id).exists());
    assert!(!store.predictions_path(ResultFile::PredictionsOof, id).unwrap().exists());
}
