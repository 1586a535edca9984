//! # Hyperhunt: Experiment Tracking and Hyperparameter Optimization
//!
//! **Version**: 0.1.0
//!
//! Hyperhunt runs cross-validated experiments on tabular Arrow data, records every result
//! under a fingerprint of the configuration that produced it, and uses those records to
//! warm-start later hyperparameter searches.
//!
//! ## Design Principles
//!
//! - **Fingerprinted configuration**: an [`Environment`](environment::Environment) hashes to a
//!   cross-experiment key; algorithm plus hyperparameters hash to a hyperparameter key
//! - **Results are reused**: an optimization round starts from every compatible recorded
//!   experiment and never re-runs an already-tested key
//! - **Explicit context**: the Environment is passed by reference, never held globally
//! - **Fail fast**: configuration is validated when the Environment is built
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use hyperhunt::environment::Environment;
//! use hyperhunt::model::LogisticRegression;
//! use hyperhunt::optimization::{Dimension, Guideline, OptimizationProtocol, OptimizerConfig, OptimizerKind};
//! use hyperhunt::storage::load_parquet_batch;
//!
//! let train = load_parquet_batch("data/train.parquet")?;
//! let env = Environment::builder(train, "target")
//!     .results_path("results")
//!     .build()?;
//!
//! let mut protocol = OptimizationProtocol::new(OptimizerKind::default(), OptimizerConfig::default());
//! protocol.set_experiment_guidelines(
//!     LogisticRegression,
//!     [("learning_rate", Guideline::from(Dimension::real(0.01, 0.5)?))],
//! )?;
//! protocol.go(&env)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod cv;
pub mod data;
pub mod environment;
pub mod error;
pub mod experiment;
pub mod file_utils;
pub mod fingerprint;
pub mod leaderboard;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod optimization;
pub mod reporting;
pub mod storage;
pub mod topk;

pub use error::{Error, Result};
