//! Hyperparameter Optimization
//!
//! An [`OptimizationProtocol`] searches one algorithm's [`SearchSpace`] under an
//! [`Environment`](crate::environment::Environment):
//!
//! 1. Resolve the target metric (OOF on the first metric by default).
//! 2. Find recorded experiments with the same cross-experiment key, the same algorithm and
//!    hyperparameters inside the guidelines, and seed the observations with them.
//! 3. Propose points: random until `n_initial_points` observations exist, then the candidate
//!    maximizing the acquisition function over a Gaussian-process surrogate.
//! 4. Reuse recorded results for already-tested hyperparameter keys; run a
//!    [`CvExperiment`](crate::experiment::CvExperiment) otherwise.
//!
//! ```rust,no_run
//! use hyperhunt::environment::Environment;
//! use hyperhunt::model::LogisticRegression;
//! use hyperhunt::optimization::{Dimension, Guideline, OptimizationProtocol, OptimizerConfig, OptimizerKind};
//! # fn demo(env: &Environment) -> hyperhunt::Result<()> {
//! let mut protocol = OptimizationProtocol::new(OptimizerKind::default(), OptimizerConfig::default());
//! protocol.set_experiment_guidelines(
//!     LogisticRegression,
//!     [
//!         ("learning_rate", Guideline::from(Dimension::real(0.01, 0.5)?)),
//!         ("max_iter", Dimension::integer(50, 300)?.into()),
//!         ("l2", Guideline::fixed(0.0)),
//!     ],
//! )?;
//! protocol.go(env)?;
//! println!("best: {:?}", protocol.best_score());
//! # Ok(())
//! # }
//! ```

mod gp;
mod protocol;
mod similarity;
mod space;

pub use gp::{Acquisition, GaussianProcess};
pub use protocol::{Observation, OptimizationProtocol, OptimizerConfig, OptimizerKind};
pub use similarity::{find_similar_experiments, SimilarExperiment, TargetMetric};
pub use space::{Dimension, Guideline, SearchSpace};
