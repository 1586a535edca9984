//! Optimization protocols
//!
//! A protocol owns an algorithm and its guidelines. `go` looks up compatible experiments
//! recorded under the Environment, seeds its observations with them, then proposes and
//! evaluates new points for a fixed number of rounds.

use super::gp::{Acquisition, GaussianProcess};
use super::similarity::{find_similar_experiments, SimilarExperiment, TargetMetric};
use super::space::{Guideline, SearchSpace};
use crate::environment::Environment;
use crate::experiment::{hyperparameter_key, CvExperiment, ExperimentStore};
use crate::model::{Hyperparameters, ModelInitializer};
use crate::reporting::{now_time, BlockFormat, HeaderKind, OptimizationReporter};
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

const N_CANDIDATES: usize = 256;

/// Optimizer family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptimizerKind {
    /// GP surrogate with an acquisition function
    Bayesian {
        /// Candidate scoring
        acquisition: Acquisition,
    },
    /// Uniform sampling
    Random,
}

impl Default for OptimizerKind {
    fn default() -> Self {
        Self::Bayesian {
            acquisition: Acquisition::default(),
        }
    }
}

impl OptimizerKind {
    /// Name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bayesian { .. } => "BayesianOptimization",
            Self::Random => "RandomSearch",
        }
    }
}

/// Protocol settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    /// Value to optimize; defaults to OOF on the Environment's first metric
    pub target_metric: Option<TargetMetric>,
    /// Number of proposed points
    pub iterations: usize,
    /// Seed of the proposal RNG; `None` draws one from the OS
    pub random_state: Option<u64>,
    /// Observations required before the surrogate is used
    pub n_initial_points: usize,
    /// Print the result table
    pub verbose: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            target_metric: None,
            iterations: 10,
            random_state: Some(32),
            n_initial_points: 5,
            verbose: true,
        }
    }
}

/// One evaluated point.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Experiment the value came from
    pub experiment_id: String,
    /// Full hyperparameter set
    pub hyperparameters: Hyperparameters,
    /// Raw target value
    pub value: f64,
    /// Whether the value was read from a recorded experiment instead of a new run
    pub recorded: bool,
}

/// Search over one algorithm's guidelines under an [`Environment`].
pub struct OptimizationProtocol {
    kind: OptimizerKind,
    config: OptimizerConfig,
    initializer: Option<Box<dyn ModelInitializer>>,
    space: Option<SearchSpace>,
    target_metric: Option<TargetMetric>,
    greater_is_better: bool,
    similar_experiments: Vec<SimilarExperiment>,
    observations: Vec<Observation>,
}

impl std::fmt::Debug for OptimizationProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizationProtocol")
            .field("kind", &self.kind)
            .field("config", &self.config)
            .field("algorithm", &self.initializer.as_ref().map(|i| i.name().to_string()))
            .field("space", &self.space)
            .field("observations", &self.observations.len())
            .finish_non_exhaustive()
    }
}

impl OptimizationProtocol {
    /// New protocol; call [`set_experiment_guidelines`](Self::set_experiment_guidelines) before
    /// [`go`](Self::go).
    #[must_use]
    pub const fn new(kind: OptimizerKind, config: OptimizerConfig) -> Self {
        Self {
            kind,
            config,
            initializer: None,
            space: None,
            target_metric: None,
            greater_is_better: true,
            similar_experiments: Vec::new(),
            observations: Vec::new(),
        }
    }

    /// Set the algorithm and its per-hyperparameter guidelines.
    ///
    /// # Errors
    ///
    /// Returns an optimization error if no guideline is a search dimension.
    pub fn set_experiment_guidelines<M, K, G, I>(&mut self, initializer: M, guidelines: I) -> Result<()>
    where
        M: ModelInitializer + 'static,
        K: Into<String>,
        G: Into<Guideline>,
        I: IntoIterator<Item = (K, G)>,
    {
        self.space = Some(SearchSpace::new(guidelines)?);
        self.initializer = Some(Box::new(initializer));
        Ok(())
    }

    /// Run the search.
    ///
    /// # Errors
    ///
    /// Returns an optimization error when guidelines are unset, the target metric is unknown,
    /// or `iterations` is zero. Experiment and storage errors propagate.
    pub fn go(&mut self, env: &Environment) -> Result<()> {
        let (Some(initializer), Some(space)) = (self.initializer.as_deref(), self.space.as_ref()) else {
            return Err(Error::Optimization(
                "set_experiment_guidelines must be called before go".to_string(),
            ));
        };
        if self.config.iterations == 0 {
            return Err(Error::Optimization("iterations must be at least 1".to_string()));
        }

        let target = resolve_target(self.config.target_metric.as_ref(), env)?;
        let greater_is_better = env
            .metrics_map()
            .get(&target.metric)
            .map_or(true, |spec| spec.greater_is_better());
        let cross_key = env.cross_experiment_key();

        let mut store = match env.result_store() {
            Some(results) => ExperimentStore::load(&results, cross_key)?,
            None => ExperimentStore::new(),
        };
        let similar = find_similar_experiments(
            &store,
            cross_key,
            initializer.name(),
            space,
            &target,
            greater_is_better,
        );

        tracing::info!(
            optimizer = self.kind.name(),
            algorithm = initializer.name(),
            %target,
            iterations = self.config.iterations,
            similar = similar.len(),
            "Starting optimization"
        );

        let names: Vec<&str> = space.dimension_names().collect();
        let mut reporter =
            OptimizationReporter::new(&names, self.config.verbose).greater_is_better(greater_is_better);
        let mut observations: Vec<Observation> = Vec::new();

        if !similar.is_empty() {
            reporter.print_header(HeaderKind::SavedResults);
            for s in &similar {
                reporter.print_result(&s.experiment_id, &space.point(&s.hyperparameters), s.value);
                observations.push(Observation {
                    experiment_id: s.experiment_id.clone(),
                    hyperparameters: s.hyperparameters.clone(),
                    value: s.value,
                    recorded: true,
                });
            }
        }

        let mut rng = match self.config.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let orient = |value: f64| if greater_is_better { value } else { -value };
        let mut header: Option<HeaderKind> = None;

        for iteration in 0..self.config.iterations {
            let (phase, hyperparameters) = match self.kind {
                OptimizerKind::Bayesian { acquisition } if observations.len() >= self.config.n_initial_points => {
                    let scored: Vec<(Vec<f64>, f64)> = observations
                        .iter()
                        .map(|o| (space.encode(&o.hyperparameters), orient(o.value)))
                        .collect();
                    match propose(space, &scored, acquisition, &mut rng) {
                        Ok(point) => (HeaderKind::Optimization, point),
                        Err(e) => {
                            tracing::warn!(error = %e, iteration, "Surrogate failed; sampling randomly");
                            (HeaderKind::Optimization, space.sample(&mut rng))
                        }
                    }
                }
                _ => (HeaderKind::RandomPoints, space.sample(&mut rng)),
            };
            if header != Some(phase) {
                reporter.print_header(phase);
                header = Some(phase);
            }

            let key = hyperparameter_key(initializer.name(), &hyperparameters);
            let recorded = store
                .experiments_for_hyperparameter_key(&key)
                .into_iter()
                .filter(|e| e.cross_experiment_key() == cross_key)
                .find_map(|e| {
                    e.evaluations()
                        .value(target.dataset, &target.metric)
                        .map(|v| (e.experiment_id().to_string(), v))
                });

            let observation = if let Some((experiment_id, value)) = recorded {
                tracing::info!(
                    experiment_id = %experiment_id,
                    hyperparameter_key = %key,
                    "Hyperparameters already tested; reusing recorded result"
                );
                Observation {
                    experiment_id,
                    hyperparameters,
                    value,
                    recorded: true,
                }
            } else {
                let description =
                    CvExperiment::new(env, initializer, hyperparameters.clone()).execute()?;
                let value = description
                    .evaluations()
                    .value(target.dataset, &target.metric)
                    .ok_or_else(|| {
                        Error::Optimization(format!(
                            "Target metric {target} missing from experiment {}",
                            description.experiment_id()
                        ))
                    })?;
                let experiment_id = description.experiment_id().to_string();
                store.add_experiment(description);
                Observation {
                    experiment_id,
                    hyperparameters,
                    value,
                    recorded: false,
                }
            };

            reporter.print_result(
                &observation.experiment_id,
                &space.point(&observation.hyperparameters),
                observation.value,
            );
            observations.push(observation);
        }

        self.target_metric = Some(target);
        self.greater_is_better = greater_is_better;
        self.similar_experiments = similar;
        self.observations = observations;
        if let Some(best) = self.best_experiment() {
            tracing::info!(
                experiment_id = %best.experiment_id,
                value = best.value,
                "Optimization complete"
            );
            if self.config.verbose {
                let banner = BlockFormat {
                    pre_embed: now_time(),
                    ..BlockFormat::default()
                };
                let label = self
                    .target_metric
                    .as_ref()
                    .map_or_else(String::new, |t| format!("Best {t}: "));
                println!("{}", banner.render(&[label.into(), best.value.into()]));
            }
        }
        Ok(())
    }

    /// Optimizer family.
    #[must_use]
    pub const fn kind(&self) -> OptimizerKind {
        self.kind
    }

    /// Search space, once guidelines are set.
    #[must_use]
    pub const fn search_space(&self) -> Option<&SearchSpace> {
        self.space.as_ref()
    }

    /// Target resolved by the last `go`.
    #[must_use]
    pub const fn target_metric(&self) -> Option<&TargetMetric> {
        self.target_metric.as_ref()
    }

    /// Compatible recorded experiments found by the last `go`, best first.
    #[must_use]
    pub fn similar_experiments(&self) -> &[SimilarExperiment] {
        &self.similar_experiments
    }

    /// Every observation of the last `go`, recorded ones first.
    #[must_use]
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Best observation in the metric's direction.
    #[must_use]
    pub fn best_experiment(&self) -> Option<&Observation> {
        let gib = self.greater_is_better;
        self.observations.iter().reduce(|best, o| {
            let better = if gib { o.value > best.value } else { o.value < best.value };
            if better {
                o
            } else {
                best
            }
        })
    }

    /// Value of [`best_experiment`](Self::best_experiment).
    #[must_use]
    pub fn best_score(&self) -> Option<f64> {
        self.best_experiment().map(|o| o.value)
    }
}

fn resolve_target(configured: Option<&TargetMetric>, env: &Environment) -> Result<TargetMetric> {
    let target = match configured {
        Some(target) => target.clone(),
        None => {
            let first = env.metrics_map().ids().next().ok_or_else(|| {
                Error::Optimization("Environment has no metrics to optimize".to_string())
            })?;
            TargetMetric::oof(first)
        }
    };
    if env.metrics_map().get(&target.metric).is_none() {
        return Err(Error::Optimization(format!(
            "Target metric '{}' is not in the Environment's metrics map",
            target.metric
        )));
    }
    Ok(target)
}

/// Best of `N_CANDIDATES` random points under the acquisition function.
fn propose(
    space: &SearchSpace,
    scored: &[(Vec<f64>, f64)],
    acquisition: Acquisition,
    rng: &mut StdRng,
) -> Result<Hyperparameters> {
    let (points, scores): (Vec<Vec<f64>>, Vec<f64>) = scored.iter().cloned().unzip();
    let gp = GaussianProcess::fit(&points, &scores)?;
    let incumbent = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut best: Option<(f64, Hyperparameters)> = None;
    for _ in 0..N_CANDIDATES {
        let candidate = space.sample(rng);
        let (mean, std) = gp.predict(&space.encode(&candidate));
        let score = acquisition.score(mean, std, incumbent);
        if best.as_ref().map_or(true, |(s, _)| score > *s) {
            best = Some((score, candidate));
        }
    }
    best.map(|(_, point)| point)
        .ok_or_else(|| Error::Optimization("No candidate points were sampled".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LogisticRegression;
    use crate::optimization::Dimension;
    use arrow::array::Float64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn train() -> RecordBatch {
        let x: Vec<f64> = (0..40).map(|i| f64::from(i) / 10.0).collect();
        let noise: Vec<f64> = (0..40).map(|i| f64::from(i % 7) / 7.0).collect();
        let y: Vec<f64> = (0..40).map(|i| if i % 5 < 2 || i >= 30 { 1.0 } else { 0.0 }).collect();
        RecordBatch::try_new(
            Arc::new(Schema::new(vec![
                Field::new("x", DataType::Float64, false),
                Field::new("noise", DataType::Float64, false),
                Field::new("target", DataType::Float64, false),
            ])),
            vec![
                Arc::new(Float64Array::from(x)),
                Arc::new(Float64Array::from(noise)),
                Arc::new(Float64Array::from(y)),
            ],
        )
        .unwrap()
    }

    fn env() -> Environment {
        Environment::builder(train(), "target")
            .verbose(false)
            .build()
            .unwrap()
    }

    fn protocol(kind: OptimizerKind, iterations: usize) -> OptimizationProtocol {
        let mut protocol = OptimizationProtocol::new(
            kind,
            OptimizerConfig {
                iterations,
                n_initial_points: 2,
                verbose: false,
                ..OptimizerConfig::default()
            },
        );
        protocol
            .set_experiment_guidelines(
                LogisticRegression,
                [
                    ("learning_rate", Guideline::from(Dimension::real(0.01, 0.5).unwrap())),
                    ("max_iter", Dimension::integer(10, 50).unwrap().into()),
                ],
            )
            .unwrap();
        protocol
    }

    #[test]
    fn test_go_requires_guidelines() {
        let mut protocol = OptimizationProtocol::new(OptimizerKind::Random, OptimizerConfig::default());
        assert!(matches!(protocol.go(&env()), Err(Error::Optimization(_))));
    }

    #[test]
    fn test_unknown_target_metric() {
        let mut protocol = protocol(OptimizerKind::Random, 1);
        protocol.config.target_metric = Some(TargetMetric::oof("f1"));
        assert!(matches!(protocol.go(&env()), Err(Error::Optimization(_))));
    }

    #[test]
    fn test_random_search_records_every_iteration() {
        let env = env();
        let mut protocol = protocol(OptimizerKind::Random, 3);
        protocol.go(&env).unwrap();

        assert_eq!(protocol.observations().len(), 3);
        assert!(protocol.similar_experiments().is_empty());
        assert_eq!(protocol.target_metric(), Some(&TargetMetric::oof("roc_auc_score")));
        let best = protocol.best_score().unwrap();
        assert!(protocol.observations().iter().all(|o| o.value <= best));
    }

    #[test]
    fn test_bayesian_rounds_stay_in_space() {
        let env = env();
        let mut protocol = protocol(OptimizerKind::default(), 4);
        protocol.go(&env).unwrap();

        let space = protocol.search_space().unwrap();
        assert_eq!(protocol.observations().len(), 4);
        assert!(protocol
            .observations()
            .iter()
            .all(|o| space.contains(&o.hyperparameters)));
    }

    #[test]
    fn test_propose_is_deterministic() {
        let space = SearchSpace::new([("x", Dimension::real(0.0, 1.0).unwrap())]).unwrap();
        let scored = vec![(vec![0.1], 0.2), (vec![0.5], 0.9), (vec![0.9], 0.1)];
        let acquisition = Acquisition::default();
        let a = propose(&space, &scored, acquisition, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = propose(&space, &scored, acquisition, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
    }
}
