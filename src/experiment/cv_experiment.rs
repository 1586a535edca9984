//! Cross-validation experiment executor
//!
//! ```text
//! for repetition r, fold f:
//!     for run k:  model = initializer.build(hyperparameters, seed(k))
//!                 fit(train rows) -> predict(train rows, validation rows, holdout, test)
//!     in-fold metrics on the fold's training rows        (MetricRecord, step = r * n_splits + f)
//!     OOF[validation rows] += mean over runs
//! OOF       = mean over repetitions
//! holdout   = mean over every (r, f, k)
//! ```

use super::{
    hyperparameter_key, ArtifactRecord, Evaluations, ExperimentDescription, MetricRecord,
    RunRecord, RunStatus,
};
use crate::cv;
use crate::data::Dataset;
use crate::environment::{Environment, ResultFile};
use crate::leaderboard::append_to_leaderboard;
use crate::metrics::EvaluationSet;
use crate::model::{Hyperparameters, ModelInitializer};
use crate::reporting::{format_evaluation_results, format_fold_run, FoldRunMode, Reporter};
use crate::storage::{PredictionsFile, ResultStore};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::time::Instant;
use uuid::Uuid;

/// One experiment: an algorithm plus hyperparameters evaluated under an [`Environment`].
pub struct CvExperiment<'a> {
    env: &'a Environment,
    initializer: &'a dyn ModelInitializer,
    hyperparameters: Hyperparameters,
    experiment_id: String,
    hyperparameter_key: String,
    notes: Option<String>,
}

impl std::fmt::Debug for CvExperiment<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CvExperiment")
            .field("experiment_id", &self.experiment_id)
            .field("algorithm_name", &self.initializer.name())
            .field("hyperparameters", &self.hyperparameters)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct Outcome {
    evaluations: Evaluations,
    runs: Vec<RunRecord>,
    fold_metrics: Vec<MetricRecord>,
    oof: Vec<f64>,
    in_fold: Vec<f64>,
    holdout: Option<Vec<f64>>,
    test: Option<Vec<f64>>,
    train_target: Vec<f64>,
    holdout_target: Option<Vec<f64>>,
}

impl<'a> CvExperiment<'a> {
    /// Prepare an experiment with a fresh UUID v4 id.
    #[must_use]
    pub fn new(
        env: &'a Environment,
        initializer: &'a dyn ModelInitializer,
        hyperparameters: Hyperparameters,
    ) -> Self {
        let hyperparameter_key = hyperparameter_key(initializer.name(), &hyperparameters);
        Self {
            env,
            initializer,
            hyperparameters,
            experiment_id: Uuid::new_v4().to_string(),
            hyperparameter_key,
            notes: None,
        }
    }

    /// Attach free-form notes to the description.
    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Experiment id.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Hyperparameter key.
    #[must_use]
    pub fn hyperparameter_key(&self) -> &str {
        &self.hyperparameter_key
    }

    /// Train and evaluate over every split, then persist what the blacklist allows.
    ///
    /// # Errors
    ///
    /// Returns the first model, metric, or storage error. A failed run aborts the
    /// experiment and nothing is persisted.
    pub fn execute(self) -> Result<ExperimentDescription> {
        let started = Instant::now();
        let env = self.env;
        let store = env.result_store();
        if let Some(store) = &store {
            store.ensure_layout()?;
        }

        let reporter = match &store {
            Some(store) if env.writes(ResultFile::CurrentHeartbeat) => Reporter::with_heartbeat(
                env.reporting_params(),
                env.verbose(),
                &store.current_heartbeat_path(),
            )?,
            _ => Reporter::console(env.reporting_params(), env.verbose()),
        };
        reporter.log(&format!("Initialized Experiment: '{}'", self.experiment_id), true);
        reporter.log(&format!("Hyperparameter Key: '{}'", self.hyperparameter_key), false);
        reporter.debug(
            &format!("Cross-Experiment Key: '{}'", env.cross_experiment_key()),
            false,
        );

        let outcome = self.run_folds(&reporter)?;
        let elapsed = started.elapsed().as_secs_f64();
        reporter.log(
            &format!(
                "{}  |  Time Elapsed: {elapsed:.3}s",
                format_evaluation_results(
                    outcome.evaluations.iter(),
                    "  |  ",
                    env.reporting_params().precision()
                )
            ),
            false,
        );

        let files = self.prediction_files(&outcome);
        let artifacts = files
            .iter()
            .map(PredictionsFile::artifact)
            .collect::<Result<Vec<ArtifactRecord>>>()?;
        let mut builder = ExperimentDescription::builder(
            &self.experiment_id,
            env.cross_experiment_key(),
            &self.hyperparameter_key,
            self.initializer.name(),
        )
        .hyperparameters(self.hyperparameters.clone())
        .evaluations(outcome.evaluations)
        .runs(outcome.runs)
        .fold_metrics(outcome.fold_metrics)
        .artifacts(artifacts)
        .elapsed_seconds(elapsed);
        if let Some(notes) = &self.notes {
            builder = builder.notes(notes.as_str());
        }
        let description = builder.build();

        if let Some(store) = &store {
            self.persist(store, &description, &files, &reporter)?;
        }

        let had_heartbeat = reporter.heartbeat_path().is_some();
        drop(reporter);
        if let Some(store) = &store {
            if had_heartbeat && env.writes(ResultFile::Heartbeat) {
                store.save_heartbeat(&self.experiment_id)?;
            }
        }
        Ok(description)
    }

    #[allow(clippy::too_many_lines, clippy::cast_precision_loss)]
    fn run_folds(&self, reporter: &Reporter) -> Result<Outcome> {
        let env = self.env;
        let target_column = env.target_column();
        let train = Dataset::from_batch(env.train_dataset(), target_column)?;
        let holdout = env
            .holdout_dataset()
            .map(|batch| Dataset::from_batch_aligned(batch, target_column, train.feature_names()))
            .transpose()?;
        let test = env
            .test_dataset()
            .map(|batch| Dataset::features_aligned(batch, train.feature_names()))
            .transpose()?;

        let repetitions = cv::split(
            env.cross_validation_type(),
            env.cross_validation_params(),
            train.target(),
        )?;
        let n_splits = env.cross_validation_params().n_splits_value();
        let n_runs = env.runs();
        let metrics = env.metrics_map();
        let selection = env.metrics_params();
        let precision = env.reporting_params().precision();

        let mut outcome = Outcome {
            train_target: train.target().to_vec(),
            holdout_target: holdout.as_ref().map(|h| h.target().to_vec()),
            ..Outcome::default()
        };
        let mut oof_sum = vec![0.0; train.n_rows()];
        let mut in_fold_sum = vec![0.0; train.n_rows()];
        let mut in_fold_count = vec![0_usize; train.n_rows()];
        let mut holdout_sum = holdout.as_ref().map(|h| vec![0.0; h.n_rows()]);
        let mut test_sum = test.as_ref().map(|t| vec![0.0; t.n_rows()]);
        let mut in_fold_totals: Option<BTreeMap<String, f64>> = None;
        let mut folds_evaluated = 0_usize;
        let mut fits = 0_usize;

        for (rep, folds) in repetitions.iter().enumerate() {
            for (fold_index, fold) in folds.iter().enumerate() {
                let fold_train = train.take(&fold.train);
                let fold_valid = train.take(&fold.validation);
                let mut inputs = vec![fold_train.features(), fold_valid.features()];
                inputs.extend(holdout.as_ref().map(Dataset::features));
                inputs.extend(test.as_ref().map(Dataset::features));

                let mut train_pred = vec![0.0; fold.train.len()];
                let mut valid_pred = vec![0.0; fold.validation.len()];
                for run in 0..n_runs {
                    let seed = env.run_seed(run);
                    let mut record = RunRecord::builder(
                        format!("{}/r{rep}/f{fold_index}/k{run}", self.experiment_id),
                        &self.experiment_id,
                    )
                    .position(rep, fold_index, run)
                    .seed(seed)
                    .build();
                    record.start();
                    let predictions = match self.fit_predict(seed, &fold_train, &inputs) {
                        Ok(predictions) => predictions,
                        Err(e) => {
                            record.complete(RunStatus::Failed);
                            reporter.warn(&format!(
                                "{} failed: {e}",
                                format_fold_run(Some(fold_index), Some(run), FoldRunMode::Concise)
                            ));
                            return Err(e);
                        }
                    };
                    record.complete(RunStatus::Success);
                    outcome.runs.push(record);

                    let mut outputs = predictions.into_iter();
                    accumulate(&mut train_pred, outputs.next())?;
                    accumulate(&mut valid_pred, outputs.next())?;
                    if let Some(sum) = holdout_sum.as_mut() {
                        accumulate(sum, outputs.next())?;
                    }
                    if let Some(sum) = test_sum.as_mut() {
                        accumulate(sum, outputs.next())?;
                    }
                    fits += 1;
                    reporter.debug(
                        &format!(
                            "{} fitted (seed={seed})",
                            format_fold_run(Some(fold_index), Some(run), FoldRunMode::Concise)
                        ),
                        false,
                    );
                }

                scale(&mut train_pred, n_runs as f64);
                scale(&mut valid_pred, n_runs as f64);
                for (&row, &p) in fold.validation.iter().zip(&valid_pred) {
                    oof_sum[row] += p;
                }
                for (&row, &p) in fold.train.iter().zip(&train_pred) {
                    in_fold_sum[row] += p;
                    in_fold_count[row] += 1;
                }

                let step = (rep * n_splits + fold_index) as u64;
                if let Some(values) =
                    selection.evaluate(metrics, EvaluationSet::InFold, fold_train.target(), &train_pred)?
                {
                    let totals = in_fold_totals.get_or_insert_with(BTreeMap::new);
                    for (id, value) in &values {
                        *totals.entry(id.clone()).or_insert(0.0) += value;
                        outcome.fold_metrics.push(MetricRecord::new(
                            &self.experiment_id,
                            EvaluationSet::InFold,
                            id,
                            step,
                            *value,
                        ));
                    }
                    folds_evaluated += 1;
                    let label = format_fold_run(Some(fold_index), None, FoldRunMode::Verbose);
                    let label = if repetitions.len() > 1 {
                        format!("Rep: {rep}  {label}")
                    } else {
                        label
                    };
                    reporter.log(
                        &format!(
                            "{label}  |  {}",
                            format_evaluation_results([(EvaluationSet::InFold, &values)], "  |  ", precision)
                        ),
                        false,
                    );
                }
            }
        }

        scale(&mut oof_sum, repetitions.len() as f64);
        outcome.oof = oof_sum;
        outcome.in_fold = in_fold_sum
            .iter()
            .zip(&in_fold_count)
            .map(|(sum, &count)| if count == 0 { 0.0 } else { sum / count as f64 })
            .collect();
        if let Some(sum) = holdout_sum.as_mut() {
            scale(sum, fits as f64);
        }
        if let Some(sum) = test_sum.as_mut() {
            scale(sum, fits as f64);
        }
        outcome.holdout = holdout_sum;
        outcome.test = test_sum;

        let in_fold = in_fold_totals.map(|totals| {
            totals
                .into_iter()
                .map(|(id, total)| (id, total / folds_evaluated as f64))
                .collect()
        });
        outcome.evaluations.set(EvaluationSet::InFold, in_fold);
        outcome.evaluations.set(
            EvaluationSet::Oof,
            selection.evaluate(metrics, EvaluationSet::Oof, train.target(), &outcome.oof)?,
        );
        if let (Some(h), Some(predictions)) = (&holdout, &outcome.holdout) {
            outcome.evaluations.set(
                EvaluationSet::Holdout,
                selection.evaluate(metrics, EvaluationSet::Holdout, h.target(), predictions)?,
            );
        }
        Ok(outcome)
    }

    fn fit_predict(
        &self,
        seed: u64,
        fold_train: &Dataset,
        inputs: &[&[Vec<f64>]],
    ) -> Result<Vec<Vec<f64>>> {
        let mut model = self.initializer.build(&self.hyperparameters, seed)?;
        model.fit(fold_train.features(), fold_train.target())?;
        inputs
            .iter()
            .map(|features| {
                if self.env.do_predict_proba() {
                    model.predict_proba(features)
                } else {
                    model.predict(features)
                }
            })
            .collect()
    }

    fn prediction_files(&self, outcome: &Outcome) -> Vec<PredictionsFile> {
        [
            (
                ResultFile::PredictionsOof,
                Some(&outcome.oof),
                Some(&outcome.train_target),
            ),
            (
                ResultFile::PredictionsHoldout,
                outcome.holdout.as_ref(),
                outcome.holdout_target.as_ref(),
            ),
            (ResultFile::PredictionsTest, outcome.test.as_ref(), None),
            (
                ResultFile::PredictionsInFold,
                Some(&outcome.in_fold),
                Some(&outcome.train_target),
            ),
        ]
        .into_iter()
        .filter(|(kind, _, _)| self.env.writes(*kind))
        .filter_map(|(kind, predictions, target)| {
            predictions.map(|predictions| PredictionsFile {
                experiment_id: self.experiment_id.clone(),
                dataset: kind,
                predictions: predictions.clone(),
                target: target.cloned(),
            })
        })
        .collect()
    }

    fn persist(
        &self,
        store: &ResultStore,
        description: &ExperimentDescription,
        files: &[PredictionsFile],
        reporter: &Reporter,
    ) -> Result<()> {
        let env = self.env;
        if env.writes(ResultFile::Description) {
            let path = store.write_description(description)?;
            reporter.debug(&format!("Saved description: {}", path.display()), false);
        }
        for file in files {
            store.write_predictions(file)?;
        }
        if env.writes(ResultFile::TestedKeys) {
            store.add_tested_key(
                env.cross_experiment_key(),
                &self.hyperparameter_key,
                &self.experiment_id,
            )?;
        }
        if env.writes(ResultFile::Leaderboard) {
            append_to_leaderboard(&store.leaderboard_path(), description)?;
        }
        Ok(())
    }
}

fn accumulate(sum: &mut [f64], prediction: Option<Vec<f64>>) -> Result<()> {
    let prediction =
        prediction.ok_or_else(|| Error::Model("model returned too few prediction sets".to_string()))?;
    if prediction.len() != sum.len() {
        return Err(Error::Model(format!(
            "model returned {} predictions for {} rows",
            prediction.len(),
            sum.len()
        )));
    }
    for (s, p) in sum.iter_mut().zip(prediction) {
        *s += p;
    }
    Ok(())
}

fn scale(values: &mut [f64], divisor: f64) {
    if divisor > 0.0 {
        for v in values {
            *v /= divisor;
        }
    }
}
