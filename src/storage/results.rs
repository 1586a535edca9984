//! Results directory layout and per-experiment persistence

use crate::environment::ResultFile;
use crate::error::from_io;
use crate::experiment::{ArtifactRecord, ExperimentDescription};
use crate::file_utils::{add_to_json, make_dirs, read_json, write_json, AddToJson};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the directory created under `results_path`.
pub const ASSETS_DIR: &str = "HyperhuntAssets";

const LEADERBOARD_FILE: &str = "GlobalLeaderboard.parquet";
const CURRENT_HEARTBEAT: &str = "current_heartbeat.log";

/// `hyperparameter_key -> [experiment_id, ...]` for one cross-experiment key.
pub type TestedKeys = BTreeMap<String, Vec<String>>;

/// Contents of a `Predictions*/<id>.json` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionsFile {
    /// Experiment that produced the predictions
    pub experiment_id: String,
    /// `predictions_oof`, `predictions_holdout`, ...
    pub dataset: ResultFile,
    /// One prediction per row
    pub predictions: Vec<f64>,
    /// True target per row, when the dataset has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Vec<f64>>,
}

impl PredictionsFile {
    /// Serialized file contents.
    ///
    /// # Errors
    ///
    /// Returns `Json` if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Content-addressed record of the bytes [`ResultStore::write_predictions`] writes.
    ///
    /// # Errors
    ///
    /// Returns `Json` if serialization fails.
    pub fn artifact(&self) -> Result<ArtifactRecord> {
        Ok(ArtifactRecord::from_bytes(
            &self.experiment_id,
            self.dataset.name(),
            &self.to_bytes()?,
        ))
    }
}

/// Handle on `<results_path>/HyperhuntAssets`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    /// Store rooted at `results_path/HyperhuntAssets`. Nothing is created until
    /// [`ResultStore::ensure_layout`].
    #[must_use]
    pub fn new(results_path: &Path) -> Self {
        Self {
            root: results_path.join(ASSETS_DIR),
        }
    }

    /// The `HyperhuntAssets` directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create every result subdirectory.
    ///
    /// # Errors
    ///
    /// Returns error if a directory cannot be created.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [
            "Descriptions",
            "Heartbeats",
            "PredictionsOOF",
            "PredictionsHoldout",
            "PredictionsTest",
            "PredictionsInFold",
            "TestedKeys",
            "Leaderboards",
        ] {
            make_dirs(&self.root.join(dir), true)?;
        }
        Ok(())
    }

    /// `Descriptions/<id>.json`
    #[must_use]
    pub fn description_path(&self, experiment_id: &str) -> PathBuf {
        self.root.join("Descriptions").join(format!("{experiment_id}.json"))
    }

    /// `Predictions*/<id>.json` for a predictions file kind.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `kind` is not a predictions file.
    pub fn predictions_path(&self, kind: ResultFile, experiment_id: &str) -> Result<PathBuf> {
        let dir = match kind {
            ResultFile::PredictionsOof => "PredictionsOOF",
            ResultFile::PredictionsHoldout => "PredictionsHoldout",
            ResultFile::PredictionsTest => "PredictionsTest",
            ResultFile::PredictionsInFold => "PredictionsInFold",
            other => {
                return Err(Error::InvalidInput(format!(
                    "{other} is not a predictions file"
                )))
            }
        };
        Ok(self.root.join(dir).join(format!("{experiment_id}.json")))
    }

    /// `Heartbeats/<id>.log`
    #[must_use]
    pub fn heartbeat_path(&self, experiment_id: &str) -> PathBuf {
        self.root.join("Heartbeats").join(format!("{experiment_id}.log"))
    }

    /// `Heartbeats/current_heartbeat.log`
    #[must_use]
    pub fn current_heartbeat_path(&self) -> PathBuf {
        self.root.join("Heartbeats").join(CURRENT_HEARTBEAT)
    }

    /// `TestedKeys/<cross_experiment_key>.json`
    #[must_use]
    pub fn tested_keys_path(&self, cross_experiment_key: &str) -> PathBuf {
        self.root
            .join("TestedKeys")
            .join(format!("{cross_experiment_key}.json"))
    }

    /// `Leaderboards/GlobalLeaderboard.parquet`
    #[must_use]
    pub fn leaderboard_path(&self) -> PathBuf {
        self.root.join("Leaderboards").join(LEADERBOARD_FILE)
    }

    /// Persist a description.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub fn write_description(&self, description: &ExperimentDescription) -> Result<PathBuf> {
        let path = self.description_path(description.experiment_id());
        write_json(&path, description, false)?;
        Ok(path)
    }

    /// Read a description back.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id and `Json` for a corrupt file.
    pub fn read_description(&self, experiment_id: &str) -> Result<ExperimentDescription> {
        read_json(&self.description_path(experiment_id))
    }

    /// Persist a predictions file, returning its content-addressed record.
    ///
    /// # Errors
    ///
    /// Returns error if the kind is not a predictions file or the write fails.
    pub fn write_predictions(&self, file: &PredictionsFile) -> Result<ArtifactRecord> {
        let path = self.predictions_path(file.dataset, &file.experiment_id)?;
        let bytes = file.to_bytes()?;
        fs::write(&path, &bytes).map_err(|e| from_io(e, &path))?;
        Ok(ArtifactRecord::from_bytes(
            &file.experiment_id,
            file.dataset.name(),
            &bytes,
        ))
    }

    /// Read a predictions file back.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file was never written.
    pub fn read_predictions(&self, kind: ResultFile, experiment_id: &str) -> Result<PredictionsFile> {
        read_json(&self.predictions_path(kind, experiment_id)?)
    }

    /// Tested hyperparameter keys for an Environment; empty if none were recorded.
    ///
    /// # Errors
    ///
    /// Returns `Json` if the file is corrupt.
    pub fn tested_keys(&self, cross_experiment_key: &str) -> Result<TestedKeys> {
        match read_json(&self.tested_keys_path(cross_experiment_key)) {
            Err(Error::NotFound { .. }) => Ok(TestedKeys::new()),
            other => other,
        }
    }

    /// Record that `experiment_id` tested `hyperparameter_key` under `cross_experiment_key`.
    ///
    /// # Errors
    ///
    /// Returns error if the tested-keys file cannot be updated.
    pub fn add_tested_key(
        &self,
        cross_experiment_key: &str,
        hyperparameter_key: &str,
        experiment_id: &str,
    ) -> Result<()> {
        let options = AddToJson::default()
            .key(hyperparameter_key)
            .append_value(true)
            .default_content(json!({}));
        add_to_json(
            &self.tested_keys_path(cross_experiment_key),
            Value::String(experiment_id.to_string()),
            &options,
        )
    }

    /// Copy the current heartbeat to `Heartbeats/<id>.log`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no current heartbeat exists.
    pub fn save_heartbeat(&self, experiment_id: &str) -> Result<PathBuf> {
        let source = self.current_heartbeat_path();
        let target = self.heartbeat_path(experiment_id);
        fs::copy(&source, &target).map_err(|e| from_io(e, &source))?;
        Ok(target)
    }
}
