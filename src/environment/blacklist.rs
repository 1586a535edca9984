//! Result-file blacklist

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A kind of file an experiment persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultFile {
    /// `Descriptions/<id>.json`
    Description,
    /// `Heartbeats/<id>.log`
    Heartbeat,
    /// `PredictionsOOF/<id>.json`
    PredictionsOof,
    /// `PredictionsHoldout/<id>.json`
    PredictionsHoldout,
    /// `PredictionsTest/<id>.json`
    PredictionsTest,
    /// `PredictionsInFold/<id>.json`
    PredictionsInFold,
    /// `TestedKeys/<cross_experiment_key>.json`
    TestedKeys,
    /// `Leaderboards/GlobalLeaderboard.parquet`
    Leaderboard,
    /// `Heartbeats/current_heartbeat.log`, written while an experiment runs
    CurrentHeartbeat,
}

impl ResultFile {
    /// Every result file kind.
    pub const ALL: [Self; 9] = [
        Self::Description,
        Self::Heartbeat,
        Self::PredictionsOof,
        Self::PredictionsHoldout,
        Self::PredictionsTest,
        Self::PredictionsInFold,
        Self::TestedKeys,
        Self::Leaderboard,
        Self::CurrentHeartbeat,
    ];

    /// Blacklist name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Description => "description",
            Self::Heartbeat => "heartbeat",
            Self::PredictionsOof => "predictions_oof",
            Self::PredictionsHoldout => "predictions_holdout",
            Self::PredictionsTest => "predictions_test",
            Self::PredictionsInFold => "predictions_in_fold",
            Self::TestedKeys => "tested_keys",
            Self::Leaderboard => "leaderboard",
            Self::CurrentHeartbeat => "current_heartbeat",
        }
    }
}

impl fmt::Display for ResultFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResultFile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|file| file.name() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|f| f.name()).collect();
                Error::Validation(format!(
                    "Invalid blacklist value: {s}. Expected one of: {valid:?}"
                ))
            })
    }
}

/// Files an Environment must not write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileBlacklist {
    /// Write nothing
    All,
    /// Skip these kinds, in the order given (implied entries appended)
    Files(Vec<ResultFile>),
}

impl FileBlacklist {
    /// Empty blacklist.
    #[must_use]
    pub const fn none() -> Self {
        Self::Files(Vec::new())
    }

    /// Build from names, applying implications.
    ///
    /// `current_heartbeat` implies `heartbeat`: a per-experiment heartbeat is a copy of
    /// the current one.
    ///
    /// # Errors
    ///
    /// Returns `Invalid blacklist value: NAME` for unknown names.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut files = Vec::with_capacity(names.len() + 1);
        for name in names {
            let file: ResultFile = name.as_ref().parse()?;
            if !files.contains(&file) {
                files.push(file);
            }
        }
        if files.contains(&ResultFile::CurrentHeartbeat) && !files.contains(&ResultFile::Heartbeat) {
            files.push(ResultFile::Heartbeat);
        }
        Ok(Self::Files(files))
    }

    /// Whether `file` may be written.
    #[must_use]
    pub fn allows(&self, file: ResultFile) -> bool {
        match self {
            Self::All => false,
            Self::Files(files) => !files.contains(&file),
        }
    }

    /// Blacklisted kinds (every kind for [`FileBlacklist::All`]).
    #[must_use]
    pub fn files(&self) -> Vec<ResultFile> {
        match self {
            Self::All => ResultFile::ALL.to_vec(),
            Self::Files(files) => files.clone(),
        }
    }
}

impl Default for FileBlacklist {
    fn default() -> Self {
        Self::none()
    }
}

/// Validate a blacklist given as JSON: `"ALL"`, `null`, or a list of names.
///
/// # Errors
///
/// Returns `InvalidInput` for wrong shapes and `Validation` for unknown names.
pub fn validate_file_blacklist(value: &Value) -> Result<FileBlacklist> {
    match value {
        Value::Null => Ok(FileBlacklist::none()),
        Value::String(s) if s == "ALL" => Ok(FileBlacklist::All),
        Value::Array(items) => {
            let names = items
                .iter()
                .map(|item| {
                    item.as_str().ok_or_else(|| {
                        Error::InvalidInput(format!(
                            "Expected blacklist contents to be strings, not: {item}"
                        ))
                    })
                })
                .collect::<Result<Vec<&str>>>()?;
            FileBlacklist::from_names(&names)
        }
        other => Err(Error::InvalidInput(format!(
            "Expected blacklist to be a list, not: {other}"
        ))),
    }
}
