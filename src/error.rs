//! Error types for hyperhunt
//!
//! Configuration problems surface at construction time with a message that names the
//! offending field, so a bad Environment never reaches the training loop.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// hyperhunt error types
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration (wrong shape, unsupported value)
    #[error("Invalid configuration: {0}")]
    Validation(String),

    /// An expected file or directory does not exist
    #[error("File not found: {}", path.display())]
    NotFound {
        /// Path that was looked up
        path: PathBuf,
    },

    /// Invalid argument passed to a library call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Model training or prediction failed
    #[error("Model error: {0}")]
    Model(String),

    /// Optimization protocol misuse or failure
    #[error("Optimization error: {0}")]
    Optimization(String),

    /// Results directory or leaderboard storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a [`Error::NotFound`] for `path`.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }
}

/// Map an IO error to [`Error::NotFound`] when the file is missing.
pub(crate) fn from_io(err: std::io::Error, path: &std::path::Path) -> Error {
    if err.kind() == std::io::ErrorKind::NotFound {
        Error::not_found(path)
    } else {
        Error::Io(err)
    }
}
