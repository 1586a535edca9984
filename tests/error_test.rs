//! Tests for error types

use hyperhunt::Error;
use std::path::PathBuf;

#[test]
fn test_validation_error() {
    let error = Error::Validation("n_splits must be at least 2".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Invalid configuration"));
    assert!(error_str.contains("n_splits must be at least 2"));
}

#[test]
fn test_not_found_error() {
    let error = Error::not_found("data/holdout.parquet");
    let error_str = format!("{error}");
    assert!(error_str.contains("File not found"));
    assert!(error_str.contains("holdout.parquet"));
    assert!(matches!(error, Error::NotFound { path } if path == PathBuf::from("data/holdout.parquet")));
}

#[test]
fn test_model_error() {
    let error = Error::Model("unknown hyperparameter 'depth'".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Model error"));
    assert!(error_str.contains("depth"));
}

#[test]
fn test_optimization_error() {
    let error = Error::Optimization("no search dimensions".to_string());
    assert!(format!("{error}").contains("Optimization error"));
}

#[test]
fn test_storage_error() {
    let error = Error::Storage("leaderboard schema mismatch".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Storage error"));
    assert!(error_str.contains("leaderboard schema mismatch"));
}

#[test]
fn test_invalid_input_error() {
    let error = Error::InvalidInput("k must be positive".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Invalid input"));
    assert!(error_str.contains("k must be positive"));
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let error: Error = io_error.into();
    let error_str = format!("{error}");
    assert!(error_str.contains("IO error"));
}

#[test]
fn test_json_error_conversion() {
    let json_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let error: Error = json_error.into();
    assert!(format!("{error}").contains("JSON error"));
}

#[test]
fn test_other_error() {
    let error = Error::Other("custom error message".to_string());
    let error_str = format!("{error}");
    assert_eq!(error_str, "custom error message");
}

#[test]
fn test_error_debug() {
    let error = Error::Optimization("x".to_string());
    let debug_str = format!("{error:?}");
    assert!(debug_str.contains("Optimization"));
}

#[test]
fn test_result_type_alias() {
    #[allow(clippy::unnecessary_wraps)]
    fn returns_result() -> hyperhunt::Result<i32> {
        Ok(42)
    }

    let result = returns_result();
    assert!(result.is_ok());
    assert_eq!(result.unwrap(), 42);
}

#[test]
fn test_result_type_alias_error() {
    fn returns_error() -> hyperhunt::Result<i32> {
        Err(Error::Other("test error".to_string()))
    }

    let result = returns_error();
    assert!(result.is_err());
}
