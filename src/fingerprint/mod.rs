//! Configuration fingerprinting
//!
//! Produces the stable digests that let an optimization round recognize results from
//! equivalent prior experiments.
//!
//! ```text
//! fingerprint(C) = base64url( SHA-256( canonical(C) ) )
//! canonical(C)   = compact JSON, map keys sorted, ints != floats,
//!                  callables -> {"$callable":IDENTITY}, NaN/inf -> {"$float":"NaN"}
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use hyperhunt::fingerprint::{fingerprint, ConfigValue};
//!
//! let a = ConfigValue::map([("n_splits", 5), ("n_repeats", 2), ("random_state", 32)]);
//! let b = ConfigValue::map([("random_state", 32), ("n_repeats", 2), ("n_splits", 5)]);
//! assert_eq!(fingerprint(&a), fingerprint(&b));
//! ```

mod value;

pub use value::ConfigValue;

use crate::Result;
use arrow::array::Array;
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Length of every fingerprint string (base64 of a 32-byte digest, padded).
pub const FINGERPRINT_LEN: usize = 44;

/// Compute the fingerprint of a configuration value.
#[must_use]
pub fn fingerprint(value: &ConfigValue) -> String {
    let canonical = value.to_canonical_string();
    digest_to_key(&Sha256::digest(canonical.as_bytes()))
}

/// Compute the fingerprint of a dataset.
///
/// Covers the schema (field names and types) and every cell, in row-major order per column.
/// Nulls are tagged separately from any rendered value.
///
/// # Errors
///
/// Returns error if a cell cannot be rendered by Arrow's display formatter.
pub fn dataset_fingerprint(batch: &RecordBatch) -> Result<String> {
    let mut hasher = Sha256::new();
    let schema = batch.schema();

    for field in schema.fields() {
        hasher.update(b"field\0");
        hasher.update(field.name().as_bytes());
        hasher.update(b"\0");
        hasher.update(format!("{:?}", field.data_type()).as_bytes());
        hasher.update(b"\0");
    }
    hasher.update((batch.num_rows() as u64).to_le_bytes());

    for column in batch.columns() {
        hasher.update(b"column\0");
        for row in 0..column.len() {
            if column.is_null(row) {
                hasher.update(b"\x01");
            } else {
                hasher.update(b"\x00");
                hasher.update(array_value_to_string(column.as_ref(), row)?.as_bytes());
                hasher.update(b"\x1f");
            }
        }
    }

    Ok(digest_to_key(&hasher.finalize()))
}

fn digest_to_key(digest: &[u8]) -> String {
    URL_SAFE.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn batch(values: Vec<f64>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("x", DataType::Float64, false),
            Field::new("y", DataType::Int64, false),
        ]));
        let ys: Vec<i64> = (0..values.len() as i64).collect();
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Float64Array::from(values)),
                Arc::new(Int64Array::from(ys)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_fingerprint_format() {
        let key = fingerprint(&ConfigValue::from("anything"));
        assert_eq!(key.len(), FINGERPRINT_LEN);
        assert!(key.ends_with('='));
        assert!(!key.contains('+') && !key.contains('/'));
    }

    #[test]
    fn test_fingerprint_key_order_invariant() {
        let a = ConfigValue::map([("shuffle", ConfigValue::Bool(true)), ("k", 5.into())]);
        let b = ConfigValue::map([("k", ConfigValue::Int(5)), ("shuffle", true.into())]);
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_distinguishes_values() {
        let a = ConfigValue::map([("n_splits", 5)]);
        let b = ConfigValue::map([("n_splits", 3)]);
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_callable_differs_from_named() {
        let named = ConfigValue::from("accuracy_score");
        let custom = ConfigValue::callable("accuracy_score_rounded");
        assert_ne!(fingerprint(&named), fingerprint(&custom));
    }

    #[test]
    fn test_dataset_fingerprint_stable_and_sensitive() {
        let a = dataset_fingerprint(&batch(vec![1.0, 2.0, 3.0])).unwrap();
        let b = dataset_fingerprint(&batch(vec![1.0, 2.0, 3.0])).unwrap();
        let c = dataset_fingerprint(&batch(vec![1.0, 2.0, 3.5])).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
