//! Result storage (JSON records, Arrow/Parquet tables)
//!
//! **Append-Only Write Pattern**:
//! - Experiment descriptions and prediction files are written once, never updated
//! - Tested keys grow by appending experiment ids
//! - The global leaderboard grows by appending record batches
//!
//! Parquet files are rewritten whole on append; they stay small (one row per
//! experiment, dataset and metric).

mod results;

pub use results::{PredictionsFile, ResultStore, TestedKeys, ASSETS_DIR};

use crate::error::from_io;
use crate::{Error, Result};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use std::fs::File;
use std::path::Path;

/// Load every record batch from a Parquet file.
///
/// # Errors
/// Returns `NotFound` if the file is missing, or a storage error if it cannot be parsed
pub fn load_parquet<P: AsRef<Path>>(path: P) -> Result<Vec<RecordBatch>> {
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    let path = path.as_ref();
    let file = File::open(path).map_err(|e| from_io(e, path))?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::Storage(format!("Failed to parse Parquet file {}: {e}", path.display())))?;

    let reader = builder
        .build()
        .map_err(|e| Error::Storage(format!("Failed to create Parquet reader: {e}")))?;

    let mut batches = Vec::new();
    for batch in reader {
        let batch =
            batch.map_err(|e| Error::Storage(format!("Failed to read record batch: {e}")))?;
        batches.push(batch);
    }

    Ok(batches)
}

/// Load a Parquet file as a single batch.
///
/// # Errors
/// Returns error if the file cannot be read, or it is empty and has no schema to concatenate
pub fn load_parquet_batch<P: AsRef<Path>>(path: P) -> Result<RecordBatch> {
    let path = path.as_ref();
    let batches = load_parquet(path)?;
    let schema = batches.first().map(RecordBatch::schema).ok_or_else(|| {
        Error::Storage(format!("Parquet file {} contains no record batches", path.display()))
    })?;
    Ok(arrow::compute::concat_batches(&schema, &batches)?)
}

/// Write `batches` (all sharing `schema`) to a Parquet file, replacing it.
///
/// # Errors
/// Returns error if a batch schema does not match, or the file cannot be written
pub fn write_parquet<P: AsRef<Path>>(
    path: P,
    schema: &SchemaRef,
    batches: &[RecordBatch],
) -> Result<()> {
    use parquet::arrow::ArrowWriter;

    let path = path.as_ref();
    for batch in batches {
        if batch.schema() != *schema {
            return Err(Error::Storage(format!(
                "Schema mismatch: expected {:?}, got {:?}",
                schema,
                batch.schema()
            )));
        }
    }

    let file = File::create(path).map_err(|e| from_io(e, path))?;
    let mut writer = ArrowWriter::try_new(file, schema.clone(), None)?;
    for batch in batches {
        writer.write(batch)?;
    }
    writer.close()?;
    Ok(())
}
