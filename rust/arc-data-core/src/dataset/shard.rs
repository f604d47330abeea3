// rust/arc-data-core/src/dataset/shard.rs

//! Parquet access shared by the eager reader and the lazy stream.
//!
//! A shard holds two string columns, `id` and `task`, row-aligned. Readers
//! project to exactly those columns; anything else in the file is ignored.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use arrow_array::{Array, LargeStringArray, RecordBatch, StringArray};
use arrow_schema::DataType;
use bytes::Bytes;
use indicatif::ProgressBar;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::arrow::ProjectionMask;
use parquet::errors::ParquetError;
use parquet::file::reader::{ChunkReader, FileReader, Length};
use parquet::file::serialized_reader::SerializedFileReader;

use crate::codec::decode_row;
use crate::error::{DataError, Result};
use crate::storage::StorageReader;
use crate::task::Sample;

pub const ID_COLUMN: &str = "id";
pub const TASK_COLUMN: &str = "task";

/// Range-reading view of a stored shard.
///
/// Parquet pulls the footer and then one column chunk at a time through this
/// adapter, so only the pages being decoded are ever resident.
#[derive(Clone)]
pub struct ShardSource {
    path: PathBuf,
    size: u64,
    reader: Arc<Mutex<Box<dyn StorageReader>>>,
}

impl ShardSource {
    pub fn new(path: impl Into<PathBuf>, reader: Box<dyn StorageReader>) -> Self {
        Self {
            path: path.into(),
            size: reader.size(),
            reader: Arc::new(Mutex::new(reader)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_range(&self, start: u64, length: usize) -> Result<Vec<u8>> {
        let mut reader = self
            .reader
            .lock()
            .map_err(|_| DataError::shard(&self.path, "shard reader lock poisoned"))?;
        reader.read_range(start, length)
    }
}

impl Length for ShardSource {
    fn len(&self) -> u64 {
        self.size
    }
}

impl ChunkReader for ShardSource {
    type T = RangeRead;

    fn get_read(&self, start: u64) -> parquet::errors::Result<RangeRead> {
        if start > self.size {
            return Err(ParquetError::EOF(format!(
                "read at {start} past end of '{}' ({} bytes)",
                self.path.display(),
                self.size
            )));
        }
        Ok(RangeRead {
            source: self.clone(),
            pos: start,
        })
    }

    fn get_bytes(&self, start: u64, length: usize) -> parquet::errors::Result<Bytes> {
        let data = self
            .read_range(start, length)
            .map_err(|e| ParquetError::External(Box::new(e)))?;
        if data.len() != length {
            return Err(ParquetError::EOF(format!(
                "expected {length} bytes at {start} in '{}', got {}",
                self.path.display(),
                data.len()
            )));
        }
        Ok(Bytes::from(data))
    }
}

/// Sequential reader over a [`ShardSource`] starting at an offset.
pub struct RangeRead {
    source: ShardSource,
    pos: u64,
}

impl Read for RangeRead {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.source.size.saturating_sub(self.pos);
        let want = (buf.len() as u64).min(remaining) as usize;
        if want == 0 {
            return Ok(0);
        }
        let data = self.source.read_range(self.pos, want).map_err(io::Error::other)?;
        buf[..data.len()].copy_from_slice(&data);
        self.pos += data.len() as u64;
        Ok(data.len())
    }
}

/// Opens a batch reader over the `id` and `task` columns of a shard.
///
/// # Errors
///
/// Returns a `Shard` error if the data is not Parquet, or either column is
/// missing or not a string column.
pub fn open_batches<R>(source: R, path: &Path, batch_size: usize) -> Result<ParquetRecordBatchReader>
where
    R: ChunkReader + 'static,
{
    let builder = ParquetRecordBatchReaderBuilder::try_new(source)
        .map_err(|e| DataError::shard_with_source(path, "not a readable Parquet file", e))?;

    let schema = builder.schema();
    let mut roots = Vec::with_capacity(2);
    for column in [ID_COLUMN, TASK_COLUMN] {
        let (index, field) = schema
            .column_with_name(column)
            .ok_or_else(|| DataError::shard(path, format!("missing column '{column}'")))?;
        if !matches!(field.data_type(), DataType::Utf8 | DataType::LargeUtf8) {
            return Err(DataError::shard(
                path,
                format!(
                    "column '{column}' has type {}, expected a string column",
                    field.data_type()
                ),
            ));
        }
        roots.push(index);
    }

    let mask = ProjectionMask::roots(builder.parquet_schema(), roots);
    builder
        .with_projection(mask)
        .with_batch_size(batch_size)
        .build()
        .map_err(|e| DataError::shard_with_source(path, "failed to build batch reader", e))
}

/// Decodes the sample at `index` of `batch`; `row` is its position in the
/// shard and only used for error messages.
///
/// # Errors
///
/// Returns a `Shard` error for a null cell and a `Decode` error for a
/// malformed task payload.
pub fn sample_at(batch: &RecordBatch, index: usize, path: &Path, row: u64) -> Result<Sample> {
    let id = text_cell(batch, ID_COLUMN, index, path, row)?;
    let payload = text_cell(batch, TASK_COLUMN, index, path, row)?;
    let task = decode_row(payload, path, row)?;
    Ok((id.to_string(), task))
}

fn text_cell<'a>(
    batch: &'a RecordBatch,
    column: &str,
    index: usize,
    path: &Path,
    row: u64,
) -> Result<&'a str> {
    let array = batch
        .column_by_name(column)
        .ok_or_else(|| DataError::shard(path, format!("missing column '{column}'")))?;

    let value = if let Some(strings) = array.as_any().downcast_ref::<StringArray>() {
        (!strings.is_null(index)).then(|| strings.value(index))
    } else if let Some(strings) = array.as_any().downcast_ref::<LargeStringArray>() {
        (!strings.is_null(index)).then(|| strings.value(index))
    } else {
        return Err(DataError::shard(
            path,
            format!(
                "column '{column}' has type {}, expected a string column",
                array.data_type()
            ),
        ));
    };

    value.ok_or_else(|| DataError::shard(path, format!("null '{column}' at row {row}")))
}

/// Reads a whole shard held in memory.
///
/// # Errors
///
/// Returns the first structural or decoding error.
pub fn decode_shard(data: Bytes, path: &Path, batch_size: usize) -> Result<Vec<Sample>> {
    decode_shard_counted(data, path, batch_size, &ProgressBar::hidden())
}

/// Like [`decode_shard`], advancing `rows` once per decoded row.
///
/// # Errors
///
/// Returns the first structural or decoding error.
pub fn decode_shard_counted(
    data: Bytes,
    path: &Path,
    batch_size: usize,
    rows: &ProgressBar,
) -> Result<Vec<Sample>> {
    let batches = open_batches(data, path, batch_size)?;
    let mut samples = Vec::new();
    let mut row = 0u64;
    for batch in batches {
        let batch = batch
            .map_err(|e| DataError::shard_with_source(path, "failed to read record batch", e))?;
        for index in 0..batch.num_rows() {
            samples.push(sample_at(&batch, index, path, row)?);
            row += 1;
            rows.inc(1);
        }
    }
    Ok(samples)
}

/// Row count recorded in the footer of an in-memory shard, 0 if the footer
/// cannot be read.
pub fn footer_rows(data: &Bytes) -> u64 {
    SerializedFileReader::new(data.clone())
        .map(|reader| reader.metadata().file_metadata().num_rows().max(0) as u64)
        .unwrap_or(0)
}
