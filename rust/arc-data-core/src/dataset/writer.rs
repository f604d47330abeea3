// rust/arc-data-core/src/dataset/writer.rs

use std::path::Path;
use std::sync::Arc;

use arrow_array::{ArrayRef, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tracing::info;

use super::shard::{ID_COLUMN, TASK_COLUMN};
use crate::codec::encode;
use crate::config::ShardCompression;
use crate::error::{DataError, Result};
use crate::storage::StorageBackend;
use crate::task::Sample;

/// Options for exporting a shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardWriteOptions {
    pub compression: ShardCompression,
    /// Maximum rows per Parquet row group.
    pub rows_per_group: usize,
}

impl Default for ShardWriteOptions {
    fn default() -> Self {
        Self {
            compression: ShardCompression::Snappy,
            rows_per_group: 1024,
        }
    }
}

/// Arrow schema of a shard: two non-null string columns.
pub fn shard_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(ID_COLUMN, DataType::Utf8, false),
        Field::new(TASK_COLUMN, DataType::Utf8, false),
    ]))
}

/// Encodes `samples` and writes them to `path` as one shard, replacing any
/// existing object. Returns the number of rows written.
///
/// # Errors
///
/// Returns a `Config` error for a zero `rows_per_group`, a `Serialization`
/// error if a task cannot be encoded, and a `Shard` or `Storage` error if
/// the file cannot be written.
pub fn write_shard(
    storage: &dyn StorageBackend,
    path: &Path,
    samples: &[Sample],
    options: &ShardWriteOptions,
) -> Result<u64> {
    if options.rows_per_group == 0 {
        return Err(DataError::config("rows_per_group must be greater than 0"));
    }

    let compression = match options.compression {
        ShardCompression::Snappy => Compression::SNAPPY,
        ShardCompression::None => Compression::UNCOMPRESSED,
    };
    let props = WriterProperties::builder()
        .set_compression(compression)
        .set_max_row_group_size(options.rows_per_group)
        .build();

    let schema = shard_schema();
    let sink = storage.open_write(path)?;
    let mut writer = ArrowWriter::try_new(sink, Arc::clone(&schema), Some(props))
        .map_err(|e| DataError::shard_with_source(path, "failed to start shard", e))?;

    for chunk in samples.chunks(options.rows_per_group) {
        let ids: StringArray = chunk.iter().map(|(id, _)| Some(id.as_str())).collect();
        let tasks = chunk
            .iter()
            .map(|(_, task)| encode(task).map(Some))
            .collect::<Result<StringArray>>()?;

        let columns: Vec<ArrayRef> = vec![Arc::new(ids), Arc::new(tasks)];
        let batch = RecordBatch::try_new(Arc::clone(&schema), columns)
            .map_err(|e| DataError::shard_with_source(path, "failed to assemble batch", e))?;
        writer
            .write(&batch)
            .map_err(|e| DataError::shard_with_source(path, "failed to write batch", e))?;
    }

    let sink = writer
        .into_inner()
        .map_err(|e| DataError::shard_with_source(path, "failed to finish shard", e))?;
    sink.finish()?;

    info!("Wrote {} rows to {}", samples.len(), path.display());
    Ok(samples.len() as u64)
}
