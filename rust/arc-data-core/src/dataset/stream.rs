// rust/arc-data-core/src/dataset/stream.rs

use std::fmt;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReader;
use tracing::{debug, info};

use super::shard::{open_batches, sample_at, ShardSource};
use crate::error::{DataError, Result};
use crate::storage::StorageBackend;
use crate::task::Sample;

/// Observable state of a [`SampleStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No shard is open; the next call opens one.
    Pending,
    /// A shard is open and rows remain in it or in later shards.
    Active,
    /// Every shard has been read.
    Exhausted,
    /// An error was returned; the stream yields nothing more.
    Failed,
}

enum Phase {
    Pending,
    Active(Box<ShardCursor>),
    Exhausted,
    Failed,
}

/// Position inside the currently open shard.
struct ShardCursor {
    path: PathBuf,
    batches: ParquetRecordBatchReader,
    batch: Option<RecordBatch>,
    index: usize,
    row: u64,
}

impl ShardCursor {
    fn take_row(&mut self) -> Result<Option<Sample>> {
        let Some(batch) = &self.batch else {
            return Ok(None);
        };
        if self.index >= batch.num_rows() {
            return Ok(None);
        }
        let sample = sample_at(batch, self.index, &self.path, self.row)?;
        self.index += 1;
        self.row += 1;
        Ok(Some(sample))
    }
}

/// Pull-based sample iterator over a list of shards.
///
/// At most one record batch of `batch_size` rows is held at a time and tasks
/// are decoded one row per call. After the last row, or after an error has
/// been returned, the stream yields `None` forever. It cannot be rewound.
pub struct SampleStream {
    storage: Arc<dyn StorageBackend>,
    shards: Vec<PathBuf>,
    batch_size: usize,
    next_shard: usize,
    phase: Phase,
    rows_yielded: u64,
    shards_completed: usize,
}

impl SampleStream {
    /// Creates a stream; no I/O happens until the first call to
    /// [`next_sample`](Self::next_sample).
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if `batch_size` is zero.
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        shards: Vec<PathBuf>,
        batch_size: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(DataError::config("batch_size must be greater than 0"));
        }
        Ok(Self {
            storage,
            shards,
            batch_size,
            next_shard: 0,
            phase: Phase::Pending,
            rows_yielded: 0,
            shards_completed: 0,
        })
    }

    /// Returns the next sample, `Ok(None)` once finished.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the stream. The stream is failed
    /// afterwards and every further call returns `Ok(None)`.
    pub fn next_sample(&mut self) -> Result<Option<Sample>> {
        match self.advance() {
            Ok(Some(sample)) => {
                self.rows_yielded += 1;
                Ok(Some(sample))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.phase = Phase::Failed;
                Err(e)
            }
        }
    }

    pub fn state(&self) -> StreamState {
        match self.phase {
            Phase::Pending => StreamState::Pending,
            Phase::Active(_) => StreamState::Active,
            Phase::Exhausted => StreamState::Exhausted,
            Phase::Failed => StreamState::Failed,
        }
    }

    pub fn rows_yielded(&self) -> u64 {
        self.rows_yielded
    }

    pub fn shards_completed(&self) -> usize {
        self.shards_completed
    }

    pub fn shards(&self) -> &[PathBuf] {
        &self.shards
    }

    /// Shard currently being read, if any.
    pub fn current_shard(&self) -> Option<&Path> {
        match &self.phase {
            Phase::Active(cursor) => Some(&cursor.path),
            _ => None,
        }
    }

    fn advance(&mut self) -> Result<Option<Sample>> {
        loop {
            if matches!(self.phase, Phase::Pending) {
                self.phase = self.open_next()?;
                continue;
            }
            let Phase::Active(cursor) = &mut self.phase else {
                return Ok(None);
            };

            if let Some(sample) = cursor.take_row()? {
                return Ok(Some(sample));
            }

            match cursor.batches.next() {
                Some(Ok(batch)) => {
                    debug!(
                        "Read batch of {} rows from {}",
                        batch.num_rows(),
                        cursor.path.display()
                    );
                    cursor.batch = Some(batch);
                    cursor.index = 0;
                }
                Some(Err(e)) => {
                    return Err(DataError::shard_with_source(
                        &cursor.path,
                        "failed to read record batch",
                        e,
                    ));
                }
                None => {
                    debug!("Finished {} after {} rows", cursor.path.display(), cursor.row);
                    self.shards_completed += 1;
                    self.phase = Phase::Pending;
                }
            }
        }
    }

    fn open_next(&mut self) -> Result<Phase> {
        let Some(path) = self.shards.get(self.next_shard).cloned() else {
            info!(
                "Streamed {} samples from {} shard(s)",
                self.rows_yielded, self.shards_completed
            );
            return Ok(Phase::Exhausted);
        };
        self.next_shard += 1;

        info!("Streaming {}", path.display());
        let reader = self.storage.open_read(&path)?;
        let source = ShardSource::new(&path, reader);
        let batches = open_batches(source, &path, self.batch_size)?;

        Ok(Phase::Active(Box::new(ShardCursor {
            path,
            batches,
            batch: None,
            index: 0,
            row: 0,
        })))
    }
}

impl Iterator for SampleStream {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_sample().transpose()
    }
}

impl FusedIterator for SampleStream {}

impl fmt::Debug for SampleStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleStream")
            .field("shards", &self.shards)
            .field("batch_size", &self.batch_size)
            .field("state", &self.state())
            .field("rows_yielded", &self.rows_yielded)
            .field("shards_completed", &self.shards_completed)
            .finish()
    }
}
