// rust/arc-data-core/src/testing.rs

//! Fixtures shared by the unit tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use arrow_array::{ArrayRef, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;

use crate::dataset::{shard_schema, write_shard, ShardWriteOptions};
use crate::error::{DataError, Result};
use crate::fetch::{FetchReport, FetchedFile, RecordSource};
use crate::storage::{MemoryStorage, StorageBackend};
use crate::task::{Grid, Pair, Sample, Task, PALETTE_SIZE};

/// A small deterministic task; `seed` varies the colors and shapes.
pub fn task(seed: usize) -> Task {
    let color = |offset: usize| ((seed + offset) % PALETTE_SIZE as usize) as u8;
    let width = 1 + seed % 3;
    Task::new(
        vec![
            Pair::new(
                Grid::filled(2, width, color(0)),
                Grid::filled(width, 2, color(1)),
            ),
            Pair::new(Grid::new(vec![vec![color(2)]]), Grid::new(vec![vec![color(3)]])),
        ],
        vec![Pair::new(
            Grid::new(vec![vec![color(4), color(5)], vec![color(6), color(7)]]),
            Grid::filled(1, width, color(8)),
        )],
    )
}

/// `count` samples with ids `<prefix>-<n>`.
pub fn samples(prefix: &str, count: usize) -> Vec<Sample> {
    (0..count)
        .map(|n| (format!("{prefix}-{n}"), task(n)))
        .collect()
}

/// Encoded Parquet bytes of a shard holding `samples`.
pub fn shard_bytes(samples: &[Sample]) -> Vec<u8> {
    let storage = MemoryStorage::new();
    write_shard(&storage, Path::new("shard"), samples, &ShardWriteOptions::default()).unwrap();
    storage.get("shard").unwrap()
}

/// A shard with raw, possibly malformed, task payloads.
pub fn raw_shard(rows: &[(&str, &str)]) -> Vec<u8> {
    let ids: StringArray = rows.iter().map(|(id, _)| Some(*id)).collect();
    let tasks: StringArray = rows.iter().map(|(_, task)| Some(*task)).collect();
    let columns: Vec<ArrayRef> = vec![Arc::new(ids), Arc::new(tasks)];
    write_batch(RecordBatch::try_new(shard_schema(), columns).unwrap())
}

/// A Parquet file holding a single string column.
pub fn single_column_shard(name: &str, values: &[&str]) -> Vec<u8> {
    let schema = Arc::new(Schema::new(vec![Field::new(name, DataType::Utf8, false)]));
    let values: StringArray = values.iter().map(|v| Some(*v)).collect();
    write_batch(RecordBatch::try_new(schema, vec![Arc::new(values) as ArrayRef]).unwrap())
}

fn write_batch(batch: RecordBatch) -> Vec<u8> {
    let mut writer = ArrowWriter::try_new(Vec::new(), batch.schema(), None).unwrap();
    writer.write(&batch).unwrap();
    writer.into_inner().unwrap()
}

/// Record source that installs a fixed set of files and counts calls.
#[derive(Clone, Default)]
pub struct FakeSource {
    files: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl FakeSource {
    pub fn new(files: Vec<(String, Vec<u8>)>) -> Self {
        Self {
            files: Arc::new(Mutex::new(files)),
            ..Default::default()
        }
    }

    /// A source whose every fetch fails with a network error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RecordSource for FakeSource {
    fn fetch_record(&self, record_id: u64, storage: &dyn StorageBackend) -> Result<FetchReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DataError::network("fake://record", "unreachable"));
        }

        let mut report = FetchReport {
            record_id,
            files: Vec::new(),
        };
        for (name, data) in self.files.lock().unwrap().iter() {
            let mut writer = storage.open_write(Path::new(name))?;
            std::io::Write::write_all(&mut writer, data).unwrap();
            writer.finish()?;
            report.files.push(FetchedFile {
                name: name.clone(),
                bytes: data.len() as u64,
                advertised: data.len() as u64,
            });
        }
        Ok(report)
    }
}
