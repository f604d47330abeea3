// rust/arc-data-core/src/dataset/reader.rs

use std::path::{Path, PathBuf};
use std::time::Instant;

use bytes::Bytes;
use indicatif::ProgressBar;
use tracing::{debug, info};

use super::shard::{decode_shard_counted, footer_rows};
use crate::error::Result;
use crate::progress::shard_and_row_bars;
use crate::storage::StorageBackend;
use crate::task::Sample;

/// Rows decoded per Arrow batch when a shard is already in memory.
const EAGER_BATCH_ROWS: usize = 8192;

/// Reads one shard fully into memory and decodes every row.
///
/// # Errors
///
/// Returns a `Storage` error if the shard cannot be read, a `Shard` error
/// for structural problems and a `Decode` error at the first malformed row.
pub fn read_shard(storage: &dyn StorageBackend, path: &Path) -> Result<Vec<Sample>> {
    read_shard_counted(storage, path, &ProgressBar::hidden())
}

// Restarts `rows` at zero, sized to the shard's row count.
fn read_shard_counted(
    storage: &dyn StorageBackend,
    path: &Path,
    rows: &ProgressBar,
) -> Result<Vec<Sample>> {
    let data = Bytes::from(storage.open_read(path)?.read_all()?);
    debug!("Read {} bytes from {}", data.len(), path.display());

    rows.reset();
    rows.set_length(footer_rows(&data));
    rows.set_message(path.display().to_string());
    decode_shard_counted(data, path, EAGER_BATCH_ROWS, rows)
}

/// Reads every shard in order and concatenates their samples.
///
/// Nothing is returned unless every shard decodes.
///
/// # Errors
///
/// Returns the first error from [`read_shard`].
pub fn read_all(
    storage: &dyn StorageBackend,
    shards: &[PathBuf],
    show_progress: bool,
) -> Result<Vec<Sample>> {
    let start = Instant::now();
    let (bar, rows) = shard_and_row_bars(shards.len() as u64, show_progress);
    let mut samples = Vec::new();

    for path in shards {
        let shard_samples = read_shard_counted(storage, path, &rows)?;
        info!("Loaded {} samples from {}", shard_samples.len(), path.display());
        samples.extend(shard_samples);
        bar.inc(1);
        bar.set_message(format!("{} samples", samples.len()));
    }

    rows.finish_and_clear();
    bar.finish_and_clear();
    info!(
        "Loaded {} samples from {} shard(s) in {:.2?}",
        samples.len(),
        shards.len(),
        start.elapsed()
    );
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataError;
    use crate::storage::{LocalStorage, MemoryStorage};
    use crate::testing;

    #[test]
    fn test_read_all_preserves_shard_then_row_order() {
        let storage = MemoryStorage::new();
        let first = testing::samples("a", 3);
        let second = testing::samples("b", 4);
        storage.insert("a.parquet", testing::shard_bytes(&first));
        storage.insert("b.parquet", testing::shard_bytes(&second));

        let shards = [PathBuf::from("b.parquet"), PathBuf::from("a.parquet")];
        let samples = read_all(&storage, &shards, false).unwrap();

        let expected: Vec<Sample> = second.into_iter().chain(first).collect();
        assert_eq!(samples, expected);
    }

    #[test]
    fn test_malformed_row_fails_whole_read() {
        let storage = MemoryStorage::new();
        let good = crate::codec::encode(&testing::task(0)).unwrap();
        storage.insert("ok.parquet", testing::shard_bytes(&testing::samples("ok", 2)));
        storage.insert(
            "bad.parquet",
            testing::raw_shard(&[("x", good.as_str()), ("y", "not a task")]),
        );

        let shards = [PathBuf::from("ok.parquet"), PathBuf::from("bad.parquet")];
        let err = read_all(&storage, &shards, false).unwrap_err();
        assert!(err.is_decode());
        assert!(err.to_string().contains("bad.parquet"));
    }

    #[test]
    fn test_row_bar_restarts_per_shard() {
        let storage = MemoryStorage::new();
        storage.insert("five.parquet", testing::shard_bytes(&testing::samples("f", 5)));
        storage.insert("three.parquet", testing::shard_bytes(&testing::samples("t", 3)));

        let rows = ProgressBar::hidden();
        read_shard_counted(&storage, Path::new("five.parquet"), &rows).unwrap();
        assert_eq!(rows.length(), Some(5));
        assert_eq!(rows.position(), 5);

        read_shard_counted(&storage, Path::new("three.parquet"), &rows).unwrap();
        assert_eq!(rows.length(), Some(3));
        assert_eq!(rows.position(), 3);
    }

    #[test]
    fn test_missing_shard() {
        let storage = MemoryStorage::new();
        let err = read_all(&storage, &[PathBuf::from("gone.parquet")], false).unwrap_err();
        assert!(matches!(err, DataError::Storage { .. }));
    }

    #[test]
    fn test_read_shard_from_disk_with_mmap() {
        let temp = tempfile::tempdir().unwrap();
        let samples = testing::samples("m", 20);
        std::fs::write(temp.path().join("m.parquet"), testing::shard_bytes(&samples)).unwrap();

        let storage = LocalStorage::new(&crate::config::StorageConfig {
            base_path: temp.path().to_path_buf(),
            use_mmap: true,
            mmap_threshold: 0,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(read_shard(&storage, Path::new("m.parquet")).unwrap(), samples);
    }
}
