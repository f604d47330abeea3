// rust/arc-data-core/src/storage/traits.rs

//! The seam between the shard cache and everything that uses it.
//!
//! Shards are written once (by the fetcher or the shard writer) and then
//! read either whole, for eager loads, or in byte ranges, when Parquet pulls
//! a footer or a column chunk for a stream.

use std::io::Write;
use std::path::Path;

use crate::error::Result;

/// A name found directly under a cache directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub name: String,
    pub is_dir: bool,
}

impl CacheEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }
}

/// Random access to one stored shard.
pub trait StorageReader: Send {
    /// Shard length in bytes.
    fn size(&self) -> u64;

    /// Returns exactly `length` bytes starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if the range runs past the end of the shard
    /// or the underlying read fails.
    fn read_range(&mut self, start: u64, length: usize) -> Result<Vec<u8>>;

    /// Reads the whole shard.
    ///
    /// # Errors
    ///
    /// See [`read_range`](Self::read_range).
    fn read_all(&mut self) -> Result<Vec<u8>> {
        let size = self.size() as usize;
        self.read_range(0, size)
    }
}

/// Sink for a shard being written. Bytes become visible under their path
/// no later than [`finish`](Self::finish).
pub trait StorageWriter: Write + Send {
    /// # Errors
    ///
    /// Returns a `Storage` error if the bytes cannot be persisted.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// A shard cache addressed by paths relative to its root.
///
/// Shared between the loader and open streams as `Arc<dyn StorageBackend>`.
pub trait StorageBackend: Send + Sync {
    /// Presence check used before every load.
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if presence cannot be determined.
    fn exists(&self, path: &Path) -> Result<bool>;

    /// # Errors
    ///
    /// Returns a `Storage` error if the shard is missing or unreadable.
    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>>;

    /// Replaces whatever is stored at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if the destination cannot be created.
    fn open_write(&self, path: &Path) -> Result<Box<dyn StorageWriter>>;

    /// Entries directly under `dir`, sorted by name. A missing directory
    /// lists as empty.
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if `dir` is a file or cannot be read.
    fn list(&self, dir: &Path) -> Result<Vec<CacheEntry>>;
}
