// rust/arc-data-core/src/fetch/mod.rs

//! Retrieval of published records from the remote archive.
//!
//! A record is a list of files. The fetcher reads the record metadata, then
//! streams every file into the cache, overwriting whatever is there. Any
//! non-success status aborts the whole fetch; there is no retry and no
//! resume, and a transfer that dies midway leaves a truncated file behind.
//!
//! The loader only depends on [`RecordSource`], so tests can swap the HTTP
//! implementation for a fake.

mod client;
mod metadata;

pub use client::RecordFetcher;
pub use metadata::{FileLinks, RecordFile, RecordMetadata};

use crate::error::Result;
use crate::storage::StorageBackend;

/// Something that can populate a storage backend with the files of a record.
pub trait RecordSource: Send + Sync {
    /// Writes every file of `record_id` into `storage`.
    ///
    /// # Errors
    ///
    /// Returns an error as soon as one request or write fails.
    fn fetch_record(&self, record_id: u64, storage: &dyn StorageBackend) -> Result<FetchReport>;
}

/// Outcome of a completed fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub record_id: u64,
    pub files: Vec<FetchedFile>,
}

/// One downloaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    pub name: String,
    /// Bytes written to storage.
    pub bytes: u64,
    /// `Content-Length` announced by the server, 0 when absent.
    pub advertised: u64,
}

impl FetchReport {
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.bytes).sum()
    }
}
