// rust/arc-data-core/src/lib.rs

//! ARC task datasets - Core Library
//!
//! This crate downloads the published Parquet shards of an ARC-style grid
//! puzzle dataset into a local cache, loads them eagerly or as a stream of
//! `(id, task)` samples, exports tasks back to shards and renders single
//! tasks as images.

pub mod config;
pub mod error;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::DataConfig;
pub use error::{DataError, Result};
pub use storage::{
    CacheEntry, LocalStorage, MemoryStorage, StorageBackend, StorageReader, StorageWriter,
};

pub mod codec;
pub mod task;
pub use task::{Color, Grid, Pair, Sample, Task, PALETTE_SIZE};

pub mod fetch;
pub use fetch::{FetchReport, RecordFetcher, RecordSource};

pub mod dataset;
pub use dataset::{scan_shards, write_shard, SampleStream, ShardManifest, ShardWriteOptions};

pub mod loader;
pub use loader::{DatasetLoader, LoadMode, LoadRequest, Loaded};

pub mod render;
pub use render::{render_task, save_task, RenderOptions};

pub mod progress;

#[cfg(test)]
mod testing;
