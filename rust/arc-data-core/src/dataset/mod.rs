// rust/arc-data-core/src/dataset/mod.rs

//! Shard layout, reading and export.
//!
//! Shards are Parquet files with two string columns, `id` and `task`. The
//! eager reader decodes whole shards at once; [`SampleStream`] walks them a
//! record batch at a time.
//!
//! # Example
//!
//! ```no_run
//! use arc_data_core::dataset::{SampleStream, ShardManifest};
//! use arc_data_core::storage::LocalStorage;
//! use std::sync::Arc;
//!
//! let storage = Arc::new(LocalStorage::at("./dataset")?);
//! let shards = ShardManifest::default().select(Some("rearc"))?;
//!
//! for sample in SampleStream::new(storage, shards, 128)? {
//!     let (id, task) = sample?;
//!     println!("{id}: {} train pairs", task.train.len());
//! }
//! # Ok::<(), arc_data_core::DataError>(())
//! ```

mod layout;
mod reader;
mod shard;
mod stream;
mod writer;

pub use layout::{scan_shards, ShardManifest};
pub use reader::{read_all, read_shard};
pub use shard::{
    decode_shard, decode_shard_counted, footer_rows, open_batches, sample_at, ShardSource,
    ID_COLUMN, TASK_COLUMN,
};
pub use stream::{SampleStream, StreamState};
pub use writer::{shard_schema, write_shard, ShardWriteOptions};
