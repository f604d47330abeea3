// rust/arc-data-core/src/storage/mod.rs

//! Shard cache.
//!
//! The cache root is an explicit configuration value. Everything that reads
//! or writes shards goes through [`StorageBackend`], so tests inject
//! [`MemoryStorage`] instead of touching the filesystem.
//!
//! ```no_run
//! use arc_data_core::storage::{LocalStorage, StorageBackend};
//! use std::path::Path;
//!
//! let cache = LocalStorage::at("./dataset")?;
//! for entry in cache.list(Path::new(""))? {
//!     if !entry.is_dir {
//!         let size = cache.open_read(Path::new(&entry.name))?.size();
//!         println!("{} ({size} bytes)", entry.name);
//!     }
//! }
//! # Ok::<(), arc_data_core::DataError>(())
//! ```

mod local;
mod memory;
mod traits;

pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use traits::{CacheEntry, StorageBackend, StorageReader, StorageWriter};
