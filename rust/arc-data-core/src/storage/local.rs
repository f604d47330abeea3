// rust/arc-data-core/src/storage/local.rs

//! On-disk shard cache.
//!
//! Small shards are read with positioned reads on the open file. Shards at
//! or above `storage.mmap_threshold` are mapped once and sliced, which keeps
//! repeated column-chunk reads of a stream cheap.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use super::traits::{CacheEntry, StorageBackend, StorageReader, StorageWriter};
use crate::config::StorageConfig;
use crate::error::{DataError, Result};

/// Shard cache rooted at a local directory.
pub struct LocalStorage {
    root: PathBuf,
    write_buffer: usize,
    mmap_threshold: Option<u64>,
}

impl LocalStorage {
    /// Opens the cache at `config.base_path`, creating the directory.
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if the directory cannot be created.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let root = config.base_path.clone();
        fs::create_dir_all(&root).map_err(|e| {
            DataError::storage_with_source(&root, "failed to create cache directory", e)
        })?;

        Ok(Self {
            root,
            write_buffer: config.buffer_size.max(1),
            mmap_threshold: config.use_mmap.then_some(config.mmap_threshold),
        })
    }

    /// Cache rooted at `path` with default settings.
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if the directory cannot be created.
    pub fn at(path: impl Into<PathBuf>) -> Result<Self> {
        Self::new(&StorageConfig {
            base_path: path.into(),
            ..Default::default()
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.root
    }

    fn full(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl StorageBackend for LocalStorage {
    fn exists(&self, path: &Path) -> Result<bool> {
        let full = self.full(path);
        full.try_exists()
            .map_err(|e| DataError::storage_with_source(&full, "failed to check for shard", e))
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>> {
        let full = self.full(path);
        let file = File::open(&full)
            .map_err(|e| DataError::storage_with_source(&full, "failed to open shard", e))?;
        let size = file
            .metadata()
            .map_err(|e| DataError::storage_with_source(&full, "failed to stat shard", e))?
            .len();

        match self.mmap_threshold {
            Some(threshold) if size >= threshold && size > 0 => {
                // SAFETY: cached shards are replaced by truncating writes only
                // through `open_write`, never while a reader is alive.
                let map = unsafe { Mmap::map(&file) }
                    .map_err(|e| DataError::storage_with_source(&full, "failed to map shard", e))?;
                Ok(Box::new(MappedShard { map, path: full }))
            }
            _ => Ok(Box::new(FileShard {
                file,
                size,
                path: full,
            })),
        }
    }

    fn open_write(&self, path: &Path) -> Result<Box<dyn StorageWriter>> {
        let full = self.full(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                DataError::storage_with_source(parent, "failed to create shard directory", e)
            })?;
        }
        let file = File::create(&full)
            .map_err(|e| DataError::storage_with_source(&full, "failed to create shard", e))?;

        Ok(Box::new(ShardFileWriter {
            inner: BufWriter::with_capacity(self.write_buffer, file),
            path: full,
        }))
    }

    fn list(&self, dir: &Path) -> Result<Vec<CacheEntry>> {
        let full = self.full(dir);
        let entries = match fs::read_dir(&full) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(DataError::storage_with_source(&full, "failed to list directory", e))
            }
        };

        let mut listed = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| DataError::storage_with_source(&full, "failed to list directory", e))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let is_dir = entry
                .file_type()
                .map_err(|e| DataError::storage_with_source(entry.path(), "failed to stat entry", e))?
                .is_dir();
            listed.push(CacheEntry { name, is_dir });
        }
        listed.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listed)
    }
}

fn check_range(path: &Path, start: u64, length: usize, size: u64) -> Result<()> {
    match start.checked_add(length as u64) {
        Some(end) if end <= size => Ok(()),
        _ => Err(DataError::storage(
            path,
            format!("range {start}+{length} is past the end of a {size} byte shard"),
        )),
    }
}

struct FileShard {
    file: File,
    size: u64,
    path: PathBuf,
}

impl StorageReader for FileShard {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_range(&mut self, start: u64, length: usize) -> Result<Vec<u8>> {
        check_range(&self.path, start, length, self.size)?;
        let mut buf = vec![0u8; length];
        self.file
            .seek(SeekFrom::Start(start))
            .and_then(|_| self.file.read_exact(&mut buf))
            .map_err(|e| {
                DataError::storage_with_source(&self.path, format!("failed to read at {start}"), e)
            })?;
        Ok(buf)
    }
}

struct MappedShard {
    map: Mmap,
    path: PathBuf,
}

impl StorageReader for MappedShard {
    fn size(&self) -> u64 {
        self.map.len() as u64
    }

    fn read_range(&mut self, start: u64, length: usize) -> Result<Vec<u8>> {
        check_range(&self.path, start, length, self.size())?;
        let start = start as usize;
        Ok(self.map[start..start + length].to_vec())
    }
}

struct ShardFileWriter {
    inner: BufWriter<File>,
    path: PathBuf,
}

impl Write for ShardFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl StorageWriter for ShardFileWriter {
    fn finish(self: Box<Self>) -> Result<()> {
        let ShardFileWriter { inner, path } = *self;
        let file = inner.into_inner().map_err(|e| {
            DataError::storage_with_source(&path, "failed to flush shard", e.into_error())
        })?;
        file.sync_all()
            .map_err(|e| DataError::storage_with_source(&path, "failed to sync shard", e))
    }
}
