// rust/arc-data-core/src/storage/memory.rs

//! Shard cache held in a map, for tests and fakes.
//!
//! Clones share the same map, so a test can hand one clone to a loader and
//! inspect or tamper with the cache through another.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::traits::{CacheEntry, StorageBackend, StorageReader, StorageWriter};
use crate::error::{DataError, Result};

type Shards = Arc<Mutex<BTreeMap<PathBuf, Arc<[u8]>>>>;

#[derive(Clone, Default)]
pub struct MemoryStorage {
    shards: Shards,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `data` at `path`, replacing any previous bytes.
    pub fn insert(&self, path: impl AsRef<Path>, data: impl Into<Vec<u8>>) {
        let data: Vec<u8> = data.into();
        self.lock().insert(key(path.as_ref()), Arc::from(data));
    }

    pub fn remove(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.lock().remove(&key(path.as_ref())).map(|data| data.to_vec())
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.lock().get(&key(path.as_ref())).map(|data| data.to_vec())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Arc<[u8]>>> {
        lock(&self.shards)
    }
}

// Entries are only ever replaced whole, so a poisoned map is still usable.
fn lock(shards: &Shards) -> MutexGuard<'_, BTreeMap<PathBuf, Arc<[u8]>>> {
    shards.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// "./a/b" and "a/b" name the same shard.
fn key(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_) | Component::ParentDir))
        .collect()
}

impl StorageBackend for MemoryStorage {
    fn exists(&self, path: &Path) -> Result<bool> {
        let wanted = key(path);
        Ok(self.lock().keys().any(|k| k.starts_with(&wanted)))
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>> {
        let data = self
            .lock()
            .get(&key(path))
            .cloned()
            .ok_or_else(|| DataError::storage(path, "shard not in cache"))?;
        Ok(Box::new(MemoryShard {
            data,
            path: path.to_path_buf(),
        }))
    }

    fn open_write(&self, path: &Path) -> Result<Box<dyn StorageWriter>> {
        Ok(Box::new(PendingShard {
            shards: Arc::clone(&self.shards),
            key: key(path),
            buffer: Vec::new(),
        }))
    }

    fn list(&self, dir: &Path) -> Result<Vec<CacheEntry>> {
        let dir = key(dir);
        let shards = self.lock();
        if shards.contains_key(&dir) && !dir.as_os_str().is_empty() {
            return Err(DataError::storage(&dir, "not a directory"));
        }

        let mut listed: Vec<CacheEntry> = Vec::new();
        for stored in shards.keys() {
            let Ok(rest) = stored.strip_prefix(&dir) else {
                continue;
            };
            let mut parts = rest.components();
            let Some(name) = parts.next().and_then(|c| c.as_os_str().to_str()) else {
                continue;
            };
            let is_dir = parts.next().is_some();
            if listed.last().is_some_and(|last| last.name == name) {
                continue;
            }
            listed.push(CacheEntry {
                name: name.to_string(),
                is_dir,
            });
        }
        Ok(listed)
    }
}

struct MemoryShard {
    data: Arc<[u8]>,
    path: PathBuf,
}

impl StorageReader for MemoryShard {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_range(&mut self, start: u64, length: usize) -> Result<Vec<u8>> {
        let range = usize::try_from(start)
            .ok()
            .and_then(|start| Some(start..start.checked_add(length)?));
        match range.and_then(|range| self.data.get(range)) {
            Some(bytes) => Ok(bytes.to_vec()),
            None => Err(DataError::storage(
                &self.path,
                format!("range {start}+{length} is past the end of a {} byte shard", self.data.len()),
            )),
        }
    }
}

/// Collects bytes until `finish` publishes them.
struct PendingShard {
    shards: Shards,
    key: PathBuf,
    buffer: Vec<u8>,
}

impl Write for PendingShard {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl StorageWriter for PendingShard {
    fn finish(self: Box<Self>) -> Result<()> {
        let PendingShard {
            shards,
            key,
            buffer,
        } = *self;
        lock(&shards).insert(key, buffer.into());
        Ok(())
    }
}
