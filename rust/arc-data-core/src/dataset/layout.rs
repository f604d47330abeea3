// rust/arc-data-core/src/dataset/layout.rs

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::{PartitionConfig, DEFAULT_PARTITIONS};
use crate::error::{DataError, Result};
use crate::storage::StorageBackend;

/// Ordered mapping from partition name to the shard files that make it up.
///
/// Shard paths are relative to the cache root. Order is significant: it is
/// the order in which samples are produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardManifest {
    partitions: Vec<PartitionConfig>,
}

impl ShardManifest {
    pub fn new(partitions: Vec<PartitionConfig>) -> Self {
        Self { partitions }
    }

    pub fn from_config(partitions: &[PartitionConfig]) -> Self {
        Self::new(partitions.to_vec())
    }

    pub fn partition_names(&self) -> impl Iterator<Item = &str> {
        self.partitions.iter().map(|p| p.name.as_str())
    }

    pub fn contains(&self, partition: &str) -> bool {
        self.partitions.iter().any(|p| p.name == partition)
    }

    /// Shards of one partition, or of every partition in manifest order.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if `partition` is not in the manifest.
    pub fn select(&self, partition: Option<&str>) -> Result<Vec<PathBuf>> {
        match partition {
            None => Ok(self.expected_shards()),
            Some(name) => {
                let found = self
                    .partitions
                    .iter()
                    .find(|p| p.name == name)
                    .ok_or_else(|| {
                        let known: Vec<&str> = self.partition_names().collect();
                        DataError::config(format!(
                            "unknown partition '{name}', expected one of: {}",
                            known.join(", ")
                        ))
                    })?;
                Ok(found.shards.iter().map(PathBuf::from).collect())
            }
        }
    }

    /// Every shard the cache must hold, first occurrence order, no repeats.
    pub fn expected_shards(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        self.partitions
            .iter()
            .flat_map(|p| p.shards.iter())
            .filter(|shard| seen.insert(shard.as_str()))
            .map(PathBuf::from)
            .collect()
    }
}

impl Default for ShardManifest {
    fn default() -> Self {
        Self::new(
            DEFAULT_PARTITIONS
                .iter()
                .map(|name| PartitionConfig::single(*name))
                .collect(),
        )
    }
}

/// Lists the files directly under `dir` whose name contains `partition`.
///
/// With no partition every file is returned. Directories are skipped. The
/// result follows the backend's sorted listing order.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed.
pub fn scan_shards(
    storage: &dyn StorageBackend,
    dir: &Path,
    partition: Option<&str>,
) -> Result<Vec<PathBuf>> {
    let mut shards = Vec::new();
    for entry in storage.list(dir)? {
        if entry.is_dir || partition.is_some_and(|p| !entry.name.contains(p)) {
            continue;
        }
        shards.push(dir.join(&entry.name));
    }
    Ok(shards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn manifest() -> ShardManifest {
        ShardManifest::new(vec![
            PartitionConfig::single("automata"),
            PartitionConfig {
                name: "rearc".to_string(),
                shards: vec!["rearc-0.parquet".to_string(), "rearc-1.parquet".to_string()],
            },
        ])
    }

    #[test]
    fn test_default_manifest() {
        let manifest = ShardManifest::default();
        let names: Vec<&str> = manifest.partition_names().collect();
        assert_eq!(
            names,
            [
                "automata",
                "dsl_random",
                "dsl_deterministic",
                "rearc",
                "seeds_original",
                "seeds_additional",
            ]
        );
        assert_eq!(
            manifest.select(Some("dsl_random")).unwrap(),
            [PathBuf::from("dsl_random.parquet")]
        );
        assert_eq!(
            manifest.select(Some("seeds_original")).unwrap(),
            [PathBuf::from("seeds_original.parquet")]
        );
        assert_eq!(manifest.expected_shards().len(), 6);
    }

    #[test]
    fn test_select_all_in_order() {
        let shards = manifest().select(None).unwrap();
        assert_eq!(
            shards,
            [
                PathBuf::from("automata.parquet"),
                PathBuf::from("rearc-0.parquet"),
                PathBuf::from("rearc-1.parquet"),
            ]
        );
    }

    #[test]
    fn test_select_unknown_partition() {
        let err = manifest().select(Some("bogus")).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("bogus"));
        assert!(err.to_string().contains("automata, rearc"));
    }

    #[test]
    fn test_expected_shards_deduplicates() {
        let manifest = ShardManifest::new(vec![
            PartitionConfig::single("a"),
            PartitionConfig {
                name: "b".to_string(),
                shards: vec!["a.parquet".to_string(), "b.parquet".to_string()],
            },
        ]);
        assert_eq!(
            manifest.expected_shards(),
            [PathBuf::from("a.parquet"), PathBuf::from("b.parquet")]
        );
        // Selection keeps the partition's own list
        assert_eq!(manifest.select(Some("b")).unwrap().len(), 2);
    }

    #[test]
    fn test_scan_shards_substring_match() {
        let storage = MemoryStorage::new();
        storage.insert("cache/rearc.parquet", b"x".to_vec());
        storage.insert("cache/automata.parquet", b"x".to_vec());
        storage.insert("cache/dsl_random.parquet", b"x".to_vec());
        storage.insert("cache/dsl_deterministic.parquet", b"x".to_vec());
        storage.insert("cache/nested/dsl_extra.parquet", b"x".to_vec());

        let dir = Path::new("cache");
        let dsl = scan_shards(&storage, dir, Some("dsl")).unwrap();
        assert_eq!(
            dsl,
            [
                dir.join("dsl_deterministic.parquet"),
                dir.join("dsl_random.parquet"),
            ]
        );

        let all = scan_shards(&storage, dir, None).unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0], dir.join("automata.parquet"));

        assert!(scan_shards(&storage, dir, Some("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_scan_missing_directory_is_empty() {
        let storage = MemoryStorage::new();
        assert!(scan_shards(&storage, Path::new("nowhere"), None).unwrap().is_empty());
    }
}
