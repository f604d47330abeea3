// rust/arc-data-core/src/config.rs

//! Configuration management for the dataset loader.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, and validation of configuration values.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{DataError, Result};

/// Zenodo record holding the published shards.
pub const DEFAULT_RECORD_ID: u64 = 18508333;

/// Production archive endpoint.
pub const PRODUCTION_BASE_URL: &str = "https://zenodo.org";

/// Sandbox archive endpoint.
pub const SANDBOX_BASE_URL: &str = "https://sandbox.zenodo.org";

/// Rows per record batch when nothing else is configured.
pub const DEFAULT_BATCH_SIZE: usize = 128;

/// Partitions published in the default record.
pub const DEFAULT_PARTITIONS: [&str; 6] = [
    "automata",
    "dsl_random",
    "dsl_deterministic",
    "rearc",
    "seeds_original",
    "seeds_additional",
];

// Top-level loader configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub storage: StorageConfig,
    pub remote: RemoteConfig,
    pub dataset: DatasetConfig,
}

// Local cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    // Cache root holding the shard files.
    pub base_path: PathBuf,
    // Buffer size in bytes for I/O operations.
    pub buffer_size: usize,
    // Whether to use memory-mapped reads for large shards.
    pub use_mmap: bool,
    // File size threshold (bytes) above which to use mmap.
    pub mmap_threshold: u64,
}

/// Remote archive configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Record holding the shard files.
    pub record_id: u64,
    /// Use the sandbox endpoint instead of production.
    pub use_sandbox: bool,
    /// Explicit endpoint, takes precedence over `use_sandbox`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Bearer token sent with every request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Timeout for establishing a connection, in seconds.
    pub connect_timeout_secs: u64,
    /// Deadline for the whole metadata request, in seconds.
    pub metadata_timeout_secs: u64,
    /// Longest wait for the next bytes of a download, in seconds. A slow
    /// transfer that keeps making progress is never cut off.
    pub download_timeout_secs: u64,
    /// Read size in bytes while streaming a download.
    pub chunk_size: usize,
    /// Honour HTTP(S)_PROXY and friends.
    pub use_system_proxy: bool,
}

/// A named partition and the shard files that make it up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionConfig {
    pub name: String,
    pub shards: Vec<String>,
}

impl PartitionConfig {
    /// Partition stored as a single `<name>.parquet` shard.
    pub fn single(name: impl Into<String>) -> Self {
        let name = name.into();
        let shard = format!("{name}.parquet");
        Self {
            name,
            shards: vec![shard],
        }
    }
}

/// Shard compression used when exporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShardCompression {
    #[default]
    Snappy,
    None,
}

impl FromStr for ShardCompression {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "snappy" => Ok(Self::Snappy),
            "none" | "uncompressed" => Ok(Self::None),
            other => Err(DataError::config(format!(
                "unknown shard compression '{other}', expected 'snappy' or 'none'"
            ))),
        }
    }
}

// Dataset configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    // Rows per batch in lazy mode.
    pub batch_size: usize,
    // Draw progress bars while fetching and reading.
    pub show_progress: bool,
    // Compression for exported shards.
    pub compression: ShardCompression,
    // Known partitions, in load order.
    pub partitions: Vec<PartitionConfig>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("./dataset"),
            buffer_size: 64 * 1024, // 64 KB
            use_mmap: true,
            mmap_threshold: 1024 * 1024, // 1 MB
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            record_id: DEFAULT_RECORD_ID,
            use_sandbox: false,
            base_url: None,
            access_token: None,
            connect_timeout_secs: 30,
            metadata_timeout_secs: 60,
            download_timeout_secs: 300,
            chunk_size: 1024 * 1024, // 1 MB
            use_system_proxy: true,
        }
    }
}

impl RemoteConfig {
    /// Endpoint used for metadata requests.
    pub fn endpoint(&self) -> &str {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/'),
            None if self.use_sandbox => SANDBOX_BASE_URL,
            None => PRODUCTION_BASE_URL,
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            show_progress: true,
            compression: ShardCompression::Snappy,
            partitions: DEFAULT_PARTITIONS
                .iter()
                .map(|name| PartitionConfig::single(*name))
                .collect(),
        }
    }
}

impl FromStr for DataConfig {
    type Err = DataError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| DataError::config_with_source("failed to parse TOML config", e))
    }
}

impl DataConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DataError::storage_with_source(path, "failed to read config file", e)
        })?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Environment variables are prefixed with `ARC_` and use underscores
    // to separate nested fields. For example:
    // - `ARC_STORAGE_BASE_PATH` overrides `storage.base_path`
    // - `ARC_REMOTE_RECORD_ID` overrides `remote.record_id`
    // - `ARC_DATASET_PARTITIONS` replaces the partition list ("a,b,c")
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        // Storage overrides
        if let Ok(val) = std::env::var("ARC_STORAGE_BASE_PATH") {
            self.storage.base_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("ARC_STORAGE_BUFFER_SIZE") {
            if let Ok(v) = val.parse() {
                self.storage.buffer_size = v;
            }
        }
        if let Ok(val) = std::env::var("ARC_STORAGE_USE_MMAP") {
            if let Ok(v) = val.parse() {
                self.storage.use_mmap = v;
            }
        }

        // Remote overrides
        if let Ok(val) = std::env::var("ARC_REMOTE_RECORD_ID") {
            if let Ok(v) = val.parse() {
                self.remote.record_id = v;
            }
        }
        if let Ok(val) = std::env::var("ARC_REMOTE_USE_SANDBOX") {
            if let Ok(v) = val.parse() {
                self.remote.use_sandbox = v;
            }
        }
        if let Ok(val) = std::env::var("ARC_REMOTE_BASE_URL") {
            self.remote.base_url = Some(val);
        }
        if let Ok(val) = std::env::var("ARC_REMOTE_ACCESS_TOKEN") {
            self.remote.access_token = Some(val);
        }

        // Dataset overrides
        if let Ok(val) = std::env::var("ARC_DATASET_BATCH_SIZE") {
            if let Ok(v) = val.parse() {
                self.dataset.batch_size = v;
            }
        }
        if let Ok(val) = std::env::var("ARC_DATASET_SHOW_PROGRESS") {
            if let Ok(v) = val.parse() {
                self.dataset.show_progress = v;
            }
        }
        if let Ok(val) = std::env::var("ARC_DATASET_PARTITIONS") {
            let partitions: Vec<PartitionConfig> = val
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(PartitionConfig::single)
                .collect();
            if !partitions.is_empty() {
                self.dataset.partitions = partitions;
            }
        }

        self
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        // Storage validation
        if self.storage.buffer_size == 0 {
            return Err(DataError::config(
                "storage.buffer_size must be greater than 0",
            ));
        }

        // Remote validation
        if self.remote.record_id == 0 {
            return Err(DataError::config(
                "remote.record_id must be greater than 0",
            ));
        }
        if self.remote.chunk_size == 0 {
            return Err(DataError::config(
                "remote.chunk_size must be greater than 0",
            ));
        }
        if self.remote.connect_timeout_secs == 0
            || self.remote.metadata_timeout_secs == 0
            || self.remote.download_timeout_secs == 0
        {
            return Err(DataError::config(
                "remote timeouts must be greater than 0",
            ));
        }
        if let Some(url) = &self.remote.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(DataError::config(format!(
                    "remote.base_url must be an http(s) URL, got '{url}'"
                )));
            }
        }

        // Dataset validation
        if self.dataset.batch_size == 0 {
            return Err(DataError::config(
                "dataset.batch_size must be greater than 0",
            ));
        }
        if self.dataset.partitions.is_empty() {
            return Err(DataError::config(
                "dataset.partitions must list at least one partition",
            ));
        }

        let mut seen = HashSet::new();
        for partition in &self.dataset.partitions {
            if partition.name.is_empty() {
                return Err(DataError::config("partition names must not be empty"));
            }
            if !seen.insert(partition.name.as_str()) {
                return Err(DataError::config(format!(
                    "partition '{}' is listed more than once",
                    partition.name
                )));
            }
            if partition.shards.is_empty() {
                return Err(DataError::config(format!(
                    "partition '{}' must list at least one shard",
                    partition.name
                )));
            }
        }

        Ok(())
    }
}
