// rust/arc-data-core/src/loader.rs

//! Dataset loading entry point.
//!
//! The loader ties together the cache, the record source and the shard
//! readers: it validates the request, makes sure every known shard is in the
//! cache (fetching the whole record once if any is missing), then reads the
//! requested partition eagerly or hands back a [`SampleStream`].
//!
//! # Example
//!
//! ```no_run
//! use arc_data_core::{DatasetLoader, LoadRequest, Loaded};
//!
//! let loader = DatasetLoader::new()?;
//!
//! match loader.load(&LoadRequest::lazy().with_partition("rearc"))? {
//!     Loaded::Lazy(stream) => {
//!         for sample in stream {
//!             let (id, task) = sample?;
//!             println!("{id}: {} test pairs", task.test.len());
//!         }
//!     }
//!     Loaded::Eager(samples) => println!("{} samples", samples.len()),
//! }
//! # Ok::<(), arc_data_core::DataError>(())
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

pub use crate::config::DEFAULT_BATCH_SIZE;
use crate::config::DataConfig;
use crate::dataset::{read_all, SampleStream, ShardManifest};
use crate::error::{DataError, Result};
use crate::fetch::{FetchReport, RecordFetcher, RecordSource};
use crate::storage::{LocalStorage, StorageBackend};
use crate::task::Sample;

/// How samples are delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadMode {
    /// Decode everything up front.
    #[default]
    Eager,
    /// Stream samples one record batch at a time.
    Lazy,
}

/// Parameters of a single load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub mode: LoadMode,
    /// Rows per record batch in lazy mode. Must be positive in both modes.
    pub batch_size: usize,
    /// Partition to load; `None` loads every partition in manifest order.
    pub partition: Option<String>,
}

impl Default for LoadRequest {
    fn default() -> Self {
        Self {
            mode: LoadMode::Eager,
            batch_size: DEFAULT_BATCH_SIZE,
            partition: None,
        }
    }
}

impl LoadRequest {
    pub fn eager() -> Self {
        Self::default()
    }

    pub fn lazy() -> Self {
        Self {
            mode: LoadMode::Lazy,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// Result of [`DatasetLoader::load`].
#[derive(Debug)]
pub enum Loaded {
    Eager(Vec<Sample>),
    Lazy(SampleStream),
}

impl Loaded {
    /// Collects the samples, draining the stream in lazy mode.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by the stream.
    pub fn into_samples(self) -> Result<Vec<Sample>> {
        match self {
            Self::Eager(samples) => Ok(samples),
            Self::Lazy(stream) => stream.collect(),
        }
    }
}

/// Loads samples from the local cache, populating it from the remote record
/// when shards are missing.
pub struct DatasetLoader {
    config: DataConfig,
    manifest: ShardManifest,
    storage: Arc<dyn StorageBackend>,
    source: Box<dyn RecordSource>,
}

impl DatasetLoader {
    /// Creates a loader with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory or HTTP client cannot be set up.
    pub fn new() -> Result<Self> {
        Self::from_config(DataConfig::default())
    }

    /// Creates a loader from a TOML configuration file, with environment
    /// overrides applied after loading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or is invalid.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = DataConfig::from_file(path)?.with_env_overrides();
        Self::from_config(config)
    }

    /// Creates a loader backed by the local cache and the HTTP fetcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a component
    /// cannot be initialized.
    pub fn from_config(config: DataConfig) -> Result<Self> {
        config.validate()?;
        let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(&config.storage)?);
        let source = RecordFetcher::new(&config.remote, config.dataset.show_progress)?;
        Self::with_parts(config, storage, Box::new(source))
    }

    /// Creates a loader from explicit parts.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the configuration is invalid.
    pub fn with_parts(
        config: DataConfig,
        storage: Arc<dyn StorageBackend>,
        source: Box<dyn RecordSource>,
    ) -> Result<Self> {
        config.validate()?;
        let manifest = ShardManifest::from_config(&config.dataset.partitions);
        Ok(Self {
            config,
            manifest,
            storage,
            source,
        })
    }

    /// A request over every partition in `mode`, batched as configured by
    /// `dataset.batch_size`.
    pub fn request(&self, mode: LoadMode) -> LoadRequest {
        LoadRequest {
            mode,
            batch_size: self.config.dataset.batch_size,
            partition: None,
        }
    }

    /// Loads samples as described by `request`.
    ///
    /// The batch size and partition are checked before any I/O.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error for an invalid request, any error from
    /// fetching the record, and in eager mode any error from reading shards.
    pub fn load(&self, request: &LoadRequest) -> Result<Loaded> {
        let partition = request.partition.as_deref();
        let shards = self.prepare(partition, request.batch_size)?;

        match request.mode {
            LoadMode::Eager => {
                info!(
                    "Loading {} ({} shard(s))",
                    partition.unwrap_or("all partitions"),
                    shards.len()
                );
                let samples = read_all(
                    self.storage.as_ref(),
                    &shards,
                    self.config.dataset.show_progress,
                )?;
                Ok(Loaded::Eager(samples))
            }
            LoadMode::Lazy => self.stream(partition, shards, request.batch_size).map(Loaded::Lazy),
        }
    }

    /// Loads every sample of `partition` (or of all partitions) into memory.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn load_eager(&self, partition: Option<&str>) -> Result<Vec<Sample>> {
        let request = LoadRequest {
            partition: partition.map(str::to_string),
            ..self.request(LoadMode::Eager)
        };
        self.load(&request)?.into_samples()
    }

    /// Opens a stream over `partition` (or all partitions).
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn load_lazy(&self, partition: Option<&str>, batch_size: usize) -> Result<SampleStream> {
        let shards = self.prepare(partition, batch_size)?;
        self.stream(partition, shards, batch_size)
    }

    /// Shards of the manifest that are not in the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if an existence check fails.
    pub fn missing_shards(&self) -> Result<Vec<PathBuf>> {
        let mut missing = Vec::new();
        for shard in self.manifest.expected_shards() {
            if !self.storage.exists(&shard)? {
                missing.push(shard);
            }
        }
        Ok(missing)
    }

    /// Fetches the configured record if any known shard is missing.
    ///
    /// Returns the fetch report, or `None` when the cache was complete.
    ///
    /// # Errors
    ///
    /// Returns any fetch error, or a `Storage` error if shards are still
    /// missing after the record was fetched.
    pub fn ensure_available(&self) -> Result<Option<FetchReport>> {
        let missing = self.missing_shards()?;
        if missing.is_empty() {
            return Ok(None);
        }

        let record_id = self.config.remote.record_id;
        warn!(
            "{} shard(s) missing from cache (first: {}), fetching record {}",
            missing.len(),
            missing[0].display(),
            record_id
        );
        let report = self.source.fetch_record(record_id, self.storage.as_ref())?;

        if let Some(still_missing) = self.missing_shards()?.into_iter().next() {
            return Err(DataError::storage(
                still_missing,
                format!("shard not provided by record {record_id}"),
            ));
        }
        Ok(Some(report))
    }

    // Request errors surface before any cache or network access.
    fn prepare(&self, partition: Option<&str>, batch_size: usize) -> Result<Vec<PathBuf>> {
        if batch_size == 0 {
            return Err(DataError::config("batch_size must be greater than 0"));
        }
        let shards = self.manifest.select(partition)?;
        self.ensure_available()?;
        Ok(shards)
    }

    fn stream(
        &self,
        partition: Option<&str>,
        shards: Vec<PathBuf>,
        batch_size: usize,
    ) -> Result<SampleStream> {
        info!(
            "Streaming {} ({} shard(s), batch size {})",
            partition.unwrap_or("all partitions"),
            shards.len(),
            batch_size
        );
        SampleStream::new(Arc::clone(&self.storage), shards, batch_size)
    }

    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    pub fn manifest(&self) -> &ShardManifest {
        &self.manifest
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_PARTITIONS;
    use crate::storage::MemoryStorage;
    use crate::testing::{self, FakeSource};

    fn quiet_config() -> DataConfig {
        let mut config = DataConfig::default();
        config.dataset.show_progress = false;
        config
    }

    /// One shard per default partition, `n + 2` samples in the n-th.
    fn record_files() -> Vec<(String, Vec<u8>)> {
        DEFAULT_PARTITIONS
            .iter()
            .enumerate()
            .map(|(n, name)| {
                let samples = testing::samples(name, n + 2);
                (format!("{name}.parquet"), testing::shard_bytes(&samples))
            })
            .collect()
    }

    fn loader_with(storage: &MemoryStorage, source: &FakeSource) -> DatasetLoader {
        DatasetLoader::with_parts(
            quiet_config(),
            Arc::new(storage.clone()),
            Box::new(source.clone()),
        )
        .unwrap()
    }

    #[test]
    fn test_every_partition_loads() {
        let storage = MemoryStorage::new();
        let source = FakeSource::new(record_files());
        let loader = loader_with(&storage, &source);

        for name in DEFAULT_PARTITIONS {
            let samples = loader.load_eager(Some(name)).unwrap();
            assert!(!samples.is_empty(), "partition {name} is empty");
            for (id, task) in &samples {
                assert!(id.starts_with(name));
                assert!(!task.train.is_empty());
                assert!(!task.test.is_empty());
            }
        }
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn test_all_partitions_is_sum_of_parts() {
        let storage = MemoryStorage::new();
        let source = FakeSource::new(record_files());
        let loader = loader_with(&storage, &source);

        let all = loader.load_eager(None).unwrap();
        let sum: usize = DEFAULT_PARTITIONS
            .iter()
            .map(|name| loader.load_eager(Some(name)).unwrap().len())
            .sum();
        assert_eq!(all.len(), sum);
        assert_eq!(all[0].0, "automata-0");
    }

    #[test]
    fn test_lazy_matches_eager() {
        let storage = MemoryStorage::new();
        let source = FakeSource::new(record_files());
        let loader = loader_with(&storage, &source);

        let eager = loader.load(&LoadRequest::eager()).unwrap().into_samples().unwrap();
        let lazy: Vec<Sample> = loader
            .load_lazy(None, 2)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(lazy, eager);

        let partition = loader
            .load(&LoadRequest::lazy().with_partition("rearc").with_batch_size(1))
            .unwrap()
            .into_samples()
            .unwrap();
        assert_eq!(partition, loader.load_eager(Some("rearc")).unwrap());
    }

    #[test]
    fn test_seed_partitions_load() {
        let storage = MemoryStorage::new();
        let source = FakeSource::new(record_files());
        let loader = loader_with(&storage, &source);

        let original = loader.load_eager(Some("seeds_original")).unwrap();
        assert!(original.iter().all(|(id, _)| id.starts_with("seeds_original")));
        let additional = loader.load_lazy(Some("seeds_additional"), 3).unwrap();
        assert_eq!(additional.shards(), [PathBuf::from("seeds_additional.parquet")]);
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn test_request_uses_configured_batch_size() {
        let mut config = quiet_config();
        config.dataset.batch_size = 3;
        let source = FakeSource::new(record_files());
        let loader = DatasetLoader::with_parts(
            config,
            Arc::new(MemoryStorage::new()),
            Box::new(source.clone()),
        )
        .unwrap();

        let request = loader.request(LoadMode::Lazy);
        assert_eq!(request.batch_size, 3);
        assert_eq!(request.mode, LoadMode::Lazy);
        assert!(request.partition.is_none());
        assert_eq!(loader.request(LoadMode::Eager).batch_size, 3);

        let lazy = loader.load(&request).unwrap().into_samples().unwrap();
        assert_eq!(lazy, loader.load_eager(None).unwrap());
        assert_eq!(LoadRequest::default().batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_populated_cache_is_not_refetched() {
        let storage = MemoryStorage::new();
        let source = FakeSource::new(record_files());
        let loader = loader_with(&storage, &source);

        assert!(loader.ensure_available().unwrap().is_some());
        assert_eq!(source.calls(), 1);

        loader.load_eager(None).unwrap();
        loader.load_lazy(Some("automata"), 4).unwrap();
        assert!(loader.ensure_available().unwrap().is_none());
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn test_single_missing_shard_fetches_once() {
        let storage = MemoryStorage::new();
        for (name, data) in record_files() {
            storage.insert(name, data);
        }
        storage.remove("dsl_random.parquet");

        let source = FakeSource::new(record_files());
        let loader = loader_with(&storage, &source);
        assert_eq!(
            loader.missing_shards().unwrap(),
            [PathBuf::from("dsl_random.parquet")]
        );

        // Requesting another partition still repairs the whole cache
        loader.load_eager(Some("rearc")).unwrap();
        assert_eq!(source.calls(), 1);
        assert!(loader.missing_shards().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_partition_fails_before_io() {
        let storage = MemoryStorage::new();
        let source = FakeSource::failing();
        let loader = loader_with(&storage, &source);

        let err = loader
            .load(&LoadRequest::eager().with_partition("nonexistent"))
            .unwrap_err();
        assert!(err.is_config());
        assert_eq!(source.calls(), 0);

        let err = loader.load_lazy(Some("nonexistent"), 8).unwrap_err();
        assert!(err.is_config());
        assert_eq!(source.calls(), 0);
    }

    #[test]
    fn test_zero_batch_size_fails_before_io() {
        let storage = MemoryStorage::new();
        let source = FakeSource::failing();
        let loader = loader_with(&storage, &source);

        let err = loader.load(&LoadRequest::lazy().with_batch_size(0)).unwrap_err();
        assert!(err.is_config());
        assert_eq!(source.calls(), 0);
    }

    #[test]
    fn test_fetch_failure_propagates() {
        let storage = MemoryStorage::new();
        let source = FakeSource::failing();
        let loader = loader_with(&storage, &source);

        let err = loader.load_eager(None).unwrap_err();
        assert!(err.is_network());
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn test_record_without_expected_shard() {
        let storage = MemoryStorage::new();
        let mut files = record_files();
        files.retain(|(name, _)| name != "rearc.parquet");
        let source = FakeSource::new(files);
        let loader = loader_with(&storage, &source);

        let err = loader.load_eager(Some("automata")).unwrap_err();
        assert!(matches!(err, DataError::Storage { .. }));
        assert!(err.to_string().contains("rearc.parquet"));
    }

    #[test]
    fn test_malformed_shard_eager_vs_lazy() {
        let storage = MemoryStorage::new();
        for (name, data) in record_files() {
            storage.insert(name, data);
        }
        let good = crate::codec::encode(&testing::task(0)).unwrap();
        storage.insert(
            "rearc.parquet",
            testing::raw_shard(&[("rearc-0", good.as_str()), ("rearc-1", "garbage")]),
        );
        let loader = loader_with(&storage, &FakeSource::failing());

        assert!(loader.load_eager(Some("rearc")).unwrap_err().is_decode());

        let mut stream = loader.load_lazy(Some("rearc"), 8).unwrap();
        assert_eq!(stream.next().unwrap().unwrap().0, "rearc-0");
        assert!(stream.next().unwrap().unwrap_err().is_decode());
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_from_config_reads_local_cache() {
        let temp = tempfile::tempdir().unwrap();
        for (name, data) in record_files() {
            std::fs::write(temp.path().join(name), data).unwrap();
        }

        let mut config = quiet_config();
        config.storage.base_path = temp.path().to_path_buf();
        config.remote.use_system_proxy = false;
        let loader = DatasetLoader::from_config(config).unwrap();

        assert!(loader.missing_shards().unwrap().is_empty());
        assert_eq!(loader.load_eager(Some("automata")).unwrap().len(), 2);
    }

    #[test]
    fn test_with_parts_validates_config() {
        let mut config = quiet_config();
        config.dataset.batch_size = 0;
        let result = DatasetLoader::with_parts(
            config,
            Arc::new(MemoryStorage::new()),
            Box::new(FakeSource::failing()),
        );
        assert!(result.is_err());
    }
}
