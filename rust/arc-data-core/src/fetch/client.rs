// rust/arc-data-core/src/fetch/client.rs

use std::io::{Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use reqwest::blocking::{Client, Response};
use tracing::{debug, info};

use super::metadata::{RecordFile, RecordMetadata};
use super::{FetchReport, FetchedFile, RecordSource};
use crate::config::RemoteConfig;
use crate::error::{DataError, Result};
use crate::progress::bytes_bar;
use crate::storage::{LocalStorage, StorageBackend};

/// Blocking HTTP client for the remote record archive.
pub struct RecordFetcher {
    client: Client,
    base_url: String,
    access_token: Option<String>,
    metadata_timeout: Duration,
    chunk_size: usize,
    show_progress: bool,
}

impl RecordFetcher {
    /// Creates a fetcher for the endpoint selected by `remote`.
    ///
    /// The client-wide timeout bounds each blocking wait (sending a request,
    /// every body read) separately, so `download_timeout_secs` limits idle
    /// gaps rather than the length of a transfer. The metadata request also
    /// carries an overall deadline.
    ///
    /// # Errors
    ///
    /// Returns a `Network` error if the HTTP client cannot be built.
    pub fn new(remote: &RemoteConfig, show_progress: bool) -> Result<Self> {
        let base_url = remote.endpoint().to_string();
        let mut builder = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(remote.connect_timeout_secs))
            .timeout(Duration::from_secs(remote.download_timeout_secs));
        if !remote.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build().map_err(|e| {
            DataError::network_with_source(&base_url, "failed to build HTTP client", e)
        })?;

        Ok(Self {
            client,
            base_url,
            access_token: remote.access_token.clone(),
            metadata_timeout: Duration::from_secs(remote.metadata_timeout_secs),
            chunk_size: remote.chunk_size.max(1),
            show_progress,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn metadata_url(&self, record_id: u64) -> String {
        format!("{}/api/records/{record_id}", self.base_url)
    }

    /// Requests the metadata of a record.
    ///
    /// # Errors
    ///
    /// Returns a `Network` error on transport failure, a non-success status
    /// or an unparseable body.
    pub fn fetch_metadata(&self, record_id: u64) -> Result<RecordMetadata> {
        let url = self.metadata_url(record_id);
        debug!("Requesting record metadata from {}", url);

        let response = self.get(&url, Some(self.metadata_timeout))?;
        response.json::<RecordMetadata>().map_err(|e| {
            DataError::network_with_source(&url, "failed to parse record metadata", e)
        })
    }

    /// Streams one file into `storage` under its key, replacing any existing
    /// object. Returns the file's report entry.
    ///
    /// # Errors
    ///
    /// Returns a `Network` error if the request or the body transfer fails,
    /// or a `Storage` error if the destination cannot be written.
    pub fn download_file(
        &self,
        file: &RecordFile,
        storage: &dyn StorageBackend,
    ) -> Result<FetchedFile> {
        let url = &file.links.download;
        if !file.has_safe_key() {
            return Err(DataError::network(
                url,
                format!("refusing to write file with unsafe name '{}'", file.key),
            ));
        }

        let mut response = self.get(url, None)?;
        let advertised = response.content_length().unwrap_or(0);
        let bar = bytes_bar(advertised, &file.key, self.show_progress);

        let dest = Path::new(&file.key);
        let mut writer = storage.open_write(dest)?;
        let mut buf = vec![0u8; self.chunk_size];
        let mut written = 0u64;

        loop {
            let n = response.read(&mut buf).map_err(|e| {
                DataError::network_with_source(
                    url,
                    format!("transfer interrupted after {written} bytes"),
                    e,
                )
            })?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).map_err(|e| {
                DataError::storage_with_source(dest, "failed to write downloaded bytes", e)
            })?;
            written += n as u64;
            bar.inc(n as u64);
        }

        writer.finish()?;
        bar.finish_and_clear();

        Ok(FetchedFile {
            name: file.key.clone(),
            bytes: written,
            advertised,
        })
    }

    /// Fetches `record_id` into a local directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or any request
    /// fails.
    pub fn fetch_into(&self, record_id: u64, out_dir: impl AsRef<Path>) -> Result<FetchReport> {
        let storage = LocalStorage::at(out_dir.as_ref())?;
        self.fetch_record(record_id, &storage)
    }

    // `deadline` caps the whole exchange, body included.
    fn get(&self, url: &str, deadline: Option<Duration>) -> Result<Response> {
        let mut request = self.client.get(url);
        if let Some(deadline) = deadline {
            request = request.timeout(deadline);
        }
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .map_err(|e| DataError::network_with_source(url, "request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DataError::network(url, format!("server returned HTTP {status}")));
        }
        Ok(response)
    }
}

impl RecordSource for RecordFetcher {
    fn fetch_record(&self, record_id: u64, storage: &dyn StorageBackend) -> Result<FetchReport> {
        let start = Instant::now();
        let metadata = self.fetch_metadata(record_id)?;
        info!(
            "Record {} lists {} file(s) at {}",
            record_id,
            metadata.files.len(),
            self.base_url
        );

        let mut report = FetchReport {
            record_id,
            files: Vec::with_capacity(metadata.files.len()),
        };
        for file in &metadata.files {
            info!("Downloading {}", file.key);
            let fetched = self.download_file(file, storage)?;
            debug!("Wrote {} bytes to {}", fetched.bytes, fetched.name);
            report.files.push(fetched);
        }

        info!(
            "Fetched record {} ({} bytes) in {:.2?}",
            record_id,
            report.total_bytes(),
            start.elapsed()
        );
        Ok(report)
    }
}
