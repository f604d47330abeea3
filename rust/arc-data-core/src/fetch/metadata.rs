// rust/arc-data-core/src/fetch/metadata.rs

//! Record metadata returned by `GET {base}/api/records/{id}`.

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

/// The parts of a record the fetcher needs. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub files: Vec<RecordFile>,
}

/// One downloadable file of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFile {
    /// File name, used as the destination path under the cache root.
    pub key: String,
    /// Advertised size in bytes, when the archive reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub links: FileLinks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLinks {
    /// Direct download URL.
    #[serde(rename = "self")]
    pub download: String,
}

impl RecordFile {
    /// Whether `key` stays inside the destination directory.
    pub fn has_safe_key(&self) -> bool {
        let path = Path::new(&self.key);
        !self.key.is_empty()
            && path
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    }
}
