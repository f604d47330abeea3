// rust/arc-data-core/src/codec.rs

//! Textual encoding of a [`Task`] for storage in a single shard cell.
//!
//! Tasks are stored as compact JSON. Field order is fixed by the data model
//! (`train`, `test`, `input`, `output`) and a pair without an output omits the
//! field entirely, so `decode(encode(t)) == t` for every task.

use std::path::Path;

use crate::error::{DataError, Result};
use crate::task::Task;

/// Encodes a task as compact JSON.
///
/// # Errors
///
/// Returns a `Serialization` error if the task cannot be encoded.
pub fn encode(task: &Task) -> Result<String> {
    serde_json::to_string(task)
        .map_err(|e| DataError::serialization(format!("failed to encode task: {e}")))
}

/// Decodes a task from its JSON text.
///
/// No structural validation beyond the typed model is performed; see
/// [`Task::validate`].
///
/// # Errors
///
/// Returns a `Decode` error if the text is not a valid encoded task.
pub fn decode(text: &str) -> Result<Task> {
    serde_json::from_str(text).map_err(|e| DataError::decode("task payload", e))
}

/// Decodes the payload found at `row` of `shard`, naming both on failure.
pub(crate) fn decode_row(text: &str, shard: &Path, row: u64) -> Result<Task> {
    serde_json::from_str(text)
        .map_err(|e| DataError::decode(format!("'{}' row {row}", shard.display()), e))
}
