//! Per-task persistent cache records.
//!
//! Each task that opted into caching gets one JSON file under `.pace-cache/`
//! recording the fingerprints of its command, inputs, outputs and dependency
//! outputs at the time of its last successful run.

/// File system store
mod fs;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
pub use fs::{CacheStore, CACHE_DIR_NAME};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed cache record: {0}")]
    InvalidRecord(#[from] serde_json::Error),
}

/// The persisted state of one task's last successful run.
///
/// The JSON layout is stable and human-readable; `last_run_time` serializes
/// as an RFC 3339 timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub task_name: String,
    pub inputs_hash: String,
    pub outputs_hash: String,
    pub last_run_time: DateTime<Utc>,
    pub command_hash: String,
    pub dependencies: Vec<String>,
    /// Output fingerprint of every cached dependency at the time this task
    /// ran, keyed by dependency name.
    #[serde(default)]
    pub dep_hashes: BTreeMap<String, String>,
}
