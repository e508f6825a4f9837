use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use tracing::debug;

use crate::{CacheRecord, Error};

pub const CACHE_DIR_NAME: &str = ".pace-cache";

/// Store for cache records, one JSON file per task.
///
/// The store is a plain value owned by whoever drives a run; a fresh store
/// sees exactly the files on disk and nothing else. Records for the same
/// task are serialized through a per-task lock, records for different tasks
/// are independent.
pub struct CacheStore {
    cache_directory: PathBuf,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl CacheStore {
    pub fn new(repo_root: &Path) -> Self {
        Self {
            cache_directory: repo_root.join(CACHE_DIR_NAME),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Load the record for `task_name`, or `None` if the task has never
    /// completed. Only a malformed record or an unreadable file is an error.
    pub async fn load(&self, task_name: &str) -> Result<Option<CacheRecord>, Error> {
        let lock = self.task_lock(task_name);
        let _guard = lock.lock().await;

        let path = self.record_path(task_name);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&data)?))
    }

    /// Persist `record` atomically: serialize to `<name>.json.tmp`, then
    /// rename over the final path so a crash mid-write leaves the previous
    /// record intact.
    pub async fn save(&self, record: &CacheRecord) -> Result<(), Error> {
        let lock = self.task_lock(&record.task_name);
        let _guard = lock.lock().await;

        fs::create_dir_all(&self.cache_directory)?;

        let path = self.record_path(&record.task_name);
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(record)?;
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;
        debug!("saved cache record for {}", record.task_name);
        Ok(())
    }

    fn record_path(&self, task_name: &str) -> PathBuf {
        self.cache_directory
            .join(format!("{}.json", sanitize_name(task_name)))
    }

    // Locks are created on demand and never evicted; the map is bounded by
    // the number of distinct task names in the config.
    fn task_lock(&self, task_name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("cache lock map poisoned");
        locks
            .entry(task_name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

// A task name may contain characters that are path separators on some
// platform. Mapping them out keeps every record inside the cache directory.
fn sanitize_name(name: &str) -> String {
    name.replace(['/', '\\', ':'], "_")
}
