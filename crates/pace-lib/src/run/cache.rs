//! The cache-check policy: decides whether a task may be skipped, and
//! records fingerprints after a successful run.
//!
//! Every comparison is hash equality against the task's persisted record;
//! no file-by-file diff ever reaches the caller.

use std::{collections::BTreeMap, path::Path};

use chrono::{DateTime, Utc};
use pace_cache::{CacheRecord, CacheStore};
use tracing::{debug, warn};

use crate::{config::Config, config::Task, run::Error};

/// Whether `task` has to run again. `true` is always the safe answer, and
/// unreadable cache state degrades to it rather than failing the task.
pub(crate) async fn needs_rerun(
    root: &Path,
    store: &CacheStore,
    config: &Config,
    task: &Task,
) -> Result<bool, Error> {
    if !task.cache {
        return Ok(true);
    }

    let record = match store.load(&task.name).await {
        Ok(Some(record)) => record,
        Ok(None) => return Ok(true),
        Err(cause) => {
            warn!(
                "{}",
                Error::CacheIo {
                    name: task.name.clone(),
                    cause,
                }
            );
            return Ok(true);
        }
    };

    if pace_hash::hash_string(&task.command) != record.command_hash {
        debug!("command changed for {}", task.name);
        return Ok(true);
    }

    // the declared dependency list must match in length and order
    if task.dependencies != record.dependencies {
        debug!("dependencies changed for {}", task.name);
        return Ok(true);
    }

    // a cached dependency whose outputs moved invalidates us transitively
    for dep_name in &task.dependencies {
        let Some(dep) = config.task(dep_name) else {
            return Ok(true);
        };
        if !dep.cache {
            continue;
        }
        let current = fingerprint(root, &dep.outputs, task)?;
        if record.dep_hashes.get(dep_name) != Some(&current) {
            debug!("outputs of dependency {dep_name} changed for {}", task.name);
            return Ok(true);
        }
    }

    if fingerprint(root, &task.inputs, task)? != record.inputs_hash {
        debug!("inputs changed for {}", task.name);
        return Ok(true);
    }

    if !task.outputs.is_empty() {
        let mut outputs_hash = None;
        for pattern in &task.outputs {
            let matches = pace_globwalk::globwalk(root, pattern).map_err(|cause| {
                Error::Fingerprint {
                    name: task.name.clone(),
                    cause: cause.into(),
                }
            })?;
            if matches.is_empty() {
                debug!("output pattern {pattern} matches nothing for {}", task.name);
                return Ok(true);
            }
            for relative in matches {
                let Ok(meta) = root.join(&relative).metadata() else {
                    return Ok(true);
                };
                if meta.is_dir() {
                    continue;
                }
                if modified_after(&meta, &record.last_run_time) {
                    // a touch without a content change is not a rebuild
                    // trigger, so only now compare the actual fingerprint
                    if outputs_hash.is_none() {
                        outputs_hash = Some(fingerprint(root, &task.outputs, task)?);
                    }
                    if outputs_hash.as_deref() != Some(record.outputs_hash.as_str()) {
                        debug!("outputs changed for {}", task.name);
                        return Ok(true);
                    }
                }
            }
        }
    }

    Ok(false)
}

/// Write a fresh record for `task` after a successful run. Fingerprints of
/// cached dependencies are captured as they are right now, which is after
/// every dependency finished.
pub(crate) async fn update_record(
    root: &Path,
    store: &CacheStore,
    config: &Config,
    task: &Task,
) -> Result<(), Error> {
    if !task.cache {
        return Ok(());
    }

    let mut dep_hashes = BTreeMap::new();
    for dep_name in &task.dependencies {
        if let Some(dep) = config.task(dep_name) {
            if dep.cache {
                dep_hashes.insert(dep_name.clone(), fingerprint(root, &dep.outputs, task)?);
            }
        }
    }

    let record = CacheRecord {
        task_name: task.name.clone(),
        inputs_hash: fingerprint(root, &task.inputs, task)?,
        outputs_hash: fingerprint(root, &task.outputs, task)?,
        last_run_time: Utc::now(),
        command_hash: pace_hash::hash_string(&task.command),
        dependencies: task.dependencies.clone(),
        dep_hashes,
    };

    store.save(&record).await.map_err(|cause| Error::CacheIo {
        name: task.name.clone(),
        cause,
    })
}

fn fingerprint(root: &Path, patterns: &[String], task: &Task) -> Result<String, Error> {
    pace_hash::hash_pattern_set(root, patterns).map_err(|cause| Error::Fingerprint {
        name: task.name.clone(),
        cause,
    })
}

fn modified_after(meta: &std::fs::Metadata, reference: &DateTime<Utc>) -> bool {
    meta.modified()
        .map(|mtime| DateTime::<Utc>::from(mtime) > *reference)
        .unwrap_or(false)
}
