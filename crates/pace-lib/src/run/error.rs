use std::{io, time::Duration};

/// Everything that can stop a run, each kind distinct enough for callers to
/// react: retries catch ordinary failures, cancellation skips `on_failure`
/// hooks, and timeouts are reported as timeouts rather than failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("task {name:?} not found")]
    TaskNotFound { name: String },
    #[error("circular dependency detected for task {name:?}")]
    CyclicDependency { name: String },
    #[error(
        "task {name:?} takes {required} required and {optional} optional argument(s) but got {got}"
    )]
    ArgMismatch {
        name: String,
        got: usize,
        required: usize,
        optional: usize,
    },
    #[error("task {name:?} timed out after {}", humantime::format_duration(*.duration))]
    TaskTimeout { name: String, duration: Duration },
    #[error("task {name:?} was cancelled")]
    TaskCancelled { name: String },
    #[error("task {name:?} failed{}", exit_suffix(.exit))]
    TaskFailed { name: String, exit: Option<i32> },
    #[error("failed to spawn task {name:?}: {cause}")]
    TaskSpawnError {
        name: String,
        #[source]
        cause: io::Error,
    },
    #[error("hook {name:?} not found")]
    HookNotFound { name: String },
    #[error("hook {name:?} failed: {cause}")]
    HookFailed {
        name: String,
        #[source]
        cause: Box<Error>,
    },
    #[error("failed to fingerprint inputs for task {name:?}: {cause}")]
    Fingerprint {
        name: String,
        #[source]
        cause: pace_hash::Error,
    },
    /// Never fails a task: callers log this and carry on, a later run will
    /// simply rebuild.
    #[error("cache error for task {name:?}: {cause}")]
    CacheIo {
        name: String,
        #[source]
        cause: pace_cache::Error,
    },
    #[error("failed to set up watcher: {0}")]
    WatchSetup(#[from] notify::Error),
    #[error("no watch targets: the task's input patterns match no existing directories")]
    NoWatchTargets,
}

impl Error {
    /// Cancellation is not a failure: it propagates as-is, is never retried,
    /// and does not trigger `on_failure` hooks.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::TaskCancelled { .. })
    }
}

fn exit_suffix(exit: &Option<i32>) -> String {
    match exit {
        Some(code) => format!(" with exit code {code}"),
        None => String::new(),
    }
}
