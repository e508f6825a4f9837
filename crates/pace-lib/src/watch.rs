//! Watch mode: re-run a task whenever the files behind its input patterns
//! change.
//!
//! The watcher registers the *directories* that currently contain matching
//! files, debounces bursts of events, and keeps exactly one run in flight:
//! a new burst cancels the previous run, resets the runner's completion
//! state, and starts over. Failed runs are reported and the watcher stays
//! alive; only a shutdown signal ends the loop.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use notify::{event::EventKind, event::ModifyKind, RecursiveMode, Watcher as _};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{run::Error, run::Runner, signal};

const DEBOUNCE: Duration = Duration::from_millis(500);

pub struct Watcher {
    runner: Arc<Runner>,
    root: PathBuf,
    task_name: String,
    patterns: Vec<String>,
    extras: Vec<String>,
}

type InFlight = Option<(CancellationToken, JoinHandle<()>)>;

impl Watcher {
    pub fn new(
        runner: Arc<Runner>,
        root: PathBuf,
        task_name: String,
        patterns: Vec<String>,
        extras: Vec<String>,
    ) -> Self {
        // notify reports resolved paths; resolve the root once so event
        // paths can be made relative for pattern matching
        let root = root.canonicalize().unwrap_or(root);
        Self {
            runner,
            root,
            task_name,
            patterns,
            extras,
        }
    }

    /// Watch until the process receives a shutdown signal.
    pub async fn watch(&self) -> Result<(), Error> {
        let shutdown = CancellationToken::new();
        signal::cancel_on_signal(shutdown.clone());
        self.watch_until(shutdown).await
    }

    pub async fn watch_until(&self, shutdown: CancellationToken) -> Result<(), Error> {
        let dirs = self.watch_dirs()?;
        if dirs.is_empty() {
            return Err(Error::NoWatchTargets);
        }

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                if let Ok(event) = res {
                    // a closed channel means the loop is gone
                    event_tx.send(event).ok();
                }
            })?;

        let mut registered = 0;
        for dir in &dirs {
            match watcher.watch(dir, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    registered += 1;
                    self.runner.ui().info(&format!("Watching: {}", dir.display()));
                }
                Err(e) => self
                    .runner
                    .ui()
                    .warning(&format!("failed to watch {}: {e}", dir.display())),
            }
        }
        if registered == 0 {
            return Err(Error::NoWatchTargets);
        }

        self.runner
            .ui()
            .info("Watching for changes... (Press Ctrl+C to stop)");

        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let mut current: InFlight = None;

        // first run happens immediately on entry
        self.start_run(&mut current, &done_tx);

        let debounce = tokio::time::sleep(DEBOUNCE);
        tokio::pin!(debounce);
        let mut armed = false;

        loop {
            tokio::select! {
                Some(event) = event_rx.recv() => {
                    if self.is_interesting(&event) {
                        trace!("relevant event: {event:?}");
                        debounce
                            .as_mut()
                            .reset(tokio::time::Instant::now() + DEBOUNCE);
                        armed = true;
                    }
                }
                () = &mut debounce, if armed => {
                    armed = false;
                    self.cancel_current(&mut current).await;
                    self.runner.reset();
                    self.runner.ui().info("Change detected, rerunning task...");
                    self.start_run(&mut current, &done_tx);
                }
                Some(result) = done_rx.recv() => {
                    match result {
                        Ok(()) => {}
                        // a run we cancelled ourselves is not news
                        Err(e) if e.is_cancellation() => {}
                        Err(e) => self.runner.ui().error(&e.to_string()),
                    }
                }
                _ = shutdown.cancelled() => {
                    debug!("watcher shutting down");
                    self.cancel_current(&mut current).await;
                    break;
                }
            }
        }

        Ok(())
    }

    // The directories containing the files the patterns match right now;
    // each is registered exactly once.
    fn watch_dirs(&self) -> Result<BTreeSet<PathBuf>, Error> {
        let mut dirs = BTreeSet::new();
        for pattern in &self.patterns {
            let matches = pace_globwalk::globwalk(&self.root, pattern).map_err(|cause| {
                Error::Fingerprint {
                    name: self.task_name.clone(),
                    cause: cause.into(),
                }
            })?;
            for relative in matches {
                let full = self.root.join(&relative);
                let dir = if full.is_dir() {
                    full
                } else {
                    full.parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone())
                };
                dirs.insert(dir);
            }
        }
        Ok(dirs)
    }

    fn is_interesting(&self, event: &notify::Event) -> bool {
        let relevant_op = matches!(
            event.kind,
            EventKind::Create(_)
                | EventKind::Remove(_)
                | EventKind::Modify(
                    ModifyKind::Data(_) | ModifyKind::Name(_) | ModifyKind::Any
                )
        );
        if !relevant_op {
            return false;
        }
        // full paths are matched against the patterns, not basenames
        event.paths.iter().any(|path| {
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            self.patterns
                .iter()
                .any(|pattern| pace_globwalk::matches(pattern, relative))
        })
    }

    fn start_run(&self, current: &mut InFlight, done_tx: &mpsc::UnboundedSender<Result<(), Error>>) {
        let token = CancellationToken::new();
        let runner = self.runner.clone();
        let name = self.task_name.clone();
        let extras = self.extras.clone();
        let done_tx = done_tx.clone();
        let run_token = token.clone();
        let handle = tokio::spawn(async move {
            let result = runner.run(&name, &extras, &run_token).await;
            done_tx.send(result).ok();
        });
        *current = Some((token, handle));
    }

    // The cancel slot is replaced atomically: the old run is cancelled and
    // fully drained before a new one starts.
    async fn cancel_current(&self, current: &mut InFlight) {
        if let Some((token, handle)) = current.take() {
            token.cancel();
            handle.await.ok();
        }
    }
}
