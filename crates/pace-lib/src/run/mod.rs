//! The run engine: dependency expansion, caching, retries and hooks.
//!
//! Each invocation owns one `Runner`. Task names move through a small state
//! machine guarded by one mutex: unknown → running → completed. Seeing a
//! name that is already *running* again means the dependency graph loops
//! back on itself; seeing a *completed* name is ordinary diamond-shaped
//! dedup and a no-op. The two sets are deliberately separate. A task that
//! failed stays marked running for the rest of the invocation, so anything
//! that references it again gets the cycle error instead of a second run.

mod cache;
mod error;
mod executor;
mod hooks;

use std::{
    collections::HashSet,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use async_recursion::async_recursion;
pub use error::Error;
pub use executor::TaskExecutor;
use futures::{stream::FuturesUnordered, StreamExt};
pub use hooks::HookExecutor;
use pace_cache::CacheStore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{config::Config, config::Task, interpolate, shell::ShellLauncher, ui::UI};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOpts {
    /// Log planned commands without spawning anything.
    pub dry_run: bool,
    /// Ignore cache records for this invocation (without purging them).
    pub force: bool,
}

#[derive(Default)]
struct RunState {
    completed: HashSet<String>,
    running: HashSet<String>,
}

pub struct Runner {
    config: Arc<Config>,
    root: PathBuf,
    store: CacheStore,
    executor: TaskExecutor,
    hooks: HookExecutor,
    state: Mutex<RunState>,
    opts: RunOpts,
}

impl Runner {
    pub fn new(config: Arc<Config>, root: PathBuf, ui: UI, opts: RunOpts) -> Self {
        let shell = ShellLauncher::new(config.globals.clone());
        let executor = TaskExecutor::new(root.clone(), shell, ui);
        let hooks = HookExecutor::new(config.hooks.clone());
        let store = CacheStore::new(&root);
        Self {
            config,
            root,
            store,
            executor,
            hooks,
            state: Mutex::new(RunState::default()),
            opts,
        }
    }

    pub fn ui(&self) -> &UI {
        self.executor.ui()
    }

    /// Forget which tasks completed. The watcher calls this before every
    /// re-run so edits propagate through the whole graph again.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("runner state poisoned");
        state.completed.clear();
        state.running.clear();
    }

    /// Run a task by (possibly aliased, possibly empty) name.
    pub async fn run(
        &self,
        name: &str,
        extras: &[String],
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let resolved = self.config.resolve_name(name);
        let task = self
            .config
            .task(resolved)
            .ok_or_else(|| Error::TaskNotFound {
                name: resolved.to_string(),
            })?
            .clone();
        interpolate::validate_extras(&task.name, extras, task.args.as_ref())?;
        self.run_task(task, extras.to_vec(), cancel.clone()).await
    }

    #[async_recursion]
    async fn run_task(
        &self,
        task: Task,
        extras: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<(), Error> {
        {
            let mut state = self.state.lock().expect("runner state poisoned");
            if state.completed.contains(&task.name) {
                return Ok(());
            }
            if !state.running.insert(task.name.clone()) {
                return Err(Error::CyclicDependency {
                    name: task.name.clone(),
                });
            }
        }

        let name = task.name.clone();
        let result = self.run_task_inner(&task, &extras, &cancel).await;

        // only success clears the running mark; a failed task keeps it, so
        // a later reference within the same invocation is reported as a
        // cycle rather than silently retried
        if result.is_ok() {
            let mut state = self.state.lock().expect("runner state poisoned");
            state.running.remove(&name);
            state.completed.insert(name);
        }
        result
    }

    async fn run_task_inner(
        &self,
        task: &Task,
        extras: &[String],
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        if !task.dependencies.is_empty() {
            // dependencies are resolved to values up front, one plan per
            // expansion
            let mut plan = Vec::with_capacity(task.dependencies.len());
            for dep_name in &task.dependencies {
                let dep = self
                    .config
                    .task(dep_name)
                    .ok_or_else(|| Error::TaskNotFound {
                        name: dep_name.clone(),
                    })?;
                plan.push(dep.clone());
            }
            self.run_dependencies(task, plan, cancel).await?;
        }

        if !self.opts.force && !cache::needs_rerun(&self.root, &self.store, &self.config, task).await? {
            if !task.silent {
                self.ui()
                    .info(&format!("Task {:?} is up to date (cache hit)", task.name));
            }
            return Ok(());
        }

        if self.opts.dry_run {
            self.log_dry_run(task, extras);
            return Ok(());
        }

        let mut attempt = 0;
        loop {
            if attempt > 0 {
                if !task.silent {
                    self.ui().warning(&format!(
                        "Retrying task {:?} (attempt {}/{})...",
                        task.name, attempt, task.retry
                    ));
                }
                if let Some(delay) = task.retry_delay {
                    // sleep or cancel, whichever happens first
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return Err(Error::TaskCancelled {
                                name: task.name.clone(),
                            });
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }

            match self.execute_once(task, extras, cancel).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) if attempt < task.retry => {
                    debug!("attempt {} for {} failed: {e}", attempt, task.name);
                    attempt += 1;
                }
                Err(e) => {
                    if !task.on_failure.is_empty() {
                        if let Err(hook_err) = self
                            .hooks
                            .execute(&task.on_failure, &self.executor, cancel, task.silent)
                            .await
                        {
                            if !task.silent {
                                self.ui()
                                    .warning(&format!("failure hook execution failed: {hook_err}"));
                            }
                        }
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn execute_once(
        &self,
        task: &Task,
        extras: &[String],
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        self.hooks
            .execute(&task.before, &self.executor, cancel, task.silent)
            .await?;

        if !task.silent {
            self.ui().task(&format!("Running task {:?}...", task.name));
        }
        self.executor.execute_task(task, extras, cancel).await?;

        // a write failure costs nothing but a rebuild next time
        if let Err(e) = cache::update_record(&self.root, &self.store, &self.config, task).await {
            if !task.silent {
                self.ui()
                    .warning(&format!("failed to update cache for task {:?}: {e}", task.name));
            }
        }

        if !task.silent {
            self.ui()
                .success(&format!("Task {:?} completed successfully", task.name));
        }

        self.hooks
            .execute(&task.after, &self.executor, cancel, task.silent)
            .await?;

        if !task.on_success.is_empty() {
            if let Err(e) = self
                .hooks
                .execute(&task.on_success, &self.executor, cancel, task.silent)
                .await
            {
                if !task.silent {
                    self.ui()
                        .warning(&format!("success hook execution failed: {e}"));
                }
            }
        }

        Ok(())
    }

    /// Dispatch mode comes from the parent: sequential in declared order, or
    /// a concurrent fan-out where the first error cancels the other workers.
    async fn run_dependencies(
        &self,
        parent: &Task,
        plan: Vec<Task>,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        if !parent.parallel {
            for dep in plan {
                let dep_name = dep.name.clone();
                if let Err(e) = self.run_task(dep, Vec::new(), cancel.clone()).await {
                    if e.is_cancellation() || !parent.continue_on_error {
                        return Err(e);
                    }
                    if !parent.silent {
                        self.ui()
                            .warning(&format!("dependency {dep_name:?} failed, continuing: {e}"));
                    }
                }
            }
            return Ok(());
        }

        // every worker gets its own token derived from this fan-out, so the
        // first failure can stop the siblings without touching the parent
        let fanout = cancel.child_token();
        let mut workers = plan
            .into_iter()
            .map(|dep| {
                let token = fanout.child_token();
                async move {
                    let name = dep.name.clone();
                    (name, self.run_task(dep, Vec::new(), token).await)
                }
            })
            .collect::<FuturesUnordered<_>>();

        let mut first_error = None;
        while let Some((dep_name, result)) = workers.next().await {
            if let Err(e) = result {
                if parent.continue_on_error && !e.is_cancellation() {
                    if !parent.silent {
                        self.ui()
                            .warning(&format!("dependency {dep_name:?} failed, continuing: {e}"));
                    }
                    continue;
                }
                if first_error.is_none() {
                    first_error = Some(e);
                    fanout.cancel();
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn log_dry_run(&self, task: &Task, extras: &[String]) {
        let command = interpolate::interpolate(&task.command, extras, task.args.as_ref());
        if !extras.is_empty() && command == task.command {
            self.ui().warning(&format!(
                "[DRY RUN] Extra arguments provided but command has no placeholders ($@, $1, $2, etc.): {extras:?}"
            ));
        }
        self.ui()
            .info(&format!("[DRY RUN] Would execute task {:?}: {command}", task.name));
        for (label, list) in [
            ("before", &task.before),
            ("after", &task.after),
            ("on_success", &task.on_success),
        ] {
            if !list.is_empty() {
                self.ui()
                    .info(&format!("[DRY RUN] Would run {label} hooks: {list:?}"));
            }
        }
    }
}
