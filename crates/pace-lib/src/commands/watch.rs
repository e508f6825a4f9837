use std::{path::PathBuf, sync::Arc};

use crate::{
    config::Config,
    run::{Error, RunOpts, Runner},
    ui::UI,
    watch::Watcher,
};

/// `pace watch <task> [extras…]`
pub async fn watch(
    config: Arc<Config>,
    root: PathBuf,
    ui: UI,
    task_name: String,
    extras: Vec<String>,
    opts: RunOpts,
) -> Result<(), Error> {
    let resolved = config.resolve_name(&task_name).to_string();
    let task = config
        .task(&resolved)
        .ok_or_else(|| Error::TaskNotFound {
            name: resolved.clone(),
        })?;
    if task.inputs.is_empty() {
        return Err(Error::NoWatchTargets);
    }
    let patterns = task.inputs.clone();

    let runner = Arc::new(Runner::new(config, root.clone(), ui, opts));
    Watcher::new(runner, root, resolved, patterns, extras)
        .watch()
        .await
}
