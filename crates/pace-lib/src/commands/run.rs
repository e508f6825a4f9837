use std::{path::PathBuf, sync::Arc};

use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    run::{Error, RunOpts, Runner},
    signal,
    ui::UI,
};

/// `pace run [task] [extras…]`
pub async fn run(
    config: Arc<Config>,
    root: PathBuf,
    ui: UI,
    task: Option<String>,
    extras: Vec<String>,
    opts: RunOpts,
) -> Result<(), Error> {
    let runner = Runner::new(config, root, ui, opts);
    let cancel = CancellationToken::new();
    signal::cancel_on_signal(cancel.clone());
    runner
        .run(task.as_deref().unwrap_or(""), &extras, &cancel)
        .await
}
