use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::{commands, config, config::Config, logging, run::RunOpts, ui::UI};

#[derive(Debug, Parser)]
#[clap(author, version, about = "A declarative task runner", long_about = None)]
#[clap(disable_help_subcommand = true)]
pub struct Args {
    /// Path to the resolved config file
    #[clap(long, global = true, value_parser, default_value = "pace.json")]
    pub config: PathBuf,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a task (the default task when no name is given)
    Run {
        /// Name of the task to run
        task: Option<String>,
        /// Positional arguments passed to the task
        args: Vec<String>,
        /// Log planned commands without executing anything
        #[clap(long)]
        dry_run: bool,
        /// Ignore cache records for this invocation
        #[clap(long)]
        force: bool,
    },
    /// Watch a task's inputs and re-run it on changes
    Watch {
        /// Name of the task to watch
        task: String,
        /// Positional arguments passed to the task
        args: Vec<String>,
        /// Log planned commands without executing anything
        #[clap(long)]
        dry_run: bool,
        /// Ignore cache records on every triggered run
        #[clap(long)]
        force: bool,
    },
    /// List all available tasks and their details
    List {
        /// Display tasks in a tree view showing dependencies
        #[clap(long, short = 't')]
        tree: bool,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] config::Error),
    #[error(transparent)]
    Run(#[from] crate::run::Error),
    #[error("failed to determine working directory: {0}")]
    Cwd(#[from] std::io::Error),
}

/// Parse arguments, dispatch, and turn the outcome into an exit code. Any
/// surfaced error has already been printed as a single banner.
pub fn main() -> i32 {
    let args = Args::parse();
    logging::init();
    let ui = UI::infer();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            ui.error(&format!("failed to start runtime: {e}"));
            return 1;
        }
    };

    match runtime.block_on(dispatch(args, ui)) {
        Ok(()) => 0,
        Err(e) => {
            ui.error(&e.to_string());
            1
        }
    }
}

async fn dispatch(args: Args, ui: UI) -> Result<(), Error> {
    let root = std::env::current_dir()?;
    let config = Arc::new(Config::load(&args.config)?);
    debug!("loaded config from {}", args.config.display());

    match args.command {
        Command::Run {
            task,
            args: extras,
            dry_run,
            force,
        } => {
            commands::run::run(config, root, ui, task, extras, RunOpts { dry_run, force }).await?
        }
        Command::Watch {
            task,
            args: extras,
            dry_run,
            force,
        } => {
            commands::watch::watch(
                config,
                root,
                ui,
                task,
                extras,
                RunOpts { dry_run, force },
            )
            .await?
        }
        Command::List { tree } => commands::list::list(&config, tree),
    }
    Ok(())
}
