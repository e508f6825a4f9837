//! Runs a single task or hook body in a supervised child process.

use std::{
    io::{self, Write},
    path::PathBuf,
    time::Duration,
};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    config::{Hook, Task},
    interpolate,
    process::{Child, ChildExit, Command, ShutdownStyle},
    run::Error,
    shell::ShellLauncher,
    ui::{ColorSelector, PrefixedWriter, RED, UI},
};

/// How long a signalled child gets before it is hard killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub struct TaskExecutor {
    root: PathBuf,
    shell: ShellLauncher,
    ui: UI,
    colors: ColorSelector,
}

impl TaskExecutor {
    pub fn new(root: PathBuf, shell: ShellLauncher, ui: UI) -> Self {
        Self {
            root,
            shell,
            ui,
            colors: ColorSelector::default(),
        }
    }

    pub fn ui(&self) -> &UI {
        &self.ui
    }

    /// Run the task body once. The command template has its placeholders
    /// substituted before it reaches the shell.
    pub async fn execute_task(
        &self,
        task: &Task,
        extras: &[String],
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let command = interpolate::interpolate(&task.command, extras, task.args.as_ref());
        self.execute_command(ExecSpec {
            name: &task.name,
            command: &command,
            working_dir: task.working_dir.as_deref(),
            env: &task.env,
            silent: task.silent,
            timeout: task.timeout,
            cancel,
        })
        .await
    }

    /// Run a hook body: no extras, no timeout, only the engine's root
    /// cancellation applies.
    pub async fn execute_hook(
        &self,
        hook: &Hook,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        self.execute_command(ExecSpec {
            name: &hook.name,
            command: &hook.command,
            working_dir: hook.working_dir.as_deref(),
            env: &hook.env,
            silent: false,
            timeout: None,
            cancel,
        })
        .await
    }

    async fn execute_command(&self, spec: ExecSpec<'_>) -> Result<(), Error> {
        let (shell, prefix_args) = self.shell.shell_command();
        let mut argv: Vec<String> = prefix_args;
        argv.push(spec.command.to_string());

        let mut cmd = Command::new(&shell);
        cmd.args(argv);
        // working_dir is a spawn attribute; the engine's own cwd is never
        // touched
        let cwd = match spec.working_dir {
            Some(dir) => self.root.join(dir),
            None => self.root.clone(),
        };
        cmd.current_dir(cwd);
        cmd.envs(spec.env);

        let label = cmd.label();
        let mut child = Child::spawn(cmd, ShutdownStyle::Graceful(SHUTDOWN_GRACE)).map_err(
            |cause| Error::TaskSpawnError {
                name: spec.name.to_string(),
                cause,
            },
        )?;
        debug!("spawned {label:?} as pid {:?}", child.pid());

        let (stdout_pipe, stderr_pipe) = self.writers(spec.name, spec.silent);
        let mut piper = child.clone();
        let wait = piper.wait_with_piped_outputs(stdout_pipe, stderr_pipe);

        let deadline = async {
            match spec.timeout {
                Some(duration) => tokio::time::sleep(duration).await,
                None => futures::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = spec.cancel.cancelled() => {
                child.stop().await;
                Err(Error::TaskCancelled {
                    name: spec.name.to_string(),
                })
            }
            _ = deadline => {
                child.kill().await;
                Err(Error::TaskTimeout {
                    name: spec.name.to_string(),
                    duration: spec.timeout.unwrap_or_default(),
                })
            }
            result = wait => {
                let exit = result.map_err(|_| Error::TaskFailed {
                    name: spec.name.to_string(),
                    exit: None,
                })?;
                match exit {
                    Some(ChildExit::Finished(Some(0))) => Ok(()),
                    Some(ChildExit::Finished(code)) => Err(Error::TaskFailed {
                        name: spec.name.to_string(),
                        exit: code,
                    }),
                    Some(ChildExit::Killed) => Err(Error::TaskCancelled {
                        name: spec.name.to_string(),
                    }),
                    // a child signalled by something other than our own stop
                    // is an ordinary, retryable failure
                    Some(ChildExit::KilledExternal)
                    | Some(ChildExit::Failed)
                    | None => Err(Error::TaskFailed {
                        name: spec.name.to_string(),
                        exit: None,
                    }),
                }
            }
        }
    }

    fn writers(
        &self,
        name: &str,
        silent: bool,
    ) -> (Box<dyn Write + Send>, Box<dyn Write + Send>) {
        if silent {
            return (Box::new(io::sink()), Box::new(io::sink()));
        }
        let color = self.colors.color_for(name);
        let stdout_prefix = format!("{} | ", color.apply_to(name));
        // stderr lines carry a red prefix so the two streams stay
        // distinguishable once interleaved
        let stderr_prefix = format!("{} | ", RED.apply_to(name));
        (
            Box::new(PrefixedWriter::new(stdout_prefix, io::stdout())),
            Box::new(PrefixedWriter::new(stderr_prefix, io::stderr())),
        )
    }
}

struct ExecSpec<'a> {
    name: &'a str,
    command: &'a str,
    working_dir: Option<&'a std::path::Path>,
    env: &'a std::collections::BTreeMap<String, String>,
    silent: bool,
    timeout: Option<Duration>,
    cancel: &'a CancellationToken,
}
