//! Spawning and supervising a single child process.
//!
//! This loosely follows the actor model: the spawned task owns the OS child
//! and runs it to completion, while `Child` handles are cheap clones that can
//! wait for the exit code or ask for a stop/kill. A stop first signals the
//! child's process group and only escalates to a hard kill after a grace
//! period.

use std::{
    io::{self, Write},
    sync::Arc,
    time::Duration,
};

use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    join,
    process::Command as TokioCommand,
    sync::{mpsc, watch, RwLock},
};
use tracing::debug;

use super::Command;

#[derive(Debug)]
pub enum ChildState {
    Running(ChildCommandChannel),
    Exited(ChildExit),
}

impl ChildState {
    fn command_channel(&self) -> Option<ChildCommandChannel> {
        match self {
            ChildState::Running(c) => Some(c.clone()),
            ChildState::Exited(_) => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChildExit {
    Finished(Option<i32>),
    Killed,
    /// The child was signalled by someone other than us.
    KilledExternal,
    Failed,
}

#[derive(Debug, Clone)]
pub enum ShutdownStyle {
    /// Send SIGTERM to the child's process group, then hard kill if the
    /// child is still alive after the grace period. On Windows, where no
    /// such signal exists, this kills immediately.
    Graceful(Duration),
    Kill,
}

impl ShutdownStyle {
    async fn process(&self, child: &mut tokio::process::Child, pid: Option<u32>) -> ChildState {
        match self {
            #[allow(unused_variables)]
            ShutdownStyle::Graceful(grace) => {
                #[cfg(unix)]
                {
                    let fut = async {
                        if let Some(pid) = pid {
                            debug!("sending SIGTERM to child {}", pid);
                            // negative pid targets the process group
                            unsafe {
                                libc::kill(-(pid as i32), libc::SIGTERM);
                            }
                            child.wait().await.map(|status| status.code())
                        } else {
                            Ok(None)
                        }
                    };

                    match tokio::time::timeout(*grace, fut).await {
                        // whatever the exit code was, we asked for the stop,
                        // so report it as killed
                        Ok(Ok(_)) => ChildState::Exited(ChildExit::Killed),
                        Ok(Err(_)) => ChildState::Exited(ChildExit::Failed),
                        Err(_) => {
                            debug!("graceful shutdown timed out, killing child");
                            match child.kill().await {
                                Ok(_) => ChildState::Exited(ChildExit::Killed),
                                Err(_) => ChildState::Exited(ChildExit::Failed),
                            }
                        }
                    }
                }

                #[cfg(windows)]
                {
                    debug!("graceful shutdown not supported on windows, killing");
                    match child.kill().await {
                        Ok(_) => ChildState::Exited(ChildExit::Killed),
                        Err(_) => ChildState::Exited(ChildExit::Failed),
                    }
                }
            }
            ShutdownStyle::Kill => match child.kill().await {
                Ok(_) => ChildState::Exited(ChildExit::Killed),
                Err(_) => ChildState::Exited(ChildExit::Failed),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChildCommandChannel(mpsc::Sender<ChildCommand>);

impl ChildCommandChannel {
    pub fn new() -> (Self, mpsc::Receiver<ChildCommand>) {
        let (tx, rx) = mpsc::channel(1);
        (ChildCommandChannel(tx), rx)
    }

    pub async fn kill(&self) -> Result<(), mpsc::error::SendError<ChildCommand>> {
        self.0.send(ChildCommand::Kill).await
    }

    pub async fn stop(&self) -> Result<(), mpsc::error::SendError<ChildCommand>> {
        self.0.send(ChildCommand::Stop).await
    }
}

pub enum ChildCommand {
    Stop,
    Kill,
}

/// A handle to a supervised child process. Clones share the same child.
#[derive(Clone, Debug)]
pub struct Child {
    pid: Option<u32>,
    state: Arc<RwLock<ChildState>>,
    exit_channel: watch::Receiver<Option<ChildExit>>,
    output: Arc<std::sync::Mutex<Option<ChildOutput>>>,
}

#[derive(Debug)]
struct ChildOutput {
    stdout: tokio::process::ChildStdout,
    stderr: tokio::process::ChildStderr,
}

impl Child {
    /// Spawn the command immediately and start supervising it.
    ///
    /// On unix the child is placed in its own session so that a later signal
    /// reaches the whole process group, not just the shell.
    pub fn spawn(command: Command, shutdown_style: ShutdownStyle) -> io::Result<Self> {
        let mut command = TokioCommand::from(command);

        #[cfg(unix)]
        {
            use nix::unistd::setsid;
            unsafe {
                command.pre_exec(|| {
                    setsid().map_err(io::Error::from)?;
                    Ok(())
                });
            }
        }

        let mut child = command.spawn()?;
        let pid = child.id();

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let output = stdout
            .zip(stderr)
            .map(|(stdout, stderr)| ChildOutput { stdout, stderr });

        let (command_tx, mut command_rx) = ChildCommandChannel::new();
        // A watch channel carries the exit code back to every handle: either
        // the child exits on its own, or a stop/kill command ends it.
        let (exit_tx, exit_rx) = watch::channel(None);

        let state = Arc::new(RwLock::new(ChildState::Running(command_tx)));
        let task_state = state.clone();

        tokio::spawn(async move {
            let new_state = tokio::select! {
                command = command_rx.recv() => {
                    match command {
                        // a closed channel means every handle is gone; treat
                        // it like a stop request
                        Some(ChildCommand::Stop) | None => {
                            debug!("stopping child process");
                            shutdown_style.process(&mut child, pid).await
                        }
                        Some(ChildCommand::Kill) => {
                            debug!("killing child process");
                            ShutdownStyle::Kill.process(&mut child, pid).await
                        }
                    }
                }
                status = child.wait() => {
                    let exit = match status.map(|status| status.code()) {
                        Ok(Some(code)) => ChildExit::Finished(Some(code)),
                        // no code means a signal ended the child, and it
                        // wasn't one of ours
                        Ok(None) => ChildExit::KilledExternal,
                        Err(_) => ChildExit::Failed,
                    };
                    ChildState::Exited(exit)
                }
            };

            if let ChildState::Exited(exit) = &new_state {
                // a dropped receiver is fine, nobody is waiting anymore
                exit_tx.send(Some(*exit)).ok();
            }

            let mut task_state = task_state.write().await;
            *task_state = new_state;
            debug!("child process stopped");
        });

        Ok(Self {
            pid,
            state,
            exit_channel: exit_rx,
            output: Arc::new(std::sync::Mutex::new(output)),
        })
    }

    /// Wait for the child to exit, returning the exit state.
    pub async fn wait(&mut self) -> Option<ChildExit> {
        self.exit_channel.changed().await.ok()?;
        *self.exit_channel.borrow()
    }

    /// Ask for a graceful shutdown and wait for the child to go away.
    pub async fn stop(&mut self) -> Option<ChildExit> {
        let mut exit = self.exit_channel.clone();

        let fut = async {
            let channel = {
                let state = self.state.read().await;
                state.command_channel()
            };
            if let Some(channel) = channel {
                // a send error means the supervisor already finished
                channel.stop().await.ok();
            }
        };

        let (_, code) = join! {
            fut,
            async {
                exit.changed().await.ok()?;
                *exit.borrow()
            }
        };

        code
    }

    /// Kill the child immediately, skipping the grace period.
    pub async fn kill(&mut self) -> Option<ChildExit> {
        let mut exit = self.exit_channel.clone();

        let fut = async {
            let channel = {
                let state = self.state.read().await;
                state.command_channel()
            };
            if let Some(channel) = channel {
                channel.kill().await.ok();
            }
        };

        let (_, code) = join! {
            fut,
            async {
                exit.changed().await.ok()?;
                *exit.borrow()
            }
        };

        code
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn outputs(&mut self) -> Option<ChildOutput> {
        self.output.lock().expect("child output lock poisoned").take()
    }

    /// Wait for the child while forwarding its stdout and stderr, line by
    /// line, to the two writers. The last line is flushed even when the
    /// child exits without a trailing newline.
    pub async fn wait_with_piped_outputs<O: Write, E: Write>(
        &mut self,
        mut stdout_pipe: O,
        mut stderr_pipe: E,
    ) -> Result<Option<ChildExit>, io::Error> {
        let Some(ChildOutput { stdout, stderr }) = self.outputs() else {
            return Ok(self.wait().await);
        };
        let mut stdout_lines = Some(BufReader::new(stdout));
        let mut stderr_lines = Some(BufReader::new(stderr));

        async fn next_line<R: AsyncBufRead + Unpin>(
            stream: &mut Option<R>,
            buffer: &mut Vec<u8>,
        ) -> Option<Result<(), io::Error>> {
            match stream {
                Some(stream) => match stream.read_until(b'\n', buffer).await {
                    Ok(0) => None,
                    Ok(_) => Some(Ok(())),
                    Err(e) => Some(Err(e)),
                },
                None => None,
            }
        }

        let mut stdout_buffer = Vec::new();
        let mut stderr_buffer = Vec::new();

        loop {
            tokio::select! {
                Some(result) = next_line(&mut stdout_lines, &mut stdout_buffer) => {
                    result?;
                    add_trailing_newline(&mut stdout_buffer);
                    stdout_pipe.write_all(&stdout_buffer)?;
                    stdout_buffer.clear();
                }
                Some(result) = next_line(&mut stderr_lines, &mut stderr_buffer) => {
                    result?;
                    add_trailing_newline(&mut stderr_buffer);
                    stderr_pipe.write_all(&stderr_buffer)?;
                    stderr_buffer.clear();
                }
                else => {
                    // both streams hit EOF; flush any unterminated last line
                    if !stdout_buffer.is_empty() {
                        add_trailing_newline(&mut stdout_buffer);
                        stdout_pipe.write_all(&stdout_buffer)?;
                    }
                    if !stderr_buffer.is_empty() {
                        add_trailing_newline(&mut stderr_buffer);
                        stderr_pipe.write_all(&stderr_buffer)?;
                    }
                    break;
                }
            }
        }

        stdout_pipe.flush()?;
        stderr_pipe.flush()?;

        Ok(self.wait().await)
    }
}

fn add_trailing_newline(buffer: &mut Vec<u8>) {
    // output from other tasks must not land on the same line
    if buffer.last() != Some(&b'\n') {
        buffer.push(b'\n');
    }
}
