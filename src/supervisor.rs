//! Child process lifecycle.
//!
//! Spawns the crawler with piped stdout and stderr, drains both pipes on their own tasks
//! and only then reaps the child. Waiting on the child before the pipes are drained would
//! stall it as soon as a pipe buffer fills.

use crate::classify::Classifier;
use crate::console::ConsoleSender;
use crate::model::{CommandLine, RunState, StreamKind};
use crate::relay::{relay_reader, StreamError};
use std::future::Future;
use std::io;
use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncRead;
use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// The child could not be started at all.
#[derive(Debug, thiserror::Error)]
#[error("error executing {command}")]
pub struct SpawnError {
    pub command: CommandLine,
    #[source]
    pub source: io::Error,
}

/// Outcome of a run that got past spawning.
#[derive(Debug)]
pub struct RunReport {
    /// `None` if the child could not be waited on after its pipes closed.
    pub exit_status: Option<ExitStatus>,
    pub stdout: Result<u64, StreamError>,
    pub stderr: Result<u64, StreamError>,
    /// The child was killed because of a shutdown request.
    pub interrupted: bool,
}

impl RunReport {
    pub fn stream_errors(&self) -> impl Iterator<Item = &StreamError> {
        [&self.stdout, &self.stderr]
            .into_iter()
            .filter_map(|r| r.as_ref().err())
    }

    /// Process exit code for the wrapper.
    ///
    /// Mirrors the child. A child that reported success still yields 1 if one of its
    /// streams could not be fully relayed.
    pub fn exit_code(&self) -> i32 {
        let child = self.exit_status.map(status_code).unwrap_or(1);
        if child == 0 && self.stream_errors().next().is_some() {
            1
        } else {
            child
        }
    }
}

fn status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

pub struct Supervisor {
    command: CommandLine,
    classifier: Classifier,
    state: watch::Sender<RunState>,
}

impl Supervisor {
    pub fn new(command: CommandLine, classifier: Classifier) -> Self {
        let (state, _) = watch::channel(RunState::NotStarted);
        Self {
            command,
            classifier,
            state,
        }
    }

    pub fn command(&self) -> &CommandLine {
        &self.command
    }

    /// Watch the run move through its states.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: RunState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(from = %prev, to = %next, "run state changed");
        }
    }

    /// Run the child to completion, relaying its output into `console`.
    pub async fn run(self, console: ConsoleSender) -> Result<RunReport, SpawnError> {
        self.run_until(console, std::future::pending()).await
    }

    /// Like [`Supervisor::run`], but kills the child once `shutdown` resolves.
    ///
    /// After the kill both relays keep going until they see end of file, so output the
    /// child already wrote is still shown.
    pub async fn run_until<F>(
        self,
        console: ConsoleSender,
        shutdown: F,
    ) -> Result<RunReport, SpawnError>
    where
        F: Future<Output = ()>,
    {
        self.set_state(RunState::Spawning);
        debug!(command = %self.command, "spawning crawler");

        let mut child = match Command::new(self.command.program())
            .args(self.command.args())
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(source) => {
                self.set_state(RunState::Failed);
                return Err(SpawnError {
                    command: self.command,
                    source,
                });
            }
        };
        debug!(pid = ?child.id(), "crawler started");

        let mut stdout_task = spawn_relay(
            child.stdout.take(),
            StreamKind::Stdout,
            &self.classifier,
            &console,
        );
        let mut stderr_task = spawn_relay(
            child.stderr.take(),
            StreamKind::Stderr,
            &self.classifier,
            &console,
        );
        // The relays hold the only senders from here on.
        drop(console);
        self.set_state(RunState::Running);

        tokio::pin!(shutdown);
        let mut stdout_done: Option<Result<u64, StreamError>> = None;
        let mut stderr_done: Option<Result<u64, StreamError>> = None;
        let mut interrupted = false;

        while stdout_done.is_none() || stderr_done.is_none() {
            tokio::select! {
                res = &mut stdout_task, if stdout_done.is_none() => {
                    stdout_done = Some(finish_relay(StreamKind::Stdout, res));
                    if stderr_done.is_none() {
                        self.set_state(RunState::Draining);
                    }
                }
                res = &mut stderr_task, if stderr_done.is_none() => {
                    stderr_done = Some(finish_relay(StreamKind::Stderr, res));
                    if stdout_done.is_none() {
                        self.set_state(RunState::Draining);
                    }
                }
                _ = &mut shutdown, if !interrupted => {
                    interrupted = true;
                    info!("shutdown requested, stopping crawler");
                    if let Err(e) = child.start_kill() {
                        warn!(error = %e, "failed to kill crawler");
                    }
                }
            }
        }

        let exit_status = match child.wait().await {
            Ok(status) => {
                debug!(%status, "crawler exited");
                Some(status)
            }
            Err(e) => {
                error!(error = %e, "failed to wait for crawler");
                None
            }
        };
        self.set_state(RunState::Finished);

        Ok(RunReport {
            exit_status,
            // Loop above only exits once both are set.
            stdout: stdout_done.unwrap_or(Ok(0)),
            stderr: stderr_done.unwrap_or(Ok(0)),
            interrupted,
        })
    }
}

fn spawn_relay<R>(
    source: Option<R>,
    stream: StreamKind,
    classifier: &Classifier,
    console: &ConsoleSender,
) -> JoinHandle<Result<u64, StreamError>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let classifier = classifier.clone();
    let console = console.clone();
    tokio::spawn(async move {
        match source {
            Some(reader) => relay_reader(reader, stream, &classifier, &console).await,
            None => Err(StreamError::NotCaptured { stream }),
        }
    })
}

fn finish_relay(
    stream: StreamKind,
    joined: Result<Result<u64, StreamError>, tokio::task::JoinError>,
) -> Result<u64, StreamError> {
    let res = joined.unwrap_or_else(|e| {
        Err(StreamError::Aborted {
            stream,
            reason: e.to_string(),
        })
    });
    if let Err(e) = &res {
        error!(%stream, error = %e, "relay failed, continuing with the other stream");
    }
    res
}
