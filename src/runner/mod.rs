//! Command execution off the UI thread.
//!
//! A [`Dispatcher`] owns at most one in-flight [`Job`]. The job runs on a
//! worker thread and reports back through a channel with exactly one
//! [`Completion`], which the UI loop drains with [`Dispatcher::try_complete`].

use std::io::{self, Read};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::config::ShellConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOrigin {
    /// A saved command; its usage counter was bumped at dispatch.
    Saved { id: i64, name: String },
    /// A one-off line typed in the file browser.
    AdHoc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub command_line: String,
    pub cwd: PathBuf,
    pub origin: JobOrigin,
}

/// What came back from a run. Output captured before a failure is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub failure: Option<String>,
    pub output: Vec<u8>,
}

impl ExecOutcome {
    pub fn succeeded(output: Vec<u8>) -> Self {
        ExecOutcome {
            failure: None,
            output,
        }
    }

    pub fn failed(output: Vec<u8>, reason: impl Into<String>) -> Self {
        ExecOutcome {
            failure: Some(reason.into()),
            output,
        }
    }
}

#[derive(Debug)]
pub struct Completion {
    pub job: Job,
    pub outcome: ExecOutcome,
}

/// Blocking execution of a single job. Called on a worker thread.
pub trait Runner: Send + Sync {
    fn run(&self, job: &Job) -> ExecOutcome;
}

/// Runs command lines through the configured shell, e.g. `sh -c <line>`.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    program: String,
    args: Vec<String>,
}

impl ShellRunner {
    pub fn new(shell: &ShellConfig) -> Self {
        ShellRunner {
            program: shell.program.clone(),
            args: shell.args.clone(),
        }
    }

    fn command(&self, command_line: &str, cwd: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(command_line).current_dir(cwd);
        cmd
    }

    /// Run with the caller's stdio attached. Used outside the TUI.
    pub fn run_inherited(&self, command_line: &str, cwd: &Path) -> Result<ExitStatus> {
        self.command(command_line, cwd)
            .status()
            .with_context(|| format!("failed to start {}", self.program))
    }
}

impl Runner for ShellRunner {
    fn run(&self, job: &Job) -> ExecOutcome {
        // stdout and stderr share one pipe so the capture keeps their interleaving.
        let (mut reader, writer) = match io::pipe() {
            Ok(pair) => pair,
            Err(e) => return ExecOutcome::failed(Vec::new(), format!("cannot create pipe: {e}")),
        };
        let err_writer = match writer.try_clone() {
            Ok(w) => w,
            Err(e) => return ExecOutcome::failed(Vec::new(), format!("cannot create pipe: {e}")),
        };

        let mut cmd = self.command(&job.command_line, &job.cwd);
        cmd.stdin(Stdio::null()).stdout(writer).stderr(err_writer);
        let spawned = cmd.spawn();
        // The command still holds our copies of the write end; drop them so
        // the read below sees EOF once the child exits.
        drop(cmd);
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                return ExecOutcome::failed(
                    Vec::new(),
                    format!("failed to start {}: {e}", self.program),
                );
            }
        };

        let mut output = Vec::new();
        let read_error = reader.read_to_end(&mut output).err();
        let status = child.wait();

        match (status, read_error) {
            (Err(e), _) => ExecOutcome::failed(output, format!("failed to wait for process: {e}")),
            (Ok(_), Some(e)) => ExecOutcome::failed(output, format!("failed to read output: {e}")),
            (Ok(status), None) if !status.success() => ExecOutcome::failed(output, status.to_string()),
            (Ok(_), None) => ExecOutcome::succeeded(output),
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("a command is already running")]
    Busy,
    #[error("failed to start worker thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Hands jobs to worker threads, one at a time.
pub struct Dispatcher {
    runner: Arc<dyn Runner>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    in_flight: bool,
}

impl Dispatcher {
    pub fn new(runner: Arc<dyn Runner>) -> Self {
        let (tx, rx) = mpsc::channel();
        Dispatcher {
            runner,
            tx,
            rx,
            in_flight: false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    pub fn dispatch(&mut self, job: Job) -> Result<(), DispatchError> {
        if self.in_flight {
            return Err(DispatchError::Busy);
        }
        let runner = Arc::clone(&self.runner);
        let tx = self.tx.clone();
        thread::Builder::new()
            .name("cmd-vault-runner".into())
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| runner.run(&job)))
                    .unwrap_or_else(|_| ExecOutcome::failed(Vec::new(), "runner panicked"));
                // Receiver lives as long as the dispatcher; nothing to do if it is gone.
                let _ = tx.send(Completion { job, outcome });
            })?;
        self.in_flight = true;
        Ok(())
    }

    /// Non-blocking: the finished job, if its completion has arrived.
    pub fn try_complete(&mut self) -> Option<Completion> {
        let completion = self.rx.try_recv().ok()?;
        self.in_flight = false;
        Some(completion)
    }

    #[cfg(test)]
    pub(crate) fn wait_complete(&mut self, timeout: std::time::Duration) -> Option<Completion> {
        let completion = self.rx.recv_timeout(timeout).ok()?;
        self.in_flight = false;
        Some(completion)
    }
}
