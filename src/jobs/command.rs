use std::path::PathBuf;
use std::process::Stdio;

use anyhow::Context;
use tokio::process::Command;
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::engine::{InFlight, Job, JobContext, JobHandle, Task};

/// Runs an external build step and completes when it exits.
///
/// The process is spawned on start and its exit is awaited from the job's
/// tick, so the job needs a tokio runtime but no executor of its own. A
/// non-zero exit status fails the job with the last line the process wrote
/// to stderr.
pub struct RunCommand {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    exit: InFlight,
}

impl RunCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>, cwd: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd,
            exit: InFlight::default(),
        }
    }
}

impl Task for RunCommand {
    fn start(&mut self, ctx: &JobContext<'_>) -> anyhow::Result<()> {
        Handle::try_current().context("no tokio runtime to run the command on")?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        let child = command
            .spawn()
            .with_context(|| format!("failed to spawn '{}'", self.program))?;
        info!(job = %ctx.label(), program = %self.program, args = ?self.args, "command started");

        let completer = ctx.completer();
        let label = ctx.label().to_string();
        let program = self.program.clone();
        self.exit.set(async move {
            let output = match child.wait_with_output().await {
                Ok(output) => output,
                Err(err) => {
                    completer.fail(format!("failed to wait for '{program}': {err}"));
                    return;
                }
            };

            let stdout = String::from_utf8_lossy(&output.stdout);
            debug!(job = %label, program = %program, stdout = %stdout.trim_end(), "command output");
            if output.status.success() {
                info!(job = %label, program = %program, "command finished");
                completer.succeed();
                return;
            }

            let stderr = String::from_utf8_lossy(&output.stderr);
            let mut message = format!("'{program}' exited with {}", output.status);
            if let Some(last) = stderr.lines().rev().find(|l| !l.trim().is_empty()) {
                message.push_str(": ");
                message.push_str(last.trim());
            }
            completer.fail(message);
        });
        Ok(())
    }

    fn poll(&mut self, _ctx: &JobContext<'_>) {
        self.exit.poll();
    }
}

pub fn run_command(
    label: impl Into<String>,
    program: impl Into<String>,
    args: Vec<String>,
    cwd: Option<PathBuf>,
) -> JobHandle {
    Job::new(label, RunCommand::new(program, args, cwd))
}
