// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::SupervisedCommand;
use crate::errors::SupervisedForkError;
use crate::isolation;
use crate::signal::InterruptLatch;
use std::fs::File;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// How a supervised child stopped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExitReason {
    /// The process ran to completion and called `exit(code)`.
    Exited(i32),
    /// The process was killed by a signal before calling `exit`.
    Signaled(i32),
    /// The process and its process group were killed after exceeding the
    /// configured timeout.
    TimedOut,
    /// The process and its process group were killed because the runner
    /// received an interrupt signal.
    Interrupted(i32),
}

/// The result of supervising a single child process to completion.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SupervisedOutcome {
    pub reason: ExitReason,
}

/// How often the supervision loop polls the interrupt latch while waiting
/// on the child. Signals are asynchronous at the OS level but this crate's
/// latch is a plain atomic, so we check it on a short tick instead of
/// threading a notifier through `tokio::signal`.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub async fn spawn_supervised(
    command: SupervisedCommand<'_>,
    interrupt: InterruptLatch,
) -> Result<SupervisedOutcome, SupervisedForkError> {
    let stdout_file = File::create(command.stdout_path).map_err(|source| SupervisedForkError::OpenOutputFile {
        path: command.stdout_path.to_owned(),
        source,
    })?;
    let stderr_file = File::create(command.stderr_path).map_err(|source| SupervisedForkError::OpenOutputFile {
        path: command.stderr_path.to_owned(),
        source,
    })?;

    let mut builder = Command::new(command.program.as_std_path());
    builder
        .args(command.args)
        .current_dir(command.work_dir.as_std_path())
        .envs(command.env)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_file))
        .stderr(Stdio::from(stderr_file));

    let work_dir = command.work_dir.to_owned();
    let unprivileged_user = command.unprivileged_user.cloned();
    unsafe {
        builder.pre_exec(move || {
            isolation::isolate(&work_dir).map_err(std::io::Error::other)?;
            if let Some(user) = &unprivileged_user {
                isolation::drop_privileges(user).map_err(std::io::Error::other)?;
            }
            Ok(())
        });
    }

    let mut child = builder.spawn().map_err(|source| SupervisedForkError::Spawn { source })?;
    let pid = child.id().ok_or_else(|| SupervisedForkError::Spawn {
        source: std::io::Error::other("child exited before its pid could be observed"),
    })? as i32;

    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let deadline = tokio::time::Instant::now() + command.timeout;

    loop {
        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|source| SupervisedForkError::Wait { source })?;
                return Ok(SupervisedOutcome { reason: status_to_reason(status) });
            }
            _ = ticker.tick() => {
                if tokio::time::Instant::now() >= deadline {
                    kill_process_group(pid);
                    let _ = child.wait().await;
                    return Ok(SupervisedOutcome { reason: ExitReason::TimedOut });
                }
                if let Some(signum) = interrupt.tripped() {
                    kill_process_group(pid);
                    let _ = child.wait().await;
                    return Ok(SupervisedOutcome { reason: ExitReason::Interrupted(signum) });
                }
            }
        }
    }
}

fn status_to_reason(status: std::process::ExitStatus) -> ExitReason {
    match status.code() {
        Some(code) => ExitReason::Exited(code),
        None => ExitReason::Signaled(status.signal().unwrap_or(0)),
    }
}

/// Sends `SIGKILL` to the whole process group rooted at `pid`.
///
/// This relies on [`crate::isolation::isolate`] having called `setpgid(0,
/// 0)` in the child, which makes `pid` both the process id and the process
/// group id; killing `-pid` reaches any grandchildren the test spawned.
fn kill_process_group(pid: i32) {
    unsafe {
        libc::kill(-pid, libc::SIGKILL);
    }
}
