// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Supervised process execution (C2): fork/exec a test program's body or
//! cleanup routine, capture its output, enforce a timeout, and report back
//! how it exited.
//!
//! The supervision loop itself (spawn, race the child against a timer and
//! an interrupt latch, kill the process group on timeout) is plumbed with
//! `tokio`, mirroring how the teacher drives child processes through
//! `tokio::select!` rather than blocking threads -- even though, unlike the
//! teacher, this crate only ever supervises one child at a time.

mod unix;

pub use unix::{ExitReason, SupervisedOutcome, spawn_supervised};

use crate::signal::InterruptLatch;
use camino::Utf8Path;
use std::collections::HashMap;
use std::time::Duration;

/// Everything needed to launch a test program invocation (either the body
/// or the cleanup routine).
pub struct SupervisedCommand<'a> {
    pub program: &'a Utf8Path,
    pub args: &'a [String],
    pub work_dir: &'a Utf8Path,
    pub env: &'a HashMap<String, String>,
    pub stdout_path: &'a Utf8Path,
    pub stderr_path: &'a Utf8Path,
    pub timeout: Duration,
    pub unprivileged_user: Option<&'a crate::config::UnprivilegedUser>,
}

/// Runs `command` to completion, respecting `interrupt`. Returns once the
/// child has exited, timed out, or been killed because of an interrupt.
pub async fn run(command: SupervisedCommand<'_>, interrupt: InterruptLatch) -> Result<SupervisedOutcome, crate::errors::SupervisedForkError> {
    spawn_supervised(command, interrupt).await
}
