// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process isolation (C1): the steps taken inside a freshly-forked child,
//! before it execs the test program, to keep one test case from disturbing
//! the controlling terminal, the parent's environment, or another test
//! case's work directory.
//!
//! This module only runs on Unix; kyua has never targeted Windows and this
//! crate follows suit (see the REDESIGN FLAGS this crate's specification
//! records).

use crate::config::UnprivilegedUser;
use crate::errors::IsolationError;
use camino::Utf8Path;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd::{self, Gid, Pid, Uid};
use std::ffi::CStr;

/// Environment variables that leak locale and timezone state into a test
/// process; cleared so tests run under a reproducible `C` locale regardless
/// of the operator's shell.
const SCRUBBED_VARS: &[&str] = &["LANG", "LC_ALL", "LC_COLLATE", "LC_CTYPE", "LC_MESSAGES", "LC_MONETARY", "LC_NUMERIC", "LC_TIME", "TZ"];

/// Every standard POSIX signal (1 through 31; `nix::sys::signal::Signal`
/// has no variants for the real-time range), skipping `SIGKILL` and
/// `SIGSTOP` (which can't be reset and which `sigaction` rejects).
fn resettable_signals() -> impl Iterator<Item = Signal> {
    (1..=31).filter_map(|raw| {
        let signal = Signal::try_from(raw).ok()?;
        if matches!(signal, Signal::SIGKILL | Signal::SIGSTOP) {
            None
        } else {
            Some(signal)
        }
    })
}

/// Isolates the calling process in preparation for running a test case.
///
/// Must be called in the child after `fork` and before `exec`. Puts the
/// process into its own process group (so a timeout kill can reach any
/// grandchildren the test spawns), resets `umask` to a known value, resets
/// every signal disposition to `SIG_DFL`, scrubs locale/display variables
/// from the environment, and `chdir`s into `work_dir` with `HOME` pointed
/// at the same place.
pub fn isolate(work_dir: &Utf8Path) -> Result<(), IsolationError> {
    let _ = unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0));

    unsafe {
        libc::umask(0o022);
    }

    for signal in resettable_signals() {
        unsafe {
            let _ = signal::signal(signal, SigHandler::SigDfl);
        }
    }

    for var in SCRUBBED_VARS {
        unsafe {
            std::env::remove_var(var);
        }
    }

    std::env::set_var("HOME", work_dir.as_str());

    unistd::chdir(work_dir.as_std_path()).map_err(|errno| IsolationError::ChangeDirectory {
        work_dir: work_dir.to_owned(),
        source: std::io::Error::from_raw_os_error(errno as i32),
    })
}

/// Drops root privileges down to `user`, in preparation for running a test
/// case whose metadata declares `require.user = unprivileged`.
///
/// The group id is dropped before the user id, matching the usual
/// "can't regain root" ordering: once `setuid` succeeds there is no way
/// back to a uid that could still change the gid.
pub fn drop_privileges(user: &UnprivilegedUser) -> Result<(), IsolationError> {
    unistd::setgid(Gid::from_raw(user.gid)).map_err(|errno| IsolationError::DropPrivileges {
        uid: user.uid,
        gid: user.gid,
        source: std::io::Error::from_raw_os_error(errno as i32),
    })?;
    unistd::setuid(Uid::from_raw(user.uid)).map_err(|errno| IsolationError::DropPrivileges {
        uid: user.uid,
        gid: user.gid,
        source: std::io::Error::from_raw_os_error(errno as i32),
    })
}

/// Changes ownership of `path` (typically a freshly-created work directory)
/// to `user`, so a privilege-dropped test case can still write into it.
pub fn chown_work_dir(path: &Utf8Path, user: &UnprivilegedUser) -> Result<(), IsolationError> {
    let c_path =
        std::ffi::CString::new(path.as_str()).map_err(|_| IsolationError::ChownWorkDir {
            path: path.to_owned(),
            uid: user.uid,
            gid: user.gid,
            source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
        })?;
    chown_cstr(&c_path, user).map_err(|errno| IsolationError::ChownWorkDir {
        path: path.to_owned(),
        uid: user.uid,
        gid: user.gid,
        source: std::io::Error::from_raw_os_error(errno),
    })
}

fn chown_cstr(path: &CStr, user: &UnprivilegedUser) -> Result<(), i32> {
    let result = unsafe { libc::chown(path.as_ptr(), user.uid, user.gid) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resettable_signals_excludes_kill_and_stop() {
        let signals: Vec<Signal> = resettable_signals().collect();
        assert!(!signals.contains(&Signal::SIGKILL));
        assert!(!signals.contains(&Signal::SIGSTOP));
        assert!(signals.contains(&Signal::SIGTERM));
        assert!(signals.contains(&Signal::SIGHUP));
    }
}
