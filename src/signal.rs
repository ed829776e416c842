// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interrupt handling.
//!
//! Kyua's runner must notice `SIGHUP`, `SIGINT` and `SIGTERM` promptly
//! enough to stop launching new test cases and to kill whatever is
//! currently running, but must not act on a signal mid-way through an
//! unsafe section (e.g. while writing a result row). This module exposes a
//! latch: the signal handlers just record that *a* signal arrived, and
//! callers check the latch at well-defined points, the same shape nextest
//! uses its `SignalReceiver` for except collapsed to the three signals
//! kyua's driver cares about.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};

/// Shared latch recording whether an interrupt signal has arrived, and
/// which one.
#[derive(Clone, Default)]
pub struct InterruptLatch {
    signum: Arc<AtomicI32>,
}

impl InterruptLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the signal number that tripped the latch, if any.
    pub fn tripped(&self) -> Option<i32> {
        match self.signum.load(Ordering::SeqCst) {
            0 => None,
            signum => Some(signum),
        }
    }

    fn trip(&self, signum: i32) {
        // Only the first signal matters; later ones don't overwrite it.
        let _ = self.signum.compare_exchange(0, signum, Ordering::SeqCst, Ordering::SeqCst);
    }
}

/// Spawns a background task that listens for `SIGHUP`, `SIGINT` and
/// `SIGTERM` and trips `latch` on the first one received.
///
/// Returns the `JoinHandle` so callers can abort it on clean shutdown;
/// dropping the handle without aborting leaves the listener running for
/// the lifetime of the process, which is harmless.
pub fn install(latch: InterruptLatch) -> std::io::Result<tokio::task::JoinHandle<()>> {
    let mut hangup = signal(SignalKind::hangup())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = hangup.recv() => latch.trip(libc::SIGHUP),
                _ = interrupt.recv() => latch.trip(libc::SIGINT),
                _ = terminate.recv() => latch.trip(libc::SIGTERM),
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_starts_untripped() {
        let latch = InterruptLatch::new();
        assert_eq!(latch.tripped(), None);
    }

    #[test]
    fn latch_records_first_signal_only() {
        let latch = InterruptLatch::new();
        latch.trip(libc::SIGINT);
        latch.trip(libc::SIGTERM);
        assert_eq!(latch.tripped(), Some(libc::SIGINT));
    }
}
