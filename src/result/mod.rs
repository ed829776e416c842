// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test result protocols (C3): parsing what a test program reports about
//! itself, and reconciling that self-report against what the supervisor
//! actually observed.

mod atf;
mod outcome;
mod reconcile;
mod tap;

pub use atf::RawAtfResult;
pub use outcome::{TestResult, TestResultKind};
pub use reconcile::{adjust_with_status, adjust_with_timeout, apply_cleanup, externalize};
pub use tap::{TapOutcome, TapParser, TapState};
