// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The final, reconciled outcome of running a test case: what gets handed
//! to the store (C6) and to a report.

use std::time::Duration;

/// The five outcomes the store's schema can represent. A passed result
/// never carries a reason; every other kind always does.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TestResultKind {
    Passed,
    Failed(String),
    Skipped(String),
    ExpectedFailure(String),
    Broken(String),
}

impl TestResultKind {
    /// The string the store's schema uses to represent this kind (see
    /// `put_result` in the original implementation's transaction layer).
    pub fn store_tag(&self) -> &'static str {
        match self {
            TestResultKind::Passed => "passed",
            TestResultKind::Failed(_) => "failed",
            TestResultKind::Skipped(_) => "skipped",
            TestResultKind::ExpectedFailure(_) => "expected_failure",
            TestResultKind::Broken(_) => "broken",
        }
    }

    /// The reason text, if any. `None` exactly when `store_tag` is
    /// `"passed"`; the store enforces this as an integrity invariant.
    pub fn reason(&self) -> Option<&str> {
        match self {
            TestResultKind::Passed => None,
            TestResultKind::Failed(r)
            | TestResultKind::Skipped(r)
            | TestResultKind::ExpectedFailure(r)
            | TestResultKind::Broken(r) => Some(r),
        }
    }

    /// True for `Passed`, `Skipped` and `ExpectedFailure`; false for
    /// `Broken` and `Failed`.
    pub fn is_good_ignoring_cleanup(&self) -> bool {
        matches!(self, TestResultKind::Passed | TestResultKind::Skipped(_) | TestResultKind::ExpectedFailure(_))
    }
}

/// A test case's outcome together with how long it took to run.
#[derive(Clone, Debug, PartialEq)]
pub struct TestResult {
    pub kind: TestResultKind,
    pub duration: Duration,
}

impl TestResult {
    pub fn new(kind: TestResultKind, duration: Duration) -> Self {
        Self { kind, duration }
    }

    /// True for `Passed`, `Skipped` and `ExpectedFailure`; false for
    /// `Broken` and `Failed`. Mirrors the original implementation's `good()`
    /// classification used for summary counts.
    pub fn is_good(&self) -> bool {
        self.kind.is_good_ignoring_cleanup()
    }
}
