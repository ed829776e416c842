// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconciliation of a test case's self-reported result against what the
//! supervisor actually observed.
//!
//! A test program that writes `passed` to its result file but then exits
//! with a non-zero status is lying, whether through a bug or a crash after
//! the result file was written. `adjust_with_status` and
//! `adjust_with_timeout` exist to catch that: they downgrade any raw result
//! to `Broken` whenever the process's actual termination doesn't match what
//! the reported result promises.

use super::atf::RawAtfResult;
use super::outcome::TestResultKind;
use crate::process::ExitReason;
use std::time::Duration;

fn format_status(reason: &ExitReason) -> String {
    match reason {
        ExitReason::Exited(code) => format!("exited with code {code}"),
        ExitReason::Signaled(signo) => format!("received signal {signo}"),
        ExitReason::TimedOut => "timed out".to_owned(),
        ExitReason::Interrupted(signo) => format!("was interrupted by signal {signo}"),
    }
}

/// Reconciles a parsed raw result against the body process's actual exit
/// status. `raw` is `None` when the result file is missing or unreadable.
pub fn adjust_with_status(raw: Option<RawAtfResult>, status: &ExitReason) -> RawAtfResult {
    let Some(raw) = raw else {
        return RawAtfResult::Broken(format!("Premature exit: {}", format_status(status)));
    };

    match raw {
        RawAtfResult::Broken(_) => raw,
        RawAtfResult::ExpectedDeath(_) => raw,
        RawAtfResult::ExpectedExit(expected_code, _) => match status {
            ExitReason::Exited(actual_code) => match expected_code {
                None => raw,
                Some(expected) if expected == *actual_code => raw,
                Some(expected) => RawAtfResult::Broken(format!("Expected clean exit with code {expected} but got code {actual_code}")),
            },
            other => RawAtfResult::Broken(format!("Expected clean exit but {}", format_status(other))),
        },
        RawAtfResult::ExpectedFailure(_) => match status {
            ExitReason::Exited(0) => raw,
            other => RawAtfResult::Broken(format!("Expected failure should have reported success but {}", format_status(other))),
        },
        RawAtfResult::ExpectedSignal(expected_signo, _) => match status {
            ExitReason::Signaled(actual_signo) => match expected_signo {
                None => raw,
                Some(expected) if expected == *actual_signo => raw,
                Some(expected) => RawAtfResult::Broken(format!("Expected signal {expected} but got {actual_signo}")),
            },
            other => RawAtfResult::Broken(format!("Expected signal but {}", format_status(other))),
        },
        RawAtfResult::ExpectedTimeout(_) => RawAtfResult::Broken(format!("Expected timeout but {}", format_status(status))),
        RawAtfResult::Failed(_) => match status {
            ExitReason::Exited(1) => raw,
            other => RawAtfResult::Broken(format!("Failed test case should have reported failure but {}", format_status(other))),
        },
        RawAtfResult::Passed => match status {
            ExitReason::Exited(0) => raw,
            other => RawAtfResult::Broken(format!("Passed test case should have reported success but {}", format_status(other))),
        },
        RawAtfResult::Skipped(_) => match status {
            ExitReason::Exited(0) => raw,
            other => RawAtfResult::Broken(format!("Skipped test case should have reported success but {}", format_status(other))),
        },
    }
}

/// Reconciles a raw result against a timeout: the body process never
/// finished, so the only acceptable self-report is `expected_timeout`.
pub fn adjust_with_timeout(raw: Option<RawAtfResult>, timeout: Duration) -> RawAtfResult {
    match raw {
        Some(RawAtfResult::ExpectedTimeout(reason)) => RawAtfResult::ExpectedTimeout(reason),
        _ => RawAtfResult::Broken(format!("Test case timed out after {} seconds", timeout.as_secs())),
    }
}

/// Collapses a reconciled raw result down to the five outcomes the store
/// can represent. `expected_death`/`expected_exit`/`expected_signal`/
/// `expected_timeout` only ever reach this function once they have already
/// been validated as "good" by `adjust_with_status`, so they externalize as
/// a plain pass.
pub fn externalize(raw: RawAtfResult) -> TestResultKind {
    match raw {
        RawAtfResult::Passed => TestResultKind::Passed,
        RawAtfResult::Failed(reason) => TestResultKind::Failed(reason),
        RawAtfResult::Skipped(reason) => TestResultKind::Skipped(reason),
        RawAtfResult::ExpectedFailure(reason) => TestResultKind::ExpectedFailure(reason),
        RawAtfResult::Broken(reason) => TestResultKind::Broken(reason),
        RawAtfResult::ExpectedDeath(_) | RawAtfResult::ExpectedExit(_, _) | RawAtfResult::ExpectedSignal(_, _) | RawAtfResult::ExpectedTimeout(_) => TestResultKind::Passed,
    }
}

/// Applies the outcome of a test case's cleanup routine on top of an
/// already-reconciled body result. A failing cleanup can only ever make a
/// good result `Broken`; it can never rescue a bad one.
pub fn apply_cleanup(result: TestResultKind, has_cleanup: bool, cleanup_status: Option<&ExitReason>, timeout: Duration) -> TestResultKind {
    if !has_cleanup || !result.is_good_ignoring_cleanup() {
        return result;
    }

    match cleanup_status {
        Some(ExitReason::Exited(0)) => result,
        Some(_) => TestResultKind::Broken("Test case cleanup did not terminate successfully".to_owned()),
        None => TestResultKind::Broken(format!("Test case cleanup timed out after {} seconds", timeout.as_secs())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_result_file_is_broken() {
        let adjusted = adjust_with_status(None, &ExitReason::Exited(0));
        assert_eq!(adjusted, RawAtfResult::Broken("Premature exit: exited with code 0".to_owned()));
    }

    #[test]
    fn passed_matching_exit_stays_passed() {
        let adjusted = adjust_with_status(Some(RawAtfResult::Passed), &ExitReason::Exited(0));
        assert_eq!(adjusted, RawAtfResult::Passed);
    }

    #[test]
    fn passed_with_nonzero_exit_becomes_broken() {
        let adjusted = adjust_with_status(Some(RawAtfResult::Passed), &ExitReason::Signaled(3));
        assert_eq!(adjusted, RawAtfResult::Broken("Passed test case should have reported success but received signal 3".to_owned()));
    }

    #[test]
    fn expected_exit_any_code_accepts_any_exit() {
        let raw = RawAtfResult::ExpectedExit(None, "any code".to_owned());
        let adjusted = adjust_with_status(Some(raw.clone()), &ExitReason::Exited(57));
        assert_eq!(adjusted, raw);
    }

    #[test]
    fn expected_exit_specific_code_mismatch_becomes_broken() {
        let raw = RawAtfResult::ExpectedExit(Some(5), "specific".to_owned());
        let adjusted = adjust_with_status(Some(raw), &ExitReason::Exited(6));
        assert_eq!(adjusted, RawAtfResult::Broken("Expected clean exit with code 5 but got code 6".to_owned()));
    }

    #[test]
    fn timeout_without_expected_timeout_report_is_broken() {
        let adjusted = adjust_with_timeout(Some(RawAtfResult::Passed), Duration::from_secs(30));
        assert_eq!(adjusted, RawAtfResult::Broken("Test case timed out after 30 seconds".to_owned()));
    }

    #[test]
    fn timeout_with_expected_timeout_report_is_kept() {
        let adjusted = adjust_with_timeout(Some(RawAtfResult::ExpectedTimeout("slow".to_owned())), Duration::from_secs(30));
        assert_eq!(adjusted, RawAtfResult::ExpectedTimeout("slow".to_owned()));
    }

    #[test]
    fn externalize_collapses_expected_variants_to_passed() {
        assert_eq!(externalize(RawAtfResult::ExpectedDeath("x".to_owned())), TestResultKind::Passed);
        assert_eq!(externalize(RawAtfResult::ExpectedExit(Some(1), "x".to_owned())), TestResultKind::Passed);
        assert_eq!(externalize(RawAtfResult::ExpectedSignal(Some(1), "x".to_owned())), TestResultKind::Passed);
        assert_eq!(externalize(RawAtfResult::ExpectedTimeout("x".to_owned())), TestResultKind::Passed);
    }

    #[test]
    fn cleanup_failure_breaks_a_good_result() {
        let result = apply_cleanup(TestResultKind::Passed, true, Some(&ExitReason::Exited(1)), Duration::from_secs(10));
        assert_eq!(result, TestResultKind::Broken("Test case cleanup did not terminate successfully".to_owned()));
    }

    #[test]
    fn cleanup_timeout_breaks_a_good_result() {
        let result = apply_cleanup(TestResultKind::Passed, true, None, Duration::from_secs(10));
        assert_eq!(result, TestResultKind::Broken("Test case cleanup timed out after 10 seconds".to_owned()));
    }

    #[test]
    fn cleanup_is_ignored_when_body_already_broken() {
        let result = apply_cleanup(TestResultKind::Broken("already broken".to_owned()), true, Some(&ExitReason::Exited(1)), Duration::from_secs(10));
        assert_eq!(result, TestResultKind::Broken("already broken".to_owned()));
    }
}
