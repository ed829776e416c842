// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streaming parser for the output of a TAP (Test Anything Protocol) test
//! program.
//!
//! Unlike the ATF result-file grammar, TAP is not self-describing: a test
//! program emits a plan line (`1..N`, optionally with a `SKIP` directive)
//! and then one `ok`/`not ok` line per case, in any order relative to the
//! plan. `TapParser` is fed output line by line as it is read from the
//! child and accumulates a running tally; `finish` validates the tally
//! against the plan once the stream ends.

use crate::errors::TapParseError;
use regex::Regex;
use std::sync::OnceLock;

fn plan_regex() -> &'static Regex {
    static PLAN_RE: OnceLock<Regex> = OnceLock::new();
    PLAN_RE.get_or_init(|| Regex::new(r"^(\d+)\.\.(\d+)").expect("static regex is valid"))
}

/// Parsing progress. Once a parser reaches `BailedOut` or a plan mismatch
/// is discovered, further lines are ignored.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TapState {
    Running,
    BailedOut,
}

/// Accumulates TAP output line by line.
#[derive(Clone, Debug, Default)]
pub struct TapParser {
    state_bailed: bool,
    first_index: i64,
    last_index: i64,
    all_skipped_reason: Option<String>,
    ok_count: u64,
    not_ok_count: u64,
    parse_error: Option<TapParseError>,
}

/// The final tally reported by a TAP test program.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TapOutcome {
    pub ok_count: u64,
    pub not_ok_count: u64,
    pub bail_out: bool,
    pub all_skipped_reason: Option<String>,
}

impl TapParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TapState {
        if self.state_bailed {
            TapState::BailedOut
        } else {
            TapState::Running
        }
    }

    /// Feeds a single line of output (without its trailing newline). A
    /// no-op once the parser has bailed out or recorded an error.
    pub fn feed_line(&mut self, line: &str) {
        if self.state_bailed || self.parse_error.is_some() {
            return;
        }

        self.try_parse_plan(line);
        if self.parse_error.is_some() {
            return;
        }

        if line.starts_with("Bail out!") {
            self.state_bailed = true;
        } else if line.starts_with("not ok") {
            if line.contains("TODO") || line.contains("SKIP") {
                self.ok_count += 1;
            } else {
                self.not_ok_count += 1;
            }
        } else if line.starts_with("ok") {
            self.ok_count += 1;
        }
    }

    fn try_parse_plan(&mut self, line: &str) {
        let Some(caps) = plan_regex().captures(line) else {
            return;
        };

        let already_has_plan = self.first_index != 0 || self.last_index != 0 || self.all_skipped_reason.is_some();
        if already_has_plan {
            self.parse_error = Some(TapParseError::DuplicatePlan);
            return;
        }

        let Ok(first) = caps[1].parse::<i64>() else {
            self.parse_error = Some(TapParseError::PlanOutOfRange);
            return;
        };
        let Ok(last) = caps[2].parse::<i64>() else {
            self.parse_error = Some(TapParseError::PlanOutOfRange);
            return;
        };

        if let Some(skip_at) = line.to_ascii_lowercase().find("skip") {
            let after = line[skip_at + "skip".len()..].trim_start();
            self.all_skipped_reason = Some(if after.is_empty() { "No reason specified".to_owned() } else { after.to_owned() });
        }

        if self.all_skipped_reason.is_some() {
            if first != 1 || last != 0 {
                self.parse_error = Some(TapParseError::InvalidSkippedPlanRange);
            } else {
                self.first_index = first;
                self.last_index = last;
            }
        } else if last < first {
            self.parse_error = Some(TapParseError::ReversedPlan);
        } else {
            self.first_index = first;
            self.last_index = last;
        }
    }

    /// Finalizes parsing once the child's output stream has ended, checking
    /// the accumulated tally against the reported plan.
    pub fn finish(self) -> Result<TapOutcome, TapParseError> {
        if let Some(err) = self.parse_error {
            return Err(err);
        }

        if !self.state_bailed && self.all_skipped_reason.is_none() {
            let expected_count = self.last_index - self.first_index + 1;
            let actual_count = (self.ok_count + self.not_ok_count) as i64;
            if expected_count != actual_count {
                return Err(TapParseError::PlanMismatch);
            }
        }

        Ok(TapOutcome {
            ok_count: self.ok_count,
            not_ok_count: self.not_ok_count,
            bail_out: self.state_bailed,
            all_skipped_reason: self.all_skipped_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(lines: &[&str]) -> Result<TapOutcome, TapParseError> {
        let mut parser = TapParser::new();
        for line in lines {
            parser.feed_line(line);
        }
        parser.finish()
    }

    #[test]
    fn simple_plan_with_matching_tests() {
        let outcome = parse_all(&["1..2", "ok 1 - first", "ok 2 - second"]).unwrap();
        assert_eq!(outcome.ok_count, 2);
        assert_eq!(outcome.not_ok_count, 0);
        assert!(!outcome.bail_out);
    }

    #[test]
    fn not_ok_counts_as_failure() {
        let outcome = parse_all(&["1..1", "not ok 1 - broke"]).unwrap();
        assert_eq!(outcome.not_ok_count, 1);
    }

    #[test]
    fn not_ok_with_todo_counts_as_ok() {
        let outcome = parse_all(&["1..1", "not ok 1 - # TODO not implemented"]).unwrap();
        assert_eq!(outcome.ok_count, 1);
        assert_eq!(outcome.not_ok_count, 0);
    }

    #[test]
    fn plan_at_end_is_accepted() {
        let outcome = parse_all(&["ok 1", "ok 2", "1..2"]).unwrap();
        assert_eq!(outcome.ok_count, 2);
    }

    #[test]
    fn duplicate_plan_is_an_error() {
        let err = parse_all(&["1..1", "ok 1", "1..1"]).unwrap_err();
        assert_eq!(err, TapParseError::DuplicatePlan);
    }

    #[test]
    fn reversed_plan_is_an_error() {
        let err = parse_all(&["4..1"]).unwrap_err();
        assert_eq!(err, TapParseError::ReversedPlan);
    }

    #[test]
    fn mismatched_plan_is_an_error() {
        let err = parse_all(&["1..3", "ok 1", "ok 2"]).unwrap_err();
        assert_eq!(err, TapParseError::PlanMismatch);
    }

    #[test]
    fn skip_plan_is_accepted_without_count_check() {
        let outcome = parse_all(&["1..0 # SKIP no tests on this platform"]).unwrap();
        assert_eq!(outcome.all_skipped_reason.as_deref(), Some("no tests on this platform"));
    }

    #[test]
    fn skip_plan_with_bad_range_is_an_error() {
        let err = parse_all(&["1..5 # SKIP oops"]).unwrap_err();
        assert_eq!(err, TapParseError::InvalidSkippedPlanRange);
    }

    #[test]
    fn bail_out_stops_plan_mismatch_checks() {
        let outcome = parse_all(&["1..10", "ok 1", "Bail out! environment broken"]).unwrap();
        assert!(outcome.bail_out);
    }
}
