// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsing and formatting of the ATF `result.txt` line grammar.
//!
//! A test case reports itself by writing exactly one line (plus a trailing
//! newline) to its result file. The grammar is `<tag>[(<arg>)][: <reason>]`
//! where the tag determines whether an argument and/or a reason are
//! permitted, required, or forbidden.

use crate::errors::AtfParseError;

/// A test case's self-reported result, before reconciliation against the
/// process's actual exit status.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RawAtfResult {
    Broken(String),
    ExpectedDeath(String),
    ExpectedExit(Option<i32>, String),
    ExpectedFailure(String),
    ExpectedSignal(Option<i32>, String),
    ExpectedTimeout(String),
    Failed(String),
    Passed,
    Skipped(String),
}

impl RawAtfResult {
    /// Parses the contents of a `result.txt` file (a single line, with or
    /// without its trailing newline).
    pub fn parse(contents: &str) -> Result<Self, AtfParseError> {
        let line = contents.strip_suffix('\n').unwrap_or(contents);
        if line.is_empty() {
            return Err(AtfParseError::Empty);
        }
        if line.contains('\n') {
            return Err(AtfParseError::MultipleLines(line.to_owned()));
        }

        let tag_end = line
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(line.len());
        let tag = &line[..tag_end];
        let rest = &line[tag_end..];

        match tag {
            "passed" => {
                if rest.is_empty() {
                    Ok(RawAtfResult::Passed)
                } else {
                    Err(AtfParseError::UnexpectedReason { tag: tag.to_owned() })
                }
            }
            "broken" => parse_with_reason(tag, rest).map(RawAtfResult::Broken),
            "expected_death" => parse_with_reason(tag, rest).map(RawAtfResult::ExpectedDeath),
            "expected_failure" => parse_with_reason(tag, rest).map(RawAtfResult::ExpectedFailure),
            "expected_timeout" => parse_with_reason(tag, rest).map(RawAtfResult::ExpectedTimeout),
            "failed" => parse_with_reason(tag, rest).map(RawAtfResult::Failed),
            "skipped" => parse_with_reason(tag, rest).map(RawAtfResult::Skipped),
            "expected_exit" => {
                let (arg, reason) = parse_with_reason_and_arg(tag, rest)?;
                Ok(RawAtfResult::ExpectedExit(arg, reason))
            }
            "expected_signal" => {
                let (arg, reason) = parse_with_reason_and_arg(tag, rest)?;
                Ok(RawAtfResult::ExpectedSignal(arg, reason))
            }
            other => Err(AtfParseError::UnknownTag(other.to_owned())),
        }
    }

    /// Serializes back to the on-disk `result.txt` line grammar (without a
    /// trailing newline).
    pub fn format(&self) -> String {
        match self {
            RawAtfResult::Passed => "passed".to_owned(),
            RawAtfResult::Broken(reason) => format!("broken: {reason}"),
            RawAtfResult::ExpectedDeath(reason) => format!("expected_death: {reason}"),
            RawAtfResult::ExpectedFailure(reason) => format!("expected_failure: {reason}"),
            RawAtfResult::ExpectedTimeout(reason) => format!("expected_timeout: {reason}"),
            RawAtfResult::Failed(reason) => format!("failed: {reason}"),
            RawAtfResult::Skipped(reason) => format!("skipped: {reason}"),
            RawAtfResult::ExpectedExit(arg, reason) => match arg {
                Some(code) => format!("expected_exit({code}): {reason}"),
                None => format!("expected_exit: {reason}"),
            },
            RawAtfResult::ExpectedSignal(arg, reason) => match arg {
                Some(signo) => format!("expected_signal({signo}): {reason}"),
                None => format!("expected_signal: {reason}"),
            },
        }
    }
}

/// Parses the `: <reason>` suffix required by tags that take a reason but
/// no argument.
fn parse_with_reason(tag: &str, rest: &str) -> Result<String, AtfParseError> {
    let reason = rest.strip_prefix(": ").ok_or_else(|| AtfParseError::MissingReason { tag: tag.to_owned() })?;
    if reason.is_empty() {
        return Err(AtfParseError::MissingReason { tag: tag.to_owned() });
    }
    Ok(reason.to_owned())
}

/// Parses the `[(<arg>)]: <reason>` suffix used by `expected_exit` and
/// `expected_signal`.
fn parse_with_reason_and_arg(tag: &str, rest: &str) -> Result<(Option<i32>, String), AtfParseError> {
    let (arg_str, after_arg) = if let Some(stripped) = rest.strip_prefix('(') {
        let close = stripped.find(')').ok_or_else(|| AtfParseError::InvalidExitOrSignalFormat {
            tag: tag.to_owned(),
            rest: rest.to_owned(),
        })?;
        (Some(&stripped[..close]), &stripped[close + 1..])
    } else {
        (None, rest)
    };

    let reason = after_arg
        .strip_prefix(": ")
        .ok_or_else(|| AtfParseError::InvalidExitOrSignalFormat {
            tag: tag.to_owned(),
            rest: rest.to_owned(),
        })?;
    if reason.is_empty() {
        return Err(AtfParseError::InvalidExitOrSignalFormat {
            tag: tag.to_owned(),
            rest: rest.to_owned(),
        });
    }

    let arg = match arg_str {
        None => None,
        Some(digits) => Some(digits.parse::<i32>().map_err(|_| AtfParseError::InvalidInteger {
            tag: tag.to_owned(),
            arg: digits.to_owned(),
        })?),
    };

    Ok((arg, reason.to_owned()))
}
