// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test programs: binaries that, when invoked with `-l`, print a listing of
//! the test cases they contain along with each case's metadata.
//!
//! A program is asked for its list of cases at most once; the scanner (C5)
//! holds one [`TestProgram`] per binary and repeatedly calls [`cases`],
//! which only actually spawns the listing process the first time.

use crate::errors::TestProgramError;
use crate::identity::{TestCaseId, TestProgramId};
use crate::metadata::Metadata;
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::OnceCell;

/// A single test binary and the (possibly not yet loaded) cases it exposes.
pub struct TestProgram {
    id: TestProgramId,
    cases: OnceCell<Vec<(TestCaseId, Metadata)>>,
}

impl TestProgram {
    pub fn new(id: TestProgramId) -> Self {
        Self { id, cases: OnceCell::new() }
    }

    pub fn id(&self) -> &TestProgramId {
        &self.id
    }

    /// Builds a program whose case listing is already known, skipping the
    /// `program -l` invocation entirely. Used by tests elsewhere in this
    /// crate (e.g. the scanner) that want to drive the scan logic without
    /// spawning a real process.
    #[cfg(test)]
    pub(crate) fn with_cases(id: TestProgramId, cases: Vec<(TestCaseId, Metadata)>) -> Self {
        Self { id, cases: OnceCell::new_with(Some(cases)) }
    }

    /// Returns this program's test cases, invoking `program -l` the first
    /// time this is called and caching the result thereafter.
    pub async fn cases(&self) -> Result<&[(TestCaseId, Metadata)], TestProgramError> {
        let cases = self
            .cases
            .get_or_try_init(|| async {
                let output = Command::new(self.id.absolute_path().as_std_path()).arg("-l").stdin(Stdio::null()).output().await?;
                parse_listing(self.id.relative_path(), &String::from_utf8_lossy(&output.stdout))
            })
            .await?;
        Ok(cases)
    }
}

/// Parses the output of `program -l`: a sequence of property blocks
/// separated by blank lines, each block's first line being `ident: <name>`
/// followed by zero or more metadata properties.
fn parse_listing(program_relative_path: &camino::Utf8Path, output: &str) -> Result<Vec<(TestCaseId, Metadata)>, TestProgramError> {
    let mut result = Vec::new();

    for block in output.split("\n\n") {
        let mut lines = block.lines().filter(|line| !line.trim().is_empty());
        let Some(first) = lines.next() else {
            continue;
        };

        let (key, value) = split_property(first);
        if key != "ident" {
            return Err(TestProgramError::MissingIdent);
        }
        let case_name = value.to_owned();
        if case_name.is_empty() || case_name.contains(':') {
            return Err(TestProgramError::InvalidCaseName(case_name));
        }

        let mut properties = Vec::new();
        for line in lines {
            properties.push(split_property(line));
        }
        let metadata = Metadata::from_properties(properties)?;

        result.push((TestCaseId::new(program_relative_path, case_name), metadata));
    }

    Ok(result)
}

fn split_property(line: &str) -> (&str, &str) {
    match line.split_once(':') {
        Some((key, value)) => (key.trim(), value.trim()),
        None => (line.trim(), ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8Path;

    #[test]
    fn parses_single_case_with_metadata() {
        let output = "ident: my_test\ndescr: does a thing\ntimeout: 30\n";
        let cases = parse_listing(Utf8Path::new("dir/prog"), output).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].0.case_name(), "my_test");
        assert_eq!(cases[0].1.description, "does a thing");
    }

    #[test]
    fn parses_multiple_blocks() {
        let output = "ident: first\n\nident: second\ndescr: two\n";
        let cases = parse_listing(Utf8Path::new("dir/prog"), output).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[1].0.case_name(), "second");
    }

    #[test]
    fn rejects_block_missing_ident() {
        let output = "descr: oops\n";
        let err = parse_listing(Utf8Path::new("dir/prog"), output).unwrap_err();
        assert!(matches!(err, TestProgramError::MissingIdent));
    }

    #[test]
    fn rejects_empty_ident() {
        let output = "ident: \ndescr: oops\n";
        let err = parse_listing(Utf8Path::new("dir/prog"), output).unwrap_err();
        assert!(matches!(err, TestProgramError::InvalidCaseName(name) if name.is_empty()));
    }

    #[test]
    fn rejects_ident_containing_colon() {
        let output = "ident: foo:bar\n";
        let err = parse_listing(Utf8Path::new("dir/prog"), output).unwrap_err();
        assert!(matches!(err, TestProgramError::InvalidCaseName(name) if name == "foo:bar"));
    }
}
