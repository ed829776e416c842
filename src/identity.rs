// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stable identities for test programs and test cases.

use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;

/// An opaque handle identifying a test binary within a suite.
///
/// Created when the manifest is loaded; immutable thereafter.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TestProgramId {
    /// Path to the test binary, relative to the root of the test suite.
    relative_path: Utf8PathBuf,
    /// Absolute path to the test binary, derived from `relative_path` and
    /// the suite's root directory at load time.
    absolute_path: Utf8PathBuf,
    /// Free-form label used to key per-suite configuration properties.
    test_suite_name: String,
}

impl TestProgramId {
    /// Creates a new test program identity.
    pub fn new(
        relative_path: impl Into<Utf8PathBuf>,
        absolute_path: impl Into<Utf8PathBuf>,
        test_suite_name: impl Into<String>,
    ) -> Self {
        Self {
            relative_path: relative_path.into(),
            absolute_path: absolute_path.into(),
            test_suite_name: test_suite_name.into(),
        }
    }

    pub fn relative_path(&self) -> &Utf8Path {
        &self.relative_path
    }

    pub fn absolute_path(&self) -> &Utf8Path {
        &self.absolute_path
    }

    pub fn test_suite_name(&self) -> &str {
        &self.test_suite_name
    }
}

impl fmt::Display for TestProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.relative_path)
    }
}

/// The stable external identity of a test case: the test program that
/// contains it (by relative path) plus its name within that program.
///
/// `case_name` is guaranteed non-empty and free of `:` characters, which
/// is reserved as the separator between a program path and a case name in
/// filter strings (see [`crate::filter::Filter`]).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TestCaseId {
    program_relative_path: Utf8PathBuf,
    case_name: String,
}

impl TestCaseId {
    /// Creates a new test case identity.
    ///
    /// # Panics
    ///
    /// Panics if `case_name` is empty or contains `:`. Test-program output
    /// is untrusted and must be validated before it reaches this
    /// constructor; see `test_program::parse_listing`, which rejects a bad
    /// `ident` value with `TestProgramError::InvalidCaseName` instead of
    /// calling this.
    pub fn new(program_relative_path: impl Into<Utf8PathBuf>, case_name: impl Into<String>) -> Self {
        let case_name = case_name.into();
        assert!(!case_name.is_empty(), "case name must not be empty");
        assert!(!case_name.contains(':'), "case name must not contain ':'");
        Self {
            program_relative_path: program_relative_path.into(),
            case_name,
        }
    }

    pub fn program_relative_path(&self) -> &Utf8Path {
        &self.program_relative_path
    }

    pub fn case_name(&self) -> &str {
        &self.case_name
    }
}

impl fmt::Display for TestCaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.program_relative_path, self.case_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let id = TestCaseId::new("suite/bin", "my_test");
        assert_eq!(id.to_string(), "suite/bin:my_test");
    }

    #[test]
    #[should_panic(expected = "must not contain")]
    fn rejects_colon_in_case_name() {
        TestCaseId::new("suite/bin", "bad:name");
    }
}
