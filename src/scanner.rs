// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scans a collection of test programs, yielding one test case at a time
//! (C5).
//!
//! Test programs are only asked to list their cases as the scan reaches
//! them, not up front, so a filter that rules out the tail of a large suite
//! never pays the cost of listing the programs it never visits. The order
//! in which programs and cases are visited is unspecified.

use crate::filter::{Filter, FilterSet};
use crate::identity::TestCaseId;
use crate::test_program::TestProgram;
use std::collections::BTreeSet;
use std::sync::Arc;

/// One step of the scan: either a matched test case, or a program whose
/// `-l` listing itself failed (untrusted input from the test program, not a
/// fault in this crate).
pub enum ScanOutcome {
    Case(Arc<TestProgram>, TestCaseId),
    ListingFailed(Arc<TestProgram>, String),
}

/// Scans `programs`, yielding only the `(program, case)` pairs that match
/// `filters` (or every pair, if `filters` is empty).
pub struct Scanner {
    programs: Vec<Arc<TestProgram>>,
    filters: FilterSet,
    matched: BTreeSet<String>,
    program_index: usize,
    case_index: usize,
}

impl Scanner {
    pub fn new(programs: Vec<Arc<TestProgram>>, filters: FilterSet) -> Self {
        Self {
            programs,
            filters,
            matched: BTreeSet::new(),
            program_index: 0,
            case_index: 0,
        }
    }

    /// True once every program has been visited.
    pub fn done(&self) -> bool {
        self.program_index >= self.programs.len()
    }

    /// Returns the next matching `(program, case)` pair, or `None` once the
    /// scan is exhausted. Lists a program's cases on first visiting it.
    ///
    /// If a program's listing fails -- malformed output is untrusted input
    /// from the test program, not this crate -- the scan reports it once as
    /// [`ScanOutcome::ListingFailed`] and moves on to the next program
    /// rather than aborting the whole scan.
    pub async fn next_pair(&mut self) -> Option<ScanOutcome> {
        loop {
            if self.program_index >= self.programs.len() {
                return None;
            }

            let program = self.programs[self.program_index].clone();
            let cases = match program.cases().await {
                Ok(cases) => cases,
                Err(err) => {
                    self.program_index += 1;
                    self.case_index = 0;
                    return Some(ScanOutcome::ListingFailed(program, err.to_string()));
                }
            };

            if self.case_index >= cases.len() {
                self.program_index += 1;
                self.case_index = 0;
                continue;
            }

            let (case_id, _metadata) = &cases[self.case_index];
            let case_id = case_id.clone();
            self.case_index += 1;

            if self.filters.is_empty() {
                return Some(ScanOutcome::Case(program, case_id));
            }

            let matching = self.filters.matching(case_id.program_relative_path(), case_id.case_name());
            if matching.is_empty() {
                continue;
            }
            for filter in matching {
                self.matched.insert(filter.to_string());
            }
            return Some(ScanOutcome::Case(program, case_id));
        }
    }

    /// Returns the filters that never matched any test case, in their
    /// original order.
    pub fn unused_filters(&self) -> Vec<Filter> {
        self.filters.iter().filter(|f| !self.matched.contains(&f.to_string())).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::TestProgramId;
    use crate::metadata::Metadata;

    fn program(relative_path: &str, case_names: &[&str]) -> Arc<TestProgram> {
        let id = TestProgramId::new(relative_path, format!("/suite/{relative_path}"), "mysuite");
        let cases: Vec<(TestCaseId, Metadata)> = case_names.iter().map(|name| (TestCaseId::new(id.relative_path(), *name), Metadata::default())).collect();
        Arc::new(TestProgram::with_cases(id, cases))
    }

    fn case_name(outcome: ScanOutcome) -> String {
        match outcome {
            ScanOutcome::Case(_, case_id) => case_id.to_string(),
            ScanOutcome::ListingFailed(program, reason) => panic!("unexpected listing failure for {}: {reason}", program.id()),
        }
    }

    #[tokio::test]
    async fn yields_every_case_when_filters_are_empty() {
        let a = program("dir/a", &["one", "two"]);
        let b = program("dir/b", &["three"]);
        let mut scanner = Scanner::new(vec![a, b], FilterSet::new(Vec::new()).unwrap());

        let mut seen = Vec::new();
        while let Some(outcome) = scanner.next_pair().await {
            seen.push(case_name(outcome));
        }
        assert_eq!(seen, vec!["dir/a:one", "dir/a:two", "dir/b:three"]);
        assert!(scanner.done());
    }

    #[tokio::test]
    async fn applies_a_case_qualified_filter() {
        let a = program("dir/a", &["one", "two"]);
        let filters = FilterSet::new(vec!["dir/a:two".parse().unwrap()]).unwrap();
        let mut scanner = Scanner::new(vec![a], filters);

        let outcome = scanner.next_pair().await.unwrap();
        assert_eq!(case_name(outcome), "dir/a:two");
        assert!(scanner.next_pair().await.is_none());
    }

    #[tokio::test]
    async fn tracks_unused_filters() {
        let a = program("dir/a", &["one"]);
        let filters = FilterSet::new(vec!["dir/a:one".parse().unwrap(), "dir/missing".parse().unwrap()]).unwrap();
        let mut scanner = Scanner::new(vec![a], filters);

        while scanner.next_pair().await.is_some() {}
        let unused: Vec<String> = scanner.unused_filters().iter().map(ToString::to_string).collect();
        assert_eq!(unused, vec!["dir/missing"]);
    }

    #[tokio::test]
    async fn listing_failure_is_reported_and_scan_continues() {
        let broken = Arc::new(TestProgram::new(TestProgramId::new("dir/broken", "/nonexistent/dir/broken", "mysuite")));
        let ok = program("dir/ok", &["one"]);
        let mut scanner = Scanner::new(vec![broken, ok], FilterSet::new(Vec::new()).unwrap());

        match scanner.next_pair().await.unwrap() {
            ScanOutcome::ListingFailed(program, _) => assert_eq!(program.id().relative_path(), camino::Utf8Path::new("dir/broken")),
            ScanOutcome::Case(..) => panic!("expected a listing failure first"),
        }

        let outcome = scanner.next_pair().await.unwrap();
        assert_eq!(case_name(outcome), "dir/ok:one");
        assert!(scanner.next_pair().await.is_none());
    }
}
