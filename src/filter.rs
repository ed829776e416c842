// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filtering the test-case universe based on user-specified `path[:case]`
//! expressions.
//!
//! The main structure here is [`Filter`], parsed from a single user string,
//! and [`FilterSet`], which enforces the disjointness invariant required by
//! the scanner (§3, §8 in the specification this crate implements).

use crate::errors::{FilterConflictError, FilterParseError};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A single user-specified filter of the form `path[:case]`.
///
/// A path-only filter (`case_name` is `None`) matches every case in every
/// program under that path prefix. A case-qualified filter matches exactly
/// one case in exactly one program.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Filter {
    program_prefix: Utf8PathBuf,
    case_name: Option<String>,
}

impl Filter {
    /// Builds a filter directly, bypassing string parsing.
    pub fn new(program_prefix: impl Into<Utf8PathBuf>, case_name: Option<String>) -> Self {
        Self {
            program_prefix: program_prefix.into(),
            case_name,
        }
    }

    pub fn program_prefix(&self) -> &Utf8Path {
        &self.program_prefix
    }

    pub fn case_name(&self) -> Option<&str> {
        self.case_name.as_deref()
    }

    /// Returns true if this filter matches `(program_relative_path,
    /// case_name)`.
    pub fn matches(&self, program_relative_path: &Utf8Path, case_name: &str) -> bool {
        match &self.case_name {
            None => path_has_prefix(program_relative_path, &self.program_prefix),
            Some(expected_case) => {
                program_relative_path == self.program_prefix && expected_case == case_name
            }
        }
    }

    /// Returns true if `self` entirely contains `other`: every
    /// `(program, case)` pair `other` could match, `self` also matches.
    ///
    /// Used to detect filter-set redundancy: `{"a", "a:x"}` conflicts
    /// because `"a"` already covers everything `"a:x"` could select.
    fn contains(&self, other: &Filter) -> bool {
        if self == other {
            return false;
        }
        match (&self.case_name, &other.case_name) {
            (None, None) => path_has_prefix(&other.program_prefix, &self.program_prefix),
            (None, Some(_)) => {
                other.program_prefix == self.program_prefix
                    || path_has_prefix(&other.program_prefix, &self.program_prefix)
            }
            (Some(_), _) => false,
        }
    }
}

/// Component-wise prefix match: `"a/b"` is a prefix of `"a/b/c"` but not of
/// `"a/bc"`.
fn path_has_prefix(path: &Utf8Path, prefix: &Utf8Path) -> bool {
    path.components().zip(prefix.components()).all(|(a, b)| a == b)
        && path.components().count() >= prefix.components().count()
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.case_name {
            Some(case) => write!(f, "{}:{}", self.program_prefix, case),
            None => write!(f, "{}", self.program_prefix),
        }
    }
}

impl FromStr for Filter {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            None => {
                if s.is_empty() {
                    return Err(FilterParseError::EmptyProgramPath(s.to_owned()));
                }
                Ok(Filter::new(Utf8PathBuf::from(s), None))
            }
            Some((path, case)) => {
                if path.is_empty() {
                    return Err(FilterParseError::EmptyProgramPath(s.to_owned()));
                }
                if case.is_empty() {
                    return Err(FilterParseError::EmptyCaseName(s.to_owned()));
                }
                if case.contains(':') {
                    return Err(FilterParseError::CaseNameHasColon(case.to_owned()));
                }
                Ok(Filter::new(Utf8PathBuf::from(path), Some(case.to_owned())))
            }
        }
    }
}

/// A validated, pairwise-disjoint set of filters.
///
/// Two filters are in conflict if one contains the other (see
/// [`Filter::contains`]); equal filters do not conflict but are
/// deduplicated. An empty set matches every test case unconditionally.
#[derive(Clone, Debug, Default)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    /// Validates `filters` for pairwise disjointness and builds a
    /// `FilterSet`. Order is preserved (minus duplicates) for deterministic
    /// unused-filter reporting.
    pub fn new(filters: impl IntoIterator<Item = Filter>) -> Result<Self, FilterConflictError> {
        let mut unique = Vec::new();
        let mut seen = BTreeSet::new();
        for filter in filters {
            let key = filter.to_string();
            if seen.insert(key) {
                unique.push(filter);
            }
        }

        for a in &unique {
            for b in &unique {
                if a.contains(b) {
                    return Err(FilterConflictError {
                        container: a.to_string(),
                        contained: b.to_string(),
                    });
                }
            }
        }

        Ok(Self { filters: unique })
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter()
    }

    /// Returns every filter in this set that matches `(program_relative_path,
    /// case_name)`. Empty if the set is empty but the match is still
    /// unconditional in that case -- callers must special-case
    /// [`FilterSet::is_empty`] before treating an empty result as "no
    /// match".
    pub fn matching(&self, program_relative_path: &Utf8Path, case_name: &str) -> Vec<&Filter> {
        self.filters
            .iter()
            .filter(|f| f.matches(program_relative_path, case_name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_path_only() {
        let filter: Filter = "dir/prog".parse().unwrap();
        assert_eq!(filter.program_prefix(), Utf8Path::new("dir/prog"));
        assert_eq!(filter.case_name(), None);
    }

    #[test]
    fn parses_path_and_case() {
        let filter: Filter = "dir/prog:case1".parse().unwrap();
        assert_eq!(filter.program_prefix(), Utf8Path::new("dir/prog"));
        assert_eq!(filter.case_name(), Some("case1"));
    }

    #[test]
    fn rejects_empty_case_name() {
        let err: FilterParseError = "dir/prog:".parse::<Filter>().unwrap_err();
        assert_eq!(err, FilterParseError::EmptyCaseName("dir/prog:".to_owned()));
    }

    #[test]
    fn path_prefix_matches_subpaths_only_at_component_boundaries() {
        let filter: Filter = "a/b".parse().unwrap();
        assert!(filter.matches(Utf8Path::new("a/b"), "x"));
        assert!(filter.matches(Utf8Path::new("a/b/c"), "x"));
        assert!(!filter.matches(Utf8Path::new("a/bc"), "x"));
    }

    #[test]
    fn case_qualified_filter_matches_exact_pair_only() {
        let filter: Filter = "a/b:case1".parse().unwrap();
        assert!(filter.matches(Utf8Path::new("a/b"), "case1"));
        assert!(!filter.matches(Utf8Path::new("a/b"), "case2"));
        assert!(!filter.matches(Utf8Path::new("a/b/c"), "case1"));
    }

    #[test]
    fn disjoint_filters_build_successfully() {
        let filters = vec!["a".parse().unwrap(), "b:case1".parse().unwrap()];
        assert!(FilterSet::new(filters).is_ok());
    }

    #[test]
    fn rejects_path_filter_containing_case_filter() {
        let filters: Vec<Filter> = vec!["a".parse().unwrap(), "a:x".parse().unwrap()];
        let err = FilterSet::new(filters).unwrap_err();
        assert_eq!(err.container, "a");
        assert_eq!(err.contained, "a:x");
    }

    #[test]
    fn deduplicates_equal_filters() {
        let filters: Vec<Filter> = vec!["a:x".parse().unwrap(), "a:x".parse().unwrap()];
        let set = FilterSet::new(filters).unwrap();
        assert_eq!(set.iter().count(), 1);
    }

    #[test]
    fn empty_set_is_unconditional() {
        let set = FilterSet::new(Vec::new()).unwrap();
        assert!(set.is_empty());
    }
}
