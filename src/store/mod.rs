// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The result store transaction layer (C6): the atomic, typed write path
//! from a running action down to rows in the persistence backend.
//!
//! `Store`/`Transaction` are the abstract contract the distilled
//! specification leaves open; [`sqlite::SqliteStore`] is the concrete
//! backend this crate ships (SQLite via `rusqlite`), and
//! [`memory::InMemoryStore`] is a test double that never touches disk.

mod memory;
mod schema;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use crate::errors::{IntegrityError, StoreError};
use crate::metadata::Metadata;
use crate::result::TestResultKind;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;

/// Opens transactions against a persisted action history.
pub trait Store {
    /// Begins a new write transaction. Only one transaction is ever open at
    /// a time; the driver holds it for the entire action.
    fn begin(&mut self) -> Result<Box<dyn Transaction + '_>, StoreError>;

    /// Reads back every `(binary_path, case_name, kind)` tuple recorded
    /// under `action_id`. Rows that violate the schema's integrity rules
    /// (e.g. a `passed` result carrying a non-null reason) are reported as
    /// `Err` entries rather than aborting the whole read.
    fn results(&self, action_id: i64) -> Result<Vec<Result<(Utf8PathBuf, String, TestResultKind), IntegrityError>>, StoreError>;
}

/// A single write transaction: persist a context, open an action, persist
/// test programs/cases/results as they're produced, then commit or roll
/// back as a unit.
pub trait Transaction {
    fn put_context(&mut self, cwd: &Utf8Path, env: &HashMap<String, String>) -> Result<i64, StoreError>;
    fn put_action(&mut self, context_id: i64) -> Result<i64, StoreError>;
    fn put_test_program(&mut self, action_id: i64, absolute_path: &Utf8Path, suite_name: &str) -> Result<i64, StoreError>;
    fn put_test_case(&mut self, test_program_id: i64, name: &str, metadata: &Metadata) -> Result<i64, StoreError>;
    fn put_result(&mut self, test_case_id: i64, kind: &TestResultKind) -> Result<i64, StoreError>;

    fn commit(self: Box<Self>) -> Result<(), StoreError>;
    fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Flattens `metadata` into the same `key: value` line grammar a test
/// program emits when listed, so a row can be inspected without a separate
/// deserializer.
fn format_metadata(metadata: &Metadata) -> String {
    let mut lines = vec![
        format!("descr: {}", metadata.description),
        format!("has.cleanup: {}", metadata.has_cleanup),
        format!("timeout: {}", metadata.timeout.as_secs()),
    ];
    if !metadata.allowed_architectures.is_empty() {
        lines.push(format!("require.arch: {}", join(&metadata.allowed_architectures)));
    }
    if !metadata.allowed_platforms.is_empty() {
        lines.push(format!("require.platform: {}", join(&metadata.allowed_platforms)));
    }
    if !metadata.required_configs.is_empty() {
        lines.push(format!("require.config: {}", join(&metadata.required_configs)));
    }
    if !metadata.required_programs.is_empty() {
        lines.push(format!("require.progs: {}", join(&metadata.required_programs)));
    }
    if let Some(user) = metadata.required_user {
        let value = match user {
            crate::metadata::RequiredUser::Root => "root",
            crate::metadata::RequiredUser::Unprivileged => "unprivileged",
        };
        lines.push(format!("require.user: {value}"));
    }
    for (key, value) in &metadata.user_metadata {
        lines.push(format!("{key}: {value}"));
    }
    lines.join("\n")
}

fn join<'a>(values: impl IntoIterator<Item = &'a String>) -> String {
    values.into_iter().cloned().collect::<Vec<_>>().join(" ")
}

/// Maps a store row's string tag plus optional reason back to a
/// `TestResultKind`, enforcing the NULL-reason-iff-passed invariant.
fn result_from_row(test_case: &str, result_type: &str, reason: Option<String>) -> Result<TestResultKind, IntegrityError> {
    match (result_type, reason) {
        ("passed", None) => Ok(TestResultKind::Passed),
        ("passed", Some(_)) => Err(IntegrityError {
            test_case: test_case.to_owned(),
            reason: "'passed' result has a non-null reason".to_owned(),
        }),
        ("failed", Some(reason)) => Ok(TestResultKind::Failed(reason)),
        ("skipped", Some(reason)) => Ok(TestResultKind::Skipped(reason)),
        ("expected_failure", Some(reason)) => Ok(TestResultKind::ExpectedFailure(reason)),
        ("broken", Some(reason)) => Ok(TestResultKind::Broken(reason)),
        (other, None) if other != "passed" => Err(IntegrityError {
            test_case: test_case.to_owned(),
            reason: format!("'{other}' result is missing its required reason"),
        }),
        (other, _) => Err(IntegrityError {
            test_case: test_case.to_owned(),
            reason: format!("unknown result type '{other}'"),
        }),
    }
}
