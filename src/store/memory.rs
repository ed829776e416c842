// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! An in-memory `Store`/`Transaction` implementation, for tests that
//! exercise the driver without touching disk.

use super::{format_metadata, Store, Transaction};
use crate::errors::{IntegrityError, StoreError};
use crate::metadata::Metadata;
use crate::result::TestResultKind;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;

#[allow(dead_code)]
#[derive(Clone)]
struct ContextRow {
    cwd: Utf8PathBuf,
    env: HashMap<String, String>,
}

#[allow(dead_code)]
#[derive(Clone)]
struct TestProgramRow {
    action_id: i64,
    absolute_path: Utf8PathBuf,
    suite_name: String,
}

#[allow(dead_code)]
#[derive(Clone)]
struct TestCaseRow {
    test_program_id: i64,
    name: String,
    metadata: String,
}

#[derive(Clone)]
struct ResultRow {
    test_case_id: i64,
    kind: TestResultKind,
}

/// A result store backed by plain `Vec`s, with rollback implemented as
/// truncation back to a snapshot taken at `begin`.
#[derive(Default)]
pub struct InMemoryStore {
    contexts: Vec<ContextRow>,
    actions: Vec<i64>,
    test_programs: Vec<TestProgramRow>,
    test_cases: Vec<TestCaseRow>,
    results: Vec<ResultRow>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

struct Snapshot {
    contexts: usize,
    actions: usize,
    test_programs: usize,
    test_cases: usize,
    results: usize,
}

impl Store for InMemoryStore {
    fn begin(&mut self) -> Result<Box<dyn Transaction + '_>, StoreError> {
        let snapshot = Snapshot {
            contexts: self.contexts.len(),
            actions: self.actions.len(),
            test_programs: self.test_programs.len(),
            test_cases: self.test_cases.len(),
            results: self.results.len(),
        };
        Ok(Box::new(InMemoryTransaction { store: self, snapshot }))
    }

    fn results(&self, action_id: i64) -> Result<Vec<Result<(Utf8PathBuf, String, TestResultKind), IntegrityError>>, StoreError> {
        let mut rows = Vec::new();
        for (program_idx, program) in self.test_programs.iter().enumerate() {
            if program.action_id != action_id {
                continue;
            }
            let program_id = (program_idx + 1) as i64;
            for (case_idx, case) in self.test_cases.iter().enumerate() {
                if case.test_program_id != program_id {
                    continue;
                }
                let case_id = (case_idx + 1) as i64;
                for result in self.results.iter().filter(|r| r.test_case_id == case_id) {
                    rows.push(Ok((program.absolute_path.clone(), case.name.clone(), result.kind.clone())));
                }
            }
        }
        Ok(rows)
    }
}

struct InMemoryTransaction<'a> {
    store: &'a mut InMemoryStore,
    snapshot: Snapshot,
}

impl Transaction for InMemoryTransaction<'_> {
    fn put_context(&mut self, cwd: &Utf8Path, env: &HashMap<String, String>) -> Result<i64, StoreError> {
        self.store.contexts.push(ContextRow { cwd: cwd.to_owned(), env: env.clone() });
        Ok(self.store.contexts.len() as i64)
    }

    fn put_action(&mut self, context_id: i64) -> Result<i64, StoreError> {
        self.store.actions.push(context_id);
        Ok(self.store.actions.len() as i64)
    }

    fn put_test_program(&mut self, action_id: i64, absolute_path: &Utf8Path, suite_name: &str) -> Result<i64, StoreError> {
        self.store.test_programs.push(TestProgramRow {
            action_id,
            absolute_path: absolute_path.to_owned(),
            suite_name: suite_name.to_owned(),
        });
        Ok(self.store.test_programs.len() as i64)
    }

    fn put_test_case(&mut self, test_program_id: i64, name: &str, metadata: &Metadata) -> Result<i64, StoreError> {
        self.store.test_cases.push(TestCaseRow {
            test_program_id,
            name: name.to_owned(),
            metadata: format_metadata(metadata),
        });
        Ok(self.store.test_cases.len() as i64)
    }

    fn put_result(&mut self, test_case_id: i64, kind: &TestResultKind) -> Result<i64, StoreError> {
        self.store.results.push(ResultRow { test_case_id, kind: kind.clone() });
        Ok(self.store.results.len() as i64)
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.store.contexts.truncate(self.snapshot.contexts);
        self.store.actions.truncate(self.snapshot.actions);
        self.store.test_programs.truncate(self.snapshot.test_programs);
        self.store.test_cases.truncate(self.snapshot.test_cases);
        self.store.results.truncate(self.snapshot.results);
        Ok(())
    }
}
