// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The driver (C5): ties the scanner, the test-case runner and the store
//! transaction together into one action.
//!
//! The driver awaits exactly one test case at a time -- it never spawns two
//! test cases concurrently, even though the plumbing underneath uses
//! `tokio` (see the scheduling-model note recorded alongside this crate's
//! other redesign choices).

use crate::errors::{Interrupted, KyuaError};
use crate::filter::{Filter, FilterSet};
use crate::identity::TestCaseId;
use crate::metadata::Metadata;
use crate::result::{TestResult, TestResultKind};
use crate::runner::TestCaseRunner;
use crate::scanner::{ScanOutcome, Scanner};
use crate::signal::InterruptLatch;
use crate::store::{Store, Transaction};
use crate::test_program::TestProgram;
use camino::Utf8Path;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Stand-in case name for a test program whose listing itself failed,
/// mirroring the original implementation's `__test_program__` sentinel.
const LISTING_FAILURE_CASE: &str = "__test_program__";

/// Observes the driver's progress without coupling it to a concrete report
/// renderer. The out-of-scope CLI front-end implements this to print
/// `program:case  ->  result` lines as they come in.
pub trait Hooks {
    /// Called immediately before a test case starts running.
    fn start(&mut self, _case_id: &TestCaseId) {}

    /// Called once a test case has a final result.
    fn finished(&mut self, case_id: &TestCaseId, result: &TestResult);
}

/// A `Hooks` implementation that does nothing, for callers that only care
/// about the store side effects.
#[derive(Default)]
pub struct NoopHooks;

impl Hooks for NoopHooks {
    fn finished(&mut self, _case_id: &TestCaseId, _result: &TestResult) {}
}

/// Runs an entire action: scan the given test programs under `filters`,
/// run every matched test case, and persist the outcome into `store`.
pub struct Driver<'a> {
    config: &'a crate::config::Config,
}

impl<'a> Driver<'a> {
    pub fn new(config: &'a crate::config::Config) -> Self {
        Self { config }
    }

    /// Runs `programs` through `filters`, invoking `hooks` for each result
    /// and persisting the whole action atomically into `store`.
    ///
    /// Returns the new action's id and the filters that never matched any
    /// test case. A test program whose own listing is malformed does not
    /// abort the action: it is recorded as a single `Broken` result under
    /// `__test_program__` and the scan continues with the remaining
    /// programs. Only a store failure or a user interrupt aborts the driver,
    /// rolling back the in-progress transaction; `hooks` will have already
    /// seen every result observed up to that point.
    #[instrument(skip_all)]
    pub async fn run(
        &self,
        store: &mut dyn Store,
        cwd: &Utf8Path,
        env: &HashMap<String, String>,
        programs: Vec<Arc<TestProgram>>,
        filters: FilterSet,
        hooks: &mut dyn Hooks,
    ) -> Result<(i64, Vec<Filter>), KyuaError> {
        let runner = TestCaseRunner::new(self.config);
        let interrupt = InterruptLatch::new();
        let mut scanner = Scanner::new(programs, filters);

        let mut tx = store.begin()?;
        let context_id = tx.put_context(cwd, env)?;
        let action_id = tx.put_action(context_id)?;

        let result = self.drain(&mut scanner, &runner, &interrupt, &mut *tx, action_id, hooks).await;

        match result {
            Ok(()) => {
                tx.commit()?;
                info!(action_id, "action committed");
                Ok((action_id, scanner.unused_filters()))
            }
            Err(err) => {
                tx.rollback()?;
                warn!(error = %err, "action rolled back");
                Err(err)
            }
        }
    }

    async fn drain(
        &self,
        scanner: &mut Scanner,
        runner: &TestCaseRunner<'_>,
        interrupt: &InterruptLatch,
        tx: &mut dyn Transaction,
        action_id: i64,
        hooks: &mut dyn Hooks,
    ) -> Result<(), KyuaError> {
        let mut program_rows: HashMap<camino::Utf8PathBuf, i64> = HashMap::new();

        while let Some(outcome) = scanner.next_pair().await {
            let (program, case_id, metadata, result) = match outcome {
                ScanOutcome::Case(program, case_id) => {
                    hooks.start(&case_id);

                    let metadata = program
                        .cases()
                        .await
                        .expect("scanner only yields cases from a program it just listed successfully")
                        .iter()
                        .find(|(id, _)| id == &case_id)
                        .map(|(_, metadata)| metadata.clone())
                        .expect("scanner only yields cases it just listed from this program");

                    let result = runner.run(program.id(), &case_id, &metadata, interrupt.clone()).await;
                    let result = match result {
                        Ok(result) => result,
                        Err(Interrupted(signum)) => return Err(Interrupted(signum).into()),
                    };

                    (program, case_id, metadata, result)
                }
                ScanOutcome::ListingFailed(program, reason) => {
                    let case_id = TestCaseId::new(program.id().relative_path(), LISTING_FAILURE_CASE);
                    hooks.start(&case_id);
                    warn!(program = %program.id(), error = %reason, "test program listing failed, continuing with remaining programs");
                    let result = TestResult::new(TestResultKind::Broken(format!("Failed to load list of test cases: {reason}")), Duration::ZERO);
                    (program, case_id, Metadata::default(), result)
                }
            };

            hooks.finished(&case_id, &result);

            let relative_path = program.id().relative_path().to_owned();
            let program_row = match program_rows.get(&relative_path) {
                Some(id) => *id,
                None => {
                    let id = tx.put_test_program(action_id, program.id().absolute_path(), program.id().test_suite_name())?;
                    program_rows.insert(relative_path, id);
                    id
                }
            };
            let case_row = tx.put_test_case(program_row, case_id.case_name(), &metadata)?;
            tx.put_result(case_row, &result.kind)?;
        }

        Ok(())
    }
}
