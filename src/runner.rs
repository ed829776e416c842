// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test-case runner (C4): evaluates a test case's preconditions,
//! allocates a work directory, runs the body and (if declared) the cleanup
//! routine under supervision, and reconciles the self-reported result
//! against what actually happened.

use crate::config::Config;
use crate::errors::Interrupted;
use crate::identity::{TestCaseId, TestProgramId};
use crate::metadata::{Metadata, RequiredUser};
use crate::process::{self, ExitReason, SupervisedCommand};
use crate::result::{self, RawAtfResult, TestResult, TestResultKind};
use crate::signal::InterruptLatch;
use crate::work_dir::WorkDir;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, instrument};

/// Runs a single test case's body and cleanup phases against a fixed
/// configuration, shared across every case in an action.
pub struct TestCaseRunner<'a> {
    config: &'a Config,
}

impl<'a> TestCaseRunner<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Runs `case_id`, cleaning up its work directory on every exit path.
    ///
    /// Returns `Err(Interrupted)` if a user interrupt was observed during
    /// the body or cleanup phase; the caller is expected to stop scheduling
    /// further test cases and unwind after rolling back its transaction.
    #[instrument(skip_all, fields(program = %program.relative_path(), case = %case_id.case_name()))]
    pub async fn run(
        &self,
        program: &TestProgramId,
        case_id: &TestCaseId,
        metadata: &Metadata,
        interrupt: InterruptLatch,
    ) -> Result<TestResult, Interrupted> {
        let start = Instant::now();

        if let Some(reason) = self.check_requirements(program, metadata) {
            debug!(reason, "test case skipped");
            return Ok(TestResult::new(TestResultKind::Skipped(reason), start.elapsed()));
        }

        let work_dir = match WorkDir::create() {
            Ok(dir) => dir,
            Err(source) => {
                let reason = format!("failed to create work directory: {source}");
                return Ok(TestResult::new(TestResultKind::Broken(reason), start.elapsed()));
            }
        };
        debug!(work_dir = %work_dir.path(), "work directory created");

        if metadata.required_user == Some(RequiredUser::Unprivileged) {
            if let Some(user) = &self.config.unprivileged_user {
                if let Err(source) = crate::isolation::chown_work_dir(work_dir.path(), user) {
                    let reason = format!("failed to prepare work directory: {source}");
                    return Ok(TestResult::new(TestResultKind::Broken(reason), start.elapsed()));
                }
            }
        }

        let kind = self.run_in(program, case_id, metadata, work_dir.path(), &interrupt).await;
        drop(work_dir);

        if let Some(signum) = interrupt.tripped() {
            return Err(Interrupted(signum));
        }
        Ok(TestResult::new(kind, start.elapsed()))
    }

    /// Like [`Self::run`], but the test's stdout/stderr go to caller-chosen
    /// paths and the work directory is left behind for inspection instead
    /// of being removed.
    pub async fn debug(
        &self,
        program: &TestProgramId,
        case_id: &TestCaseId,
        metadata: &Metadata,
        stdout_path: &Utf8Path,
        stderr_path: &Utf8Path,
        interrupt: InterruptLatch,
    ) -> Result<(TestResult, Utf8PathBuf), Interrupted> {
        let start = Instant::now();

        if let Some(reason) = self.check_requirements(program, metadata) {
            return Ok((TestResult::new(TestResultKind::Skipped(reason), start.elapsed()), Utf8PathBuf::new()));
        }

        let work_dir = match WorkDir::create() {
            Ok(dir) => dir,
            Err(source) => {
                let reason = format!("failed to create work directory: {source}");
                return Ok((TestResult::new(TestResultKind::Broken(reason), start.elapsed()), Utf8PathBuf::new()));
            }
        };

        let result_file = work_dir.path().join("result.txt");
        let body_outcome = self
            .run_phase(program, case_id, metadata, work_dir.path(), &result_file, stdout_path, stderr_path, false, &interrupt)
            .await;

        let kind = match body_outcome {
            Err(source) => TestResultKind::Broken(format!("failed to run test case: {source}")),
            Ok(outcome) => {
                let raw = reconcile_body(&result_file, metadata, outcome.reason);
                result::externalize(raw)
            }
        };

        let kept_path = work_dir.keep();
        if let Some(signum) = interrupt.tripped() {
            return Err(Interrupted(signum));
        }
        Ok((TestResult::new(kind, start.elapsed()), kept_path))
    }

    async fn run_in(
        &self,
        program: &TestProgramId,
        case_id: &TestCaseId,
        metadata: &Metadata,
        work_dir: &Utf8Path,
        interrupt: &InterruptLatch,
    ) -> TestResultKind {
        let result_file = work_dir.join("result.txt");
        let stdout_path = work_dir.join("stdout.txt");
        let stderr_path = work_dir.join("stderr.txt");

        let body_outcome = self
            .run_phase(program, case_id, metadata, work_dir, &result_file, &stdout_path, &stderr_path, false, interrupt)
            .await;

        let mut kind = match body_outcome {
            Err(source) => return TestResultKind::Broken(format!("failed to run test case: {source}")),
            Ok(outcome) => {
                debug!(reason = ?outcome.reason, "body phase finished");
                let raw = reconcile_body(&result_file, metadata, outcome.reason);
                result::externalize(raw)
            }
        };

        if metadata.has_cleanup {
            let cleanup_stdout = work_dir.join("cleanup-stdout.txt");
            let cleanup_stderr = work_dir.join("cleanup-stderr.txt");
            let cleanup_outcome = self
                .run_phase(program, case_id, metadata, work_dir, &result_file, &cleanup_stdout, &cleanup_stderr, true, interrupt)
                .await;

            kind = match cleanup_outcome {
                Err(source) => TestResultKind::Broken(format!("failed to run test case cleanup: {source}")),
                Ok(outcome) => {
                    debug!(reason = ?outcome.reason, "cleanup phase finished");
                    let cleanup_status = match outcome.reason {
                        ExitReason::TimedOut => None,
                        other => Some(other),
                    };
                    result::apply_cleanup(kind, true, cleanup_status.as_ref(), metadata.timeout)
                }
            };
        }

        kind
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_phase(
        &self,
        program: &TestProgramId,
        case_id: &TestCaseId,
        metadata: &Metadata,
        work_dir: &Utf8Path,
        result_file: &Utf8Path,
        stdout_path: &Utf8Path,
        stderr_path: &Utf8Path,
        cleanup: bool,
        interrupt: &InterruptLatch,
    ) -> Result<process::SupervisedOutcome, crate::errors::SupervisedForkError> {
        let args = self.build_args(program, case_id, result_file, cleanup);
        let env = HashMap::new();
        let command = SupervisedCommand {
            program: program.absolute_path(),
            args: &args,
            work_dir,
            env: &env,
            stdout_path,
            stderr_path,
            timeout: metadata.timeout,
            unprivileged_user: if metadata.required_user == Some(RequiredUser::Unprivileged) {
                self.config.unprivileged_user.as_ref()
            } else {
                None
            },
        };
        process::run(command, interrupt.clone()).await
    }

    fn build_args(&self, program: &TestProgramId, case_id: &TestCaseId, result_file: &Utf8Path, cleanup: bool) -> Vec<String> {
        let source_dir = program.absolute_path().parent().map(Utf8Path::to_owned).unwrap_or_else(|| Utf8PathBuf::from("."));

        let mut args = vec![format!("-r{result_file}"), format!("-s{source_dir}")];
        for (key, value) in self.config.suite_properties(program.test_suite_name()) {
            args.push(format!("-v{key}={value}"));
        }
        if let Some(user) = &self.config.unprivileged_user {
            args.push(format!("-vunprivileged-user={}", user.name));
        }
        args.push(if cleanup { format!("{}:cleanup", case_id.case_name()) } else { case_id.case_name().to_owned() });
        args
    }

    /// Checks `metadata`'s `require.*` preconditions against `self.config`
    /// and the current process, returning the skip reason for the first one
    /// that fails.
    fn check_requirements(&self, program: &TestProgramId, metadata: &Metadata) -> Option<String> {
        let suite_props = self.config.suite_properties(program.test_suite_name());
        for name in &metadata.required_configs {
            let satisfied = if name.as_str() == "unprivileged-user" { self.config.unprivileged_user.is_some() } else { suite_props.contains_key(name) };
            if !satisfied {
                return Some(format!("Required configuration property '{name}' not defined"));
            }
        }

        if !metadata.allowed_architectures.is_empty() && !metadata.allowed_architectures.contains(&self.config.architecture) {
            return Some(format!("Current architecture '{}' not supported", self.config.architecture));
        }
        if !metadata.allowed_platforms.is_empty() && !metadata.allowed_platforms.contains(&self.config.platform) {
            return Some(format!("Current platform '{}' not supported", self.config.platform));
        }

        match metadata.required_user {
            Some(RequiredUser::Root) => {
                if !running_as_root() {
                    return Some("Requires root privileges".to_owned());
                }
            }
            Some(RequiredUser::Unprivileged) => {
                if running_as_root() && self.config.unprivileged_user.is_none() {
                    return Some("Requires an unprivileged user but none is configured".to_owned());
                }
            }
            None => {}
        }

        for path in &metadata.required_files {
            if !path.exists() {
                return Some(format!("Required file '{path}' not found"));
            }
        }
        for name in &metadata.required_programs {
            if !program_exists(name) {
                return Some(format!("Required program '{name}' not found"));
            }
        }

        None
    }
}

fn reconcile_body(result_file: &Utf8Path, metadata: &Metadata, reason: ExitReason) -> RawAtfResult {
    let raw = load_raw_result(result_file);
    if matches!(reason, ExitReason::TimedOut) {
        result::adjust_with_timeout(raw, metadata.timeout)
    } else {
        result::adjust_with_status(raw, &reason)
    }
}

/// Reads and parses the result file a test case's body is expected to have
/// written. A missing file is legitimate input (the test crashed before
/// writing anything); a file that fails to parse becomes `Broken` so the
/// offending text survives into the final result rather than being silently
/// treated as "file missing".
fn load_raw_result(path: &Utf8Path) -> Option<RawAtfResult> {
    let contents = std::fs::read_to_string(path).ok()?;
    match RawAtfResult::parse(&contents) {
        Ok(raw) => Some(raw),
        Err(err) => Some(RawAtfResult::Broken(err.to_string())),
    }
}

#[cfg(unix)]
fn running_as_root() -> bool {
    nix::unistd::Uid::effective().is_root()
}

fn program_exists(name: &str) -> bool {
    if name.contains('/') {
        return Utf8Path::new(name).exists();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(name).exists()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Metadata;
    use std::collections::BTreeSet;

    fn program(suite: &str) -> TestProgramId {
        TestProgramId::new("dir/prog", "/tmp/dir/prog", suite)
    }

    #[test]
    fn skips_when_required_config_missing() {
        let config = Config::minimal("amd64", "linux");
        let runner = TestCaseRunner::new(&config);
        let mut metadata = Metadata::default();
        metadata.required_configs = BTreeSet::from(["some_prop".to_owned()]);

        let reason = runner.check_requirements(&program("mysuite"), &metadata).unwrap();
        assert!(reason.contains("some_prop"));
    }

    #[test]
    fn skips_when_architecture_not_allowed() {
        let config = Config::minimal("amd64", "linux");
        let runner = TestCaseRunner::new(&config);
        let mut metadata = Metadata::default();
        metadata.allowed_architectures = BTreeSet::from(["arm64".to_owned()]);

        let reason = runner.check_requirements(&program("mysuite"), &metadata).unwrap();
        assert!(reason.contains("architecture"));
    }

    #[test]
    fn passes_when_no_requirements_declared() {
        let config = Config::minimal("amd64", "linux");
        let runner = TestCaseRunner::new(&config);
        let metadata = Metadata::default();

        assert!(runner.check_requirements(&program("mysuite"), &metadata).is_none());
    }

    #[test]
    fn unprivileged_user_config_satisfies_requirement() {
        let mut config = Config::minimal("amd64", "linux");
        config.unprivileged_user = Some(crate::config::UnprivilegedUser {
            name: "nobody".to_owned(),
            uid: 65534,
            gid: 65534,
        });
        let runner = TestCaseRunner::new(&config);
        let mut metadata = Metadata::default();
        metadata.required_configs = BTreeSet::from(["unprivileged-user".to_owned()]);

        assert!(runner.check_requirements(&program("mysuite"), &metadata).is_none());
    }

    #[test]
    fn missing_result_file_reconciles_to_broken() {
        let metadata = Metadata::default();
        let raw = reconcile_body(Utf8Path::new("/nonexistent/result.txt"), &metadata, ExitReason::Exited(0));
        assert!(matches!(raw, RawAtfResult::Broken(_)));
    }
}
