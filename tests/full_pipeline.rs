// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exercises the full C1-through-C6 pipeline against small fake "test
//! programs" (shell scripts speaking the ATF result-file protocol) instead
//! of a real ATF test suite.

use camino::Utf8PathBuf;
use kyua_runner::config::Config;
use kyua_runner::driver::{Driver, NoopHooks};
use kyua_runner::filter::FilterSet;
use kyua_runner::identity::TestProgramId;
use kyua_runner::scanner::ScanOutcome;
use kyua_runner::store::InMemoryStore;
use kyua_runner::test_program::TestProgram;
use kyua_runner::{Scanner, TestResultKind};
use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;

/// A test program exposing two cases: one that reports success, one that
/// reports failure. Listing (`-l`) and execution (`-r<file> -s<dir> <case>`)
/// both follow the protocol `TestProgram`/`TestCaseRunner` speak.
const FAKE_PROGRAM: &str = r#"#!/bin/sh
set -e

if [ "$1" = "-l" ]; then
    cat <<'EOF'
ident: passes
descr: always passes

ident: fails
descr: always fails

EOF
    exit 0
fi

result_file=""
case_name=""
for arg in "$@"; do
    case "$arg" in
        -r*) result_file="${arg#-r}" ;;
        -s*) ;;
        -v*) ;;
        *) case_name="$arg" ;;
    esac
done

case "$case_name" in
    passes)
        echo "passed" > "$result_file"
        exit 0
        ;;
    fails)
        echo "failed: oops" > "$result_file"
        exit 1
        ;;
    *)
        echo "broken: unknown case $case_name" > "$result_file"
        exit 1
        ;;
esac
"#;

fn write_fake_program(dir: &camino_tempfile::Utf8TempDir) -> Utf8PathBuf {
    let path = dir.path().join("prog.sh");
    std::fs::write(path.as_std_path(), FAKE_PROGRAM).unwrap();
    std::fs::set_permissions(path.as_std_path(), std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[tokio::test]
async fn runs_a_suite_end_to_end_and_persists_results() {
    let dir = camino_tempfile::tempdir().unwrap();
    let program_path = write_fake_program(&dir);

    let id = TestProgramId::new("prog.sh", program_path, "mysuite");
    let program = Arc::new(TestProgram::new(id));

    let config = Config::minimal("amd64", "linux");
    let driver = Driver::new(&config);
    let mut store = InMemoryStore::new();
    let mut hooks = NoopHooks;

    let (action_id, unused) = driver
        .run(&mut store, camino::Utf8Path::new("/"), &HashMap::new(), vec![program], FilterSet::new(Vec::new()).unwrap(), &mut hooks)
        .await
        .unwrap();
    assert!(unused.is_empty());

    let mut rows: Vec<_> = store.results(action_id).unwrap().into_iter().map(Result::unwrap).collect();
    rows.sort_by(|a, b| a.1.cmp(&b.1));

    assert_eq!(rows[0].1, "fails");
    assert_eq!(rows[0].2, TestResultKind::Failed("oops".to_owned()));
    assert_eq!(rows[1].1, "passes");
    assert_eq!(rows[1].2, TestResultKind::Passed);
}

#[tokio::test]
async fn scanner_applies_a_case_qualified_filter() {
    let dir = camino_tempfile::tempdir().unwrap();
    let program_path = write_fake_program(&dir);

    let id = TestProgramId::new("prog.sh", program_path, "mysuite");
    let program = Arc::new(TestProgram::new(id));

    let filters = FilterSet::new(vec!["prog.sh:passes".parse().unwrap()]).unwrap();
    let mut scanner = Scanner::new(vec![program], filters);

    let outcome = scanner.next_pair().await.unwrap();
    let case_id = match outcome {
        ScanOutcome::Case(_, case_id) => case_id,
        ScanOutcome::ListingFailed(_, reason) => panic!("unexpected listing failure: {reason}"),
    };
    assert_eq!(case_id.case_name(), "passes");
    assert!(scanner.next_pair().await.is_none());
    assert!(scanner.unused_filters().is_empty());
}

/// A program whose `-l` listing reports a case with an empty name -- the
/// kind of malformed, untrusted output a test program can emit. The action
/// must record this as a single broken result and keep going, rather than
/// rolling back every result already recorded for other programs.
const LISTING_REPORTS_EMPTY_IDENT: &str = r#"#!/bin/sh
if [ "$1" = "-l" ]; then
    printf 'ident: \n'
    exit 0
fi
exit 1
"#;

fn write_broken_program(dir: &camino_tempfile::Utf8TempDir) -> Utf8PathBuf {
    let path = dir.path().join("broken.sh");
    std::fs::write(path.as_std_path(), LISTING_REPORTS_EMPTY_IDENT).unwrap();
    std::fs::set_permissions(path.as_std_path(), std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[tokio::test]
async fn a_malformed_listing_is_contained_and_does_not_roll_back_the_action() {
    let dir = camino_tempfile::tempdir().unwrap();
    let good_path = write_fake_program(&dir);
    let broken_path = write_broken_program(&dir);

    let good = Arc::new(TestProgram::new(TestProgramId::new("prog.sh", good_path, "mysuite")));
    let broken = Arc::new(TestProgram::new(TestProgramId::new("broken.sh", broken_path, "mysuite")));

    let config = Config::minimal("amd64", "linux");
    let driver = Driver::new(&config);
    let mut store = InMemoryStore::new();
    let mut hooks = NoopHooks;

    let (action_id, _) = driver
        .run(&mut store, camino::Utf8Path::new("/"), &HashMap::new(), vec![good, broken], FilterSet::new(Vec::new()).unwrap(), &mut hooks)
        .await
        .unwrap();

    let rows: Vec<_> = store.results(action_id).unwrap().into_iter().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 3);

    let broken_row = rows.iter().find(|(_, case, _)| case == "__test_program__").unwrap();
    assert!(matches!(&broken_row.2, TestResultKind::Broken(reason) if reason.contains("Failed to load list of test cases")));

    assert!(rows.iter().any(|(_, case, kind)| case == "passes" && *kind == TestResultKind::Passed));
    assert!(rows.iter().any(|(_, case, kind)| case == "fails" && *kind == TestResultKind::Failed("oops".to_owned())));
}
