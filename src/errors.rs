// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the kyua execution engine.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Error returned while setting up a child process's sandbox, immediately
/// before `exec`.
#[derive(Debug, Error)]
pub enum IsolationError {
    /// `chdir` into the work directory failed.
    #[error("failed to enter work directory `{work_dir}`: {source}")]
    ChangeDirectory {
        work_dir: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Dropping privileges (`setgid`/`setuid`) to the unprivileged user failed.
    #[error("failed to drop privileges to uid={uid} gid={gid}: {source}")]
    DropPrivileges {
        uid: u32,
        gid: u32,
        #[source]
        source: std::io::Error,
    },

    /// `chown`ing the work directory to the unprivileged user failed.
    #[error("failed to change ownership of `{path}` to uid={uid} gid={gid}: {source}")]
    ChownWorkDir {
        path: Utf8PathBuf,
        uid: u32,
        gid: u32,
        #[source]
        source: std::io::Error,
    },
}

/// Error returned by the supervised-fork layer (C2) before a child is even
/// produced (as opposed to the child's own exit status, which is never an
/// error -- it's data).
#[derive(Debug, Error)]
pub enum SupervisedForkError {
    /// Could not open the file to redirect the child's stdout/stderr into.
    #[error("failed to open `{path}` for test output capture: {source}")]
    OpenOutputFile {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The `fork`/`spawn` syscall itself failed.
    #[error("failed to spawn test process: {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
    },

    /// A wait on the child process failed for a reason other than timeout.
    #[error("failed to wait for test process: {source}")]
    Wait {
        #[source]
        source: std::io::Error,
    },
}

/// Error parsing a single line of an ATF-style `result.txt` file.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum AtfParseError {
    #[error("empty test result or no new line")]
    Empty,

    #[error("test result contains multiple lines: {0}")]
    MultipleLines(String),

    #[error("unknown test result '{0}'")]
    UnknownTag(String),

    #[error("{tag} cannot have a reason")]
    UnexpectedReason { tag: String },

    #[error("{tag} must be followed by ': <reason>'")]
    MissingReason { tag: String },

    #[error("invalid format for '{tag}' test case result; must be followed by '[(num)]: <reason>' but found '{rest}'")]
    InvalidExitOrSignalFormat { tag: String, rest: String },

    #[error("invalid integer argument '{arg}' to '{tag}' test case result")]
    InvalidInteger { tag: String, arg: String },
}

/// Error parsing the streaming output of a TAP test program.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TapParseError {
    #[error("output includes two test plans")]
    DuplicatePlan,

    #[error("test plan is reversed")]
    ReversedPlan,

    #[error("skipped test plan has invalid range")]
    InvalidSkippedPlanRange,

    #[error("plan line includes out of range numbers")]
    PlanOutOfRange,

    #[error("reported plan differs from actual executed tests")]
    PlanMismatch,
}

/// Error parsing a user-supplied `path[:case]` filter string.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum FilterParseError {
    #[error("filter `{0}` cannot have an empty program path")]
    EmptyProgramPath(String),

    #[error("filter `{0}` cannot have an empty case name after ':'")]
    EmptyCaseName(String),

    #[error("case name `{0}` cannot contain ':'")]
    CaseNameHasColon(String),
}

/// Error raised when a set of filters passed to the scanner isn't pairwise
/// disjoint.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("filter `{contained}` is redundant: it is already covered by `{container}`")]
pub struct FilterConflictError {
    pub container: String,
    pub contained: String,
}

/// Error raised by metadata parsing (the `key: value` properties a test
/// program emits when listed).
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum MetadataParseError {
    #[error("unknown metadata property `{0}` (custom properties must start with 'X-')")]
    UnknownProperty(String),

    #[error("invalid value `{value}` for metadata property `{property}`")]
    InvalidValue { property: String, value: String },

    #[error("invalid required_user value `{0}` (expected 'root' or 'unprivileged')")]
    InvalidRequiredUser(String),
}

/// Error reading or writing to the result store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open store at `{path}`: {source}")]
    Open {
        path: Utf8PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("store operation failed: {source}")]
    Backend {
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to commit action to the store: {source}")]
    Commit {
        #[source]
        source: rusqlite::Error,
    },
}

/// Error raised while listing the test cases a test program exposes (the
/// `program -l` invocation and its output).
#[derive(Debug, Error)]
pub enum TestProgramError {
    /// A property block in the listing did not start with `ident`.
    #[error("test case definition is missing the 'ident' property")]
    MissingIdent,

    /// A listed case's `ident` value is empty or contains `:`, which would
    /// make it ambiguous with the `path:case` filter grammar.
    #[error("invalid test case name '{0}': must be non-empty and must not contain ':'")]
    InvalidCaseName(String),

    #[error("failed to list test cases: {0}")]
    Spawn(#[from] SupervisedForkError),

    #[error(transparent)]
    Metadata(#[from] MetadataParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Raised when a row read back from the store violates the schema's
/// integrity rules (e.g. a `passed` result with a non-null reason).
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("integrity error reading result row for `{test_case}`: {reason}")]
pub struct IntegrityError {
    pub test_case: String,
    pub reason: String,
}

/// The process was interrupted by a user-sent signal (`SIGHUP`, `SIGINT`,
/// `SIGTERM`) while a test case or the driver was in flight.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
#[error("interrupted by signal {0}")]
pub struct Interrupted(pub i32);

/// Top-level error type aggregating every failure mode this crate can
/// surface to an external caller (e.g. the out-of-scope CLI front-end).
#[derive(Debug, Error)]
pub enum KyuaError {
    #[error(transparent)]
    Isolation(#[from] IsolationError),

    #[error(transparent)]
    SupervisedFork(#[from] SupervisedForkError),

    #[error(transparent)]
    FilterParse(#[from] FilterParseError),

    #[error(transparent)]
    FilterConflict(#[from] FilterConflictError),

    #[error(transparent)]
    Metadata(#[from] MetadataParseError),

    #[error(transparent)]
    TestProgram(#[from] TestProgramError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),
}
