// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Execution engine for kyua.
//!
//! This crate implements the part of kyua that turns a loaded test suite
//! (a list of test programs plus user filters) into a sandboxed,
//! partial-failure-tolerant batch of test-case runs, persisted into a
//! result store. It does not parse `Kyuafile`s, render reports, or provide
//! a command-line front-end: those are external collaborators that consume
//! this crate's public API.

pub mod config;
pub mod driver;
pub mod errors;
pub mod filter;
pub mod identity;
#[cfg(unix)]
pub mod isolation;
pub mod logging;
pub mod metadata;
pub mod process;
pub mod result;
pub mod runner;
pub mod scanner;
mod signal;
pub mod store;
pub mod test_program;
mod work_dir;

pub use driver::{Driver, Hooks, NoopHooks};
pub use errors::KyuaError;
pub use filter::Filter;
pub use identity::{TestCaseId, TestProgramId};
pub use result::{TestResult, TestResultKind};
pub use runner::TestCaseRunner;
pub use scanner::Scanner;
pub use store::{InMemoryStore, SqliteStore, Store, Transaction};
