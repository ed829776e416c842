// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The relational shape backing the store transaction layer (C6): an
//! action's context, its test programs, their test cases, and each case's
//! one result row.

/// DDL applied once when opening a fresh database file.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS contexts (
    context_id INTEGER PRIMARY KEY,
    cwd        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS env_vars (
    context_id INTEGER NOT NULL REFERENCES contexts(context_id),
    var_name   TEXT NOT NULL,
    var_value  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS actions (
    action_id  INTEGER PRIMARY KEY,
    context_id INTEGER NOT NULL REFERENCES contexts(context_id)
);

CREATE TABLE IF NOT EXISTS test_programs (
    test_program_id INTEGER PRIMARY KEY,
    action_id       INTEGER NOT NULL REFERENCES actions(action_id),
    absolute_path   TEXT NOT NULL,
    test_suite_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS test_cases (
    test_case_id    INTEGER PRIMARY KEY,
    test_program_id INTEGER NOT NULL REFERENCES test_programs(test_program_id),
    name            TEXT NOT NULL,
    metadata        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS results (
    result_id    INTEGER PRIMARY KEY,
    test_case_id INTEGER NOT NULL REFERENCES test_cases(test_case_id),
    result_type  TEXT NOT NULL,
    reason       TEXT,
    CHECK ((result_type = 'passed' AND reason IS NULL) OR (result_type != 'passed' AND reason IS NOT NULL))
);
";
