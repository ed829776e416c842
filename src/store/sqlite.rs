// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The SQLite-backed store, the concrete backend this crate ships for the
//! abstract `Store`/`Transaction` contract (see the redesign note recorded
//! alongside this module).

use super::{format_metadata, result_from_row, Store, Transaction};
use crate::errors::{IntegrityError, StoreError};
use crate::metadata::Metadata;
use crate::result::TestResultKind;
use camino::{Utf8Path, Utf8PathBuf};
use rusqlite::{params, Connection};
use std::collections::HashMap;

/// A result store backed by a single SQLite database file.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (creating if necessary) the database at `path` and applies the
    /// schema.
    pub fn open(path: &Utf8Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::Open { path: path.to_owned(), source })?;
        conn.execute_batch(super::schema::SCHEMA).map_err(backend)?;
        Ok(Self { conn })
    }

    /// Opens a private, in-memory database. Useful for tests that want
    /// real SQL semantics without a file on disk.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        conn.execute_batch(super::schema::SCHEMA).map_err(backend)?;
        Ok(Self { conn })
    }
}

impl Store for SqliteStore {
    fn begin(&mut self) -> Result<Box<dyn Transaction + '_>, StoreError> {
        let tx = self.conn.transaction().map_err(backend)?;
        Ok(Box::new(SqliteTransaction { tx }))
    }

    fn results(&self, action_id: i64) -> Result<Vec<Result<(Utf8PathBuf, String, TestResultKind), IntegrityError>>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT tp.absolute_path, tc.name, r.result_type, r.reason
                 FROM results r
                 JOIN test_cases tc ON tc.test_case_id = r.test_case_id
                 JOIN test_programs tp ON tp.test_program_id = tc.test_program_id
                 WHERE tp.action_id = ?1",
            )
            .map_err(backend)?;

        let rows = stmt
            .query_map(params![action_id], |row| {
                let absolute_path: String = row.get(0)?;
                let case_name: String = row.get(1)?;
                let result_type: String = row.get(2)?;
                let reason: Option<String> = row.get(3)?;
                Ok((absolute_path, case_name, result_type, reason))
            })
            .map_err(backend)?;

        let mut results = Vec::new();
        for row in rows {
            let (absolute_path, case_name, result_type, reason) = row.map_err(backend)?;
            let label = format!("{absolute_path}:{case_name}");
            let parsed = result_from_row(&label, &result_type, reason).map(|kind| (Utf8PathBuf::from(absolute_path), case_name, kind));
            results.push(parsed);
        }
        Ok(results)
    }
}

struct SqliteTransaction<'conn> {
    tx: rusqlite::Transaction<'conn>,
}

impl Transaction for SqliteTransaction<'_> {
    fn put_context(&mut self, cwd: &Utf8Path, env: &HashMap<String, String>) -> Result<i64, StoreError> {
        self.tx.execute("INSERT INTO contexts (cwd) VALUES (?1)", params![cwd.as_str()]).map_err(backend)?;
        let context_id = self.tx.last_insert_rowid();
        for (name, value) in env {
            self.tx
                .execute("INSERT INTO env_vars (context_id, var_name, var_value) VALUES (?1, ?2, ?3)", params![context_id, name, value])
                .map_err(backend)?;
        }
        Ok(context_id)
    }

    fn put_action(&mut self, context_id: i64) -> Result<i64, StoreError> {
        self.tx.execute("INSERT INTO actions (context_id) VALUES (?1)", params![context_id]).map_err(backend)?;
        Ok(self.tx.last_insert_rowid())
    }

    fn put_test_program(&mut self, action_id: i64, absolute_path: &Utf8Path, suite_name: &str) -> Result<i64, StoreError> {
        self.tx
            .execute(
                "INSERT INTO test_programs (action_id, absolute_path, test_suite_name) VALUES (?1, ?2, ?3)",
                params![action_id, absolute_path.as_str(), suite_name],
            )
            .map_err(backend)?;
        Ok(self.tx.last_insert_rowid())
    }

    fn put_test_case(&mut self, test_program_id: i64, name: &str, metadata: &Metadata) -> Result<i64, StoreError> {
        self.tx
            .execute(
                "INSERT INTO test_cases (test_program_id, name, metadata) VALUES (?1, ?2, ?3)",
                params![test_program_id, name, format_metadata(metadata)],
            )
            .map_err(backend)?;
        Ok(self.tx.last_insert_rowid())
    }

    fn put_result(&mut self, test_case_id: i64, kind: &TestResultKind) -> Result<i64, StoreError> {
        self.tx
            .execute(
                "INSERT INTO results (test_case_id, result_type, reason) VALUES (?1, ?2, ?3)",
                params![test_case_id, kind.store_tag(), kind.reason()],
            )
            .map_err(backend)?;
        Ok(self.tx.last_insert_rowid())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().map_err(|source| StoreError::Commit { source })
    }

    fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().map_err(backend)
    }
}

fn backend(source: rusqlite::Error) -> StoreError {
    StoreError::Backend { source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Metadata;
    use std::collections::HashMap;

    #[test]
    fn round_trips_a_passed_result() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let action_id = {
            let mut tx = store.begin().unwrap();
            let context_id = tx.put_context(Utf8Path::new("/work"), &HashMap::new()).unwrap();
            let action_id = tx.put_action(context_id).unwrap();
            let program_id = tx.put_test_program(action_id, Utf8Path::new("/suite/prog"), "mysuite").unwrap();
            let case_id = tx.put_test_case(program_id, "my_case", &Metadata::default()).unwrap();
            tx.put_result(case_id, &TestResultKind::Passed).unwrap();
            tx.commit().unwrap();
            action_id
        };

        let rows = store.results(action_id).unwrap();
        assert_eq!(rows.len(), 1);
        let (path, case_name, kind) = rows[0].clone().unwrap();
        assert_eq!(path, Utf8PathBuf::from("/suite/prog"));
        assert_eq!(case_name, "my_case");
        assert_eq!(kind, TestResultKind::Passed);
    }

    #[test]
    fn rollback_discards_everything() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut tx = store.begin().unwrap();
        let context_id = tx.put_context(Utf8Path::new("/work"), &HashMap::new()).unwrap();
        let action_id = tx.put_action(context_id).unwrap();
        tx.rollback().unwrap();

        let rows = store.results(action_id).unwrap();
        assert!(rows.is_empty());
    }
}
