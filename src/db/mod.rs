//! SQLite-backed persistence for accounts and account relationships.
//!
//! All access goes through [`StewardDb`], which owns a single connection.
//! Query implementations live in sibling modules (`accounts`, `relationships`)
//! as `impl StewardDb` blocks; this module handles opening, pragmas,
//! migrations, and transaction plumbing.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};

use crate::error::StewardError;

pub mod accounts;
pub mod relationships;
pub mod types;
pub use types::*;

pub struct StewardDb {
    conn: Connection,
}

impl StewardDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, StewardError>
    where
        F: FnOnce(&Self) -> Result<T, StewardError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| StewardError::Db(e.into()))?;
        match f(self) {
            Ok(value) => {
                self.conn
                    .execute_batch("COMMIT")
                    .map_err(|e| StewardError::Db(e.into()))?;
                Ok(value)
            }
            Err(err) => {
                // Preserve the original error even if the rollback itself fails.
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(err)
            }
        }
    }

    /// Open (creating if needed) the database at its default location and
    /// run any pending migrations.
    pub fn open() -> Result<Self, DbError> {
        let path = Self::db_path()?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(DbError::CreateDir)?;
        }
        Self::open_at(&path)
    }

    /// Open a database at an explicit path. Used by tests and by callers
    /// that manage their own storage location.
    pub fn open_at(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let db = StewardDb { conn };
        crate::migrations::run_migrations(&db.conn)?;
        Ok(db)
    }

    /// Open an existing database read-only. Never runs migrations; fails if
    /// the file does not exist.
    pub fn open_readonly_at(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(StewardDb { conn })
    }

    /// Default database location: `~/.steward/steward.db`.
    pub fn db_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".steward").join("steward.db"))
    }
}


#[cfg(test)]
mod tests {
    use super::test_utils::test_db;
    use super::*;

    #[test]
    fn test_open_at_creates_schema() {
        let db = test_db();
        let count: i64 = db
            .conn_ref()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'table' AND name IN ('accounts', 'account_relationships', 'schema_version')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_with_transaction_commits_on_ok() {
        let db = test_db();
        db.with_transaction(|db| {
            db.conn_ref()
                .execute(
                    "INSERT INTO accounts (id, tenant_id, name, entity_type, tags, hierarchy_level, hierarchy_path, created_at, updated_at)
                     VALUES ('a1', 't1', 'Acme', 'company', '[]', 0, 'a1', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
                    [],
                )
                .map_err(|e| StewardError::Db(e.into()))?;
            Ok(())
        })
        .unwrap();

        let count: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_with_transaction_rolls_back_on_err() {
        let db = test_db();
        let result: Result<(), StewardError> = db.with_transaction(|db| {
            db.conn_ref()
                .execute(
                    "INSERT INTO accounts (id, tenant_id, name, entity_type, tags, hierarchy_level, hierarchy_path, created_at, updated_at)
                     VALUES ('a1', 't1', 'Acme', 'company', '[]', 0, 'a1', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
                    [],
                )
                .map_err(|e| StewardError::Db(e.into()))?;
            Err(StewardError::ValidationFailed(vec!["boom".to_string()]))
        });
        assert!(result.is_err());

        let count: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_open_readonly_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ro.db");
        {
            let _db = StewardDb::open_at(&path).unwrap();
        }
        let ro = StewardDb::open_readonly_at(&path).unwrap();
        let result = ro.conn_ref().execute(
            "INSERT INTO accounts (id, tenant_id, name, entity_type, tags, hierarchy_level, hierarchy_path, created_at, updated_at)
             VALUES ('a1', 't1', 'Acme', 'company', '[]', 0, 'a1', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            [],
        );
        assert!(result.is_err());
    }
}
