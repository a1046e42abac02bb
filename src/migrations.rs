//! Numbered schema migrations embedded at compile time.
//!
//! Each migration is a SQL batch applied exactly once, tracked in the
//! `schema_version` table. Before upgrading a non-empty database the file is
//! copied aside via the SQLite online backup API, and a database stamped
//! with a version newer than this build knows is refused outright.

use chrono::Utc;
use rusqlite::Connection;

use crate::db::DbError;

struct Migration {
    version: i64,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("migrations/001_baseline.sql"),
}];

/// Apply all pending migrations. Returns the number applied.
pub fn run_migrations(conn: &Connection) -> Result<usize, DbError> {
    ensure_version_table(conn)?;
    let current = current_version(conn)?;

    let latest = MIGRATIONS.iter().map(|m| m.version).max().unwrap_or(0);
    if current > latest {
        return Err(DbError::Migration(format!(
            "database schema version {current} is newer than this build supports ({latest})"
        )));
    }

    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|m| m.version > current)
        .collect();
    if pending.is_empty() {
        return Ok(0);
    }

    // A fresh database has nothing worth copying aside.
    if current > 0 {
        backup_before_migration(conn, current)?;
    }

    for migration in &pending {
        conn.execute_batch(migration.sql).map_err(|e| {
            DbError::Migration(format!("migration {} failed: {e}", migration.version))
        })?;
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![migration.version, Utc::now().to_rfc3339()],
        )?;
        log::info!("Applied schema migration {}", migration.version);
    }

    Ok(pending.len())
}

fn ensure_version_table(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
    )?;
    Ok(())
}

fn current_version(conn: &Connection) -> Result<i64, DbError> {
    let version: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get(0)
        })?;
    Ok(version.unwrap_or(0))
}

/// Copy the database file aside before a schema upgrade. Skipped for
/// in-memory databases, which have no path to copy.
fn backup_before_migration(conn: &Connection, from_version: i64) -> Result<(), DbError> {
    use rusqlite::backup::Backup;
    use std::time::Duration;

    let Some(path) = conn.path().filter(|p| !p.is_empty()) else {
        return Ok(());
    };
    let backup_path = format!("{path}.v{from_version}.bak");
    let mut dst = Connection::open(&backup_path)?;
    let backup = Backup::new(conn, &mut dst)?;
    backup
        .run_to_completion(64, Duration::from_millis(50), None)
        .map_err(|e| DbError::Migration(format!("pre-migration backup failed: {e}")))?;
    log::info!("Wrote pre-migration backup to {backup_path}");
    Ok(())
}
