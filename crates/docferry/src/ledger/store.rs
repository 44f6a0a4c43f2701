//! Ledger store backed by SQLite

use crate::error::Result;
use crate::ledger::schema;
use crate::ledger::types::{LedgerEntry, LedgerSummary};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const UPSERT_SUCCESS: &str = r#"
    INSERT INTO documents (identifier, completed, error_count, last_error, updated_at)
    VALUES (?1, 1, 0, '', ?2)
    ON CONFLICT(identifier) DO UPDATE SET
        completed = 1,
        updated_at = excluded.updated_at
    WHERE documents.completed = 0
"#;

const UPSERT_FAILURE: &str = r#"
    INSERT INTO documents (identifier, completed, error_count, last_error, updated_at)
    VALUES (?1, 0, 1, ?2, ?3)
    ON CONFLICT(identifier) DO UPDATE SET
        error_count = documents.error_count + 1,
        last_error = excluded.last_error,
        updated_at = excluded.updated_at
"#;

const UPSERT_REOPEN: &str = r#"
    INSERT INTO documents (identifier, completed, error_count, last_error, updated_at)
    VALUES (?1, 0, 0, ?2, ?3)
    ON CONFLICT(identifier) DO UPDATE SET
        completed = 0,
        last_error = excluded.last_error,
        updated_at = excluded.updated_at
"#;

/// One connection to the ledger database
///
/// Each worker thread opens its own; a `Ledger` is never shared.
pub struct Ledger {
    conn: Connection,
    path: PathBuf,
}

impl Ledger {
    /// Create the database and schema if absent, then open it
    pub fn initialize(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(path = %parent.display(), error = %e, "Could not create ledger directory");
            }
        }

        let conn = Connection::open(path)?;
        schema::configure(&conn)?;
        schema::init_schema(&conn)?;

        tracing::debug!(path = %path.display(), "Ledger initialized");

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Open an existing ledger; fails if [`Ledger::initialize`] never ran
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        schema::configure(&conn)?;
        schema::init_schema(&conn)?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// In-memory ledger for unit tests
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every identifier already marked completed
    pub fn load_completed_ids(&self) -> Result<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT identifier FROM documents WHERE completed = 1")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    /// Mark an identifier completed; repeated calls change nothing
    pub fn record_success(&self, identifier: &str) -> Result<()> {
        self.conn.execute(UPSERT_SUCCESS, params![identifier, now()])?;
        Ok(())
    }

    /// Count one more failure for an identifier and keep the latest message
    pub fn record_failure(&self, identifier: &str, message: &str) -> Result<()> {
        self.conn
            .execute(UPSERT_FAILURE, params![identifier, message, now()])?;
        Ok(())
    }

    /// Hand an identifier back to the upload queue
    ///
    /// Clears `completed` so the next upload run and the local sweep both
    /// pick it up again. The error count is left alone.
    pub fn reopen(&self, identifier: &str, reason: &str) -> Result<()> {
        self.conn
            .execute(UPSERT_REOPEN, params![identifier, reason, now()])?;
        Ok(())
    }

    /// [`Ledger::record_success`] for many identifiers in one transaction
    pub fn record_successes<'a, I>(&mut self, identifiers: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_SUCCESS)?;
            let at = now();
            for identifier in identifiers {
                stmt.execute(params![identifier, at])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// [`Ledger::record_failure`] for many identifiers in one transaction
    pub fn record_failures<'a, I>(&mut self, failures: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_FAILURE)?;
            let at = now();
            for (identifier, message) in failures {
                stmt.execute(params![identifier, message, at])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Identifiers that have an entry but never completed
    pub fn failed_identifiers(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT identifier FROM documents WHERE completed = 0 ORDER BY identifier")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    pub fn entry(&self, identifier: &str) -> Result<Option<LedgerEntry>> {
        let entry = self
            .conn
            .query_row(
                r#"
                SELECT identifier, completed, error_count, last_error, updated_at
                FROM documents WHERE identifier = ?1
                "#,
                params![identifier],
                entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    /// Failed entries, most troublesome first
    pub fn failures(&self, limit: usize) -> Result<Vec<LedgerEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT identifier, completed, error_count, last_error, updated_at
            FROM documents
            WHERE completed = 0
            ORDER BY error_count DESC, identifier ASC
            LIMIT ?1
            "#,
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let entries = stmt
            .query_map(params![limit], entry_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn summary(&self) -> Result<LedgerSummary> {
        let (completed, failed, total_errors) = self.conn.query_row(
            r#"
            SELECT
                COALESCE(SUM(completed = 1), 0),
                COALESCE(SUM(completed = 0), 0),
                COALESCE(SUM(error_count), 0)
            FROM documents
            "#,
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )?;

        Ok(LedgerSummary {
            completed: completed.max(0) as u64,
            failed: failed.max(0) as u64,
            total_errors: total_errors.max(0) as u64,
        })
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<LedgerEntry> {
    Ok(LedgerEntry {
        identifier: row.get(0)?,
        completed: row.get(1)?,
        error_count: row.get(2)?,
        last_error: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}
