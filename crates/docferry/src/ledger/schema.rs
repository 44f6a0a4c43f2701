//! SQLite schema for the progress ledger

use crate::error::Result;
use rusqlite::Connection;
use std::time::Duration;

/// How long a writer waits for another worker's transaction to finish
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings applied to every ledger connection
pub fn configure(conn: &Connection) -> Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    // WAL lets one worker read while another commits
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "FULL")?;
    Ok(())
}

/// Initialize ledger schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            identifier TEXT PRIMARY KEY NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            error_count INTEGER NOT NULL DEFAULT 0,
            last_error TEXT NOT NULL DEFAULT '',
            updated_at TEXT NOT NULL
        )
        "#,
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_documents_completed ON documents(completed)",
        [],
    )?;

    Ok(())
}
