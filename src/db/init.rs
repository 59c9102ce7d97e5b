use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the read-write connection, enable WAL and run migrations.
pub fn open(db_path: &Path) -> Result<Connection> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let conn = Connection::open(db_path).context("Failed to open database connection")?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("Failed to set busy timeout")?;

    let mode: String = conn
        .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
        .context("Failed to enable WAL journal mode")?;
    debug!("SQLite journal mode for {:?}: {}", db_path, mode);

    migrate(&conn)?;

    Ok(conn)
}

/// Open a second, read-only connection to a database created by [`open`].
///
/// Under WAL a reader sees the last committed state and never waits on
/// the writer's open transaction.
pub fn open_reader(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .context("Failed to open read-only database connection")?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("Failed to set busy timeout")?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .context("Failed to enable foreign keys")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS uploads (
            identity TEXT PRIMARY KEY,
            upload_id TEXT NOT NULL,
            original_filename TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            received_at TEXT NOT NULL,
            staged_path TEXT NOT NULL
        )",
        [],
    )
    .context("Failed to create uploads table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents (
            identity TEXT PRIMARY KEY,
            origin TEXT NOT NULL,
            title TEXT NOT NULL,
            transcript TEXT NOT NULL,
            generation INTEGER NOT NULL,
            indexed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .context("Failed to create documents table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS chunks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            identity TEXT NOT NULL REFERENCES documents(identity) ON DELETE CASCADE,
            chunk_index INTEGER NOT NULL,
            content TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            embedding BLOB NOT NULL,
            UNIQUE(identity, chunk_index)
        )",
        [],
    )
    .context("Failed to create chunks table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_chunks_identity ON chunks(identity)",
        [],
    )
    .context("Failed to create index on chunks identity")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )
    .context("Failed to create index_meta table")?;

    Ok(())
}
