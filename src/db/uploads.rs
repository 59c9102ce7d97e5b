//! Upload staging persistence for the `uploads` table.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::schemas::UploadRow;

pub struct UploadRepository;

impl UploadRepository {
    /// Insert or replace the upload for `row.identity`.
    ///
    /// Returns the record that was replaced, if any.
    pub fn upsert(conn: &Connection, row: &UploadRow) -> Result<Option<UploadRow>> {
        let previous = Self::get(conn, &row.identity)?;
        conn.execute(
            "INSERT INTO uploads (identity, upload_id, original_filename, size_bytes, received_at, staged_path) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(identity) DO UPDATE SET upload_id = excluded.upload_id, \
             original_filename = excluded.original_filename, size_bytes = excluded.size_bytes, \
             received_at = excluded.received_at, staged_path = excluded.staged_path",
            params![
                row.identity,
                row.upload_id,
                row.original_filename,
                row.size_bytes,
                row.received_at,
                row.staged_path,
            ],
        )
        .context("Failed to upsert upload")?;
        Ok(previous)
    }

    pub fn get(conn: &Connection, identity: &str) -> Result<Option<UploadRow>> {
        conn.query_row(
            "SELECT identity, upload_id, original_filename, size_bytes, received_at, staged_path \
             FROM uploads WHERE identity = ?1",
            params![identity],
            map_row,
        )
        .optional()
        .context("Failed to query upload")
    }

    /// All staged uploads, oldest first.
    pub fn list(conn: &Connection) -> Result<Vec<UploadRow>> {
        let mut stmt = conn
            .prepare(
                "SELECT identity, upload_id, original_filename, size_bytes, received_at, staged_path \
                 FROM uploads ORDER BY received_at ASC, identity ASC",
            )
            .context("Failed to prepare uploads list query")?;

        let rows = stmt
            .query_map([], map_row)
            .context("Failed to list uploads")?;

        let mut uploads = Vec::new();
        for row in rows {
            uploads.push(row?);
        }

        Ok(uploads)
    }

    /// Delete the row only if it still refers to `upload_id`.
    ///
    /// A re-upload of the same identity after a job's snapshot carries a
    /// new `upload_id` and survives.
    pub fn delete_if_current(conn: &Connection, identity: &str, upload_id: &str) -> Result<bool> {
        let deleted = conn
            .execute(
                "DELETE FROM uploads WHERE identity = ?1 AND upload_id = ?2",
                params![identity, upload_id],
            )
            .context("Failed to delete upload")?;
        Ok(deleted > 0)
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM uploads", [], |row| row.get(0))
            .context("Failed to count uploads")?;
        Ok(count)
    }
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UploadRow> {
    Ok(UploadRow {
        identity: row.get(0)?,
        upload_id: row.get(1)?,
        original_filename: row.get(2)?,
        size_bytes: row.get(3)?,
        received_at: row.get(4)?,
        staged_path: row.get(5)?,
    })
}
