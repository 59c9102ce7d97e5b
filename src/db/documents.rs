//! Document, chunk and metadata persistence for the vector index.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::schemas::{blob_to_vec, vec_to_blob, ChunkRow, DocumentRow, StoredChunk};

const GENERATION_KEY: &str = "generation";

pub struct DocumentRepository;

impl DocumentRepository {
    /// Replace a document and all of its chunks in one transaction.
    ///
    /// Either the document and every chunk become visible together, or
    /// nothing changes.
    pub fn replace(conn: &mut Connection, doc: &DocumentRow, chunks: &[ChunkRow]) -> Result<()> {
        let tx = conn.transaction().context("Failed to begin transaction")?;

        tx.execute("DELETE FROM chunks WHERE identity = ?1", params![doc.identity])
            .context("Failed to clear previous chunks")?;
        tx.execute("DELETE FROM documents WHERE identity = ?1", params![doc.identity])
            .context("Failed to clear previous document")?;

        tx.execute(
            "INSERT INTO documents (identity, origin, title, transcript, generation) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![doc.identity, doc.origin, doc.title, doc.transcript, doc.generation],
        )
        .context("Failed to insert document")?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO chunks (identity, chunk_index, content, content_hash, embedding) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .context("Failed to prepare chunk insert")?;
            for chunk in chunks {
                stmt.execute(params![
                    doc.identity,
                    chunk.chunk_index,
                    chunk.content,
                    chunk.content_hash,
                    vec_to_blob(&chunk.embedding),
                ])
                .context("Failed to insert chunk")?;
            }
        }

        tx.commit().context("Failed to commit document")?;
        Ok(())
    }

    pub fn contains(conn: &Connection, identity: &str) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM documents WHERE identity = ?1",
                params![identity],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to look up document")?;
        Ok(found.is_some())
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .context("Failed to count documents")?;
        Ok(count)
    }

    /// Every committed chunk with its vector, for brute-force similarity.
    pub fn all_chunks(conn: &Connection) -> Result<Vec<StoredChunk>> {
        let mut stmt = conn
            .prepare(
                "SELECT c.identity, d.title, c.content, c.embedding \
                 FROM chunks c JOIN documents d ON d.identity = c.identity \
                 ORDER BY c.identity, c.chunk_index",
            )
            .context("Failed to prepare chunk scan")?;

        let rows = stmt
            .query_map([], |row| {
                let blob: Vec<u8> = row.get(3)?;
                Ok(StoredChunk {
                    identity: row.get(0)?,
                    title: row.get(1)?,
                    content: row.get(2)?,
                    embedding: blob_to_vec(&blob),
                })
            })
            .context("Failed to scan chunks")?;

        let mut chunks = Vec::new();
        for row in rows {
            chunks.push(row?);
        }
        Ok(chunks)
    }

    pub fn generation(conn: &Connection) -> Result<u64> {
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![GENERATION_KEY],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read generation")?;

        match value {
            Some(v) => v
                .parse()
                .with_context(|| format!("Corrupt generation value: {}", v)),
            None => Ok(0),
        }
    }

    pub fn set_generation(conn: &Connection, generation: u64) -> Result<()> {
        conn.execute(
            "INSERT INTO index_meta (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![GENERATION_KEY, generation.to_string()],
        )
        .context("Failed to persist generation")?;
        Ok(())
    }
}
