//! SQLite-backed [`IndexStore`].
//!
//! Two connections to the same WAL database: the writer applies each
//! recording in its own transaction, the reader serves searches from the
//! last committed state without waiting on the writer.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use tracing::debug;

use super::{rank, Candidate, IndexStore, RecordingDocument};
use crate::db::{self, ChunkRow, DocumentRepository, DocumentRow};
use crate::embedding::cosine_similarity;

#[derive(Clone)]
pub struct SqliteIndexStore {
    writer: Arc<Mutex<Connection>>,
    reader: Arc<Mutex<Connection>>,
}

impl SqliteIndexStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        let writer = db::open(db_path)?;
        let reader = db::open_reader(db_path)?;
        debug!("Opened index store at {:?}", db_path);
        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            reader: Arc::new(Mutex::new(reader)),
        })
    }

    /// Search-only handle on a database another process may be writing.
    /// Merges through it fail.
    pub fn open_read_only(db_path: &Path) -> Result<Self> {
        let writer = db::open_reader(db_path)?;
        let reader = db::open_reader(db_path)?;
        debug!("Opened index store at {:?} read-only", db_path);
        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            reader: Arc::new(Mutex::new(reader)),
        })
    }

    async fn with_writer<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.writer);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| anyhow!("Index writer lock poisoned"))?;
            f(&mut guard)
        })
        .await
        .context("Index writer task failed")?
    }

    async fn with_reader<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.reader);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| anyhow!("Index reader lock poisoned"))?;
            f(&guard)
        })
        .await
        .context("Index reader task failed")?
    }
}

#[async_trait]
impl IndexStore for SqliteIndexStore {
    async fn merge(&self, document: RecordingDocument) -> Result<()> {
        let row = DocumentRow {
            identity: document.identity,
            origin: document.origin.as_str().to_string(),
            title: document.title,
            transcript: document.transcript,
            generation: document.generation as i64,
        };
        let chunks: Vec<ChunkRow> = document
            .chunks
            .into_iter()
            .map(|chunk| ChunkRow {
                chunk_index: chunk.index as i64,
                content: chunk.content,
                content_hash: chunk.hash,
                embedding: chunk.vector,
            })
            .collect();

        self.with_writer(move |conn| DocumentRepository::replace(conn, &row, &chunks))
            .await
    }

    async fn contains(&self, identity: &str) -> Result<bool> {
        let identity = identity.to_string();
        self.with_reader(move |conn| DocumentRepository::contains(conn, &identity))
            .await
    }

    async fn search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<Candidate>> {
        let query_vec = query_vec.to_vec();
        self.with_reader(move |conn| {
            let candidates = DocumentRepository::all_chunks(conn)?
                .into_iter()
                .map(|chunk| Candidate {
                    score: cosine_similarity(&query_vec, &chunk.embedding),
                    identity: chunk.identity,
                    title: chunk.title,
                    content: chunk.content,
                })
                .collect();
            Ok(rank(candidates, limit))
        })
        .await
    }

    async fn document_count(&self) -> Result<usize> {
        self.with_reader(|conn| Ok(DocumentRepository::count(conn)?.max(0) as usize))
            .await
    }

    async fn generation(&self) -> Result<u64> {
        self.with_reader(DocumentRepository::generation).await
    }

    async fn set_generation(&self, generation: u64) -> Result<()> {
        self.with_writer(move |conn| DocumentRepository::set_generation(conn, generation))
            .await
    }
}
