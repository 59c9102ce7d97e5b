//! Persistent vector index over transcribed recordings.
//!
//! A recording is merged as one unit: its document and every chunk become
//! visible to [`IndexStore::search`] together, or not at all.

mod memory;
mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::source::RecordingOrigin;

pub use memory::InMemoryIndexStore;
pub use sqlite::SqliteIndexStore;

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub index: usize,
    pub content: String,
    pub hash: String,
    pub vector: Vec<f32>,
}

/// Everything the index keeps for one recording.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingDocument {
    pub identity: String,
    pub origin: RecordingOrigin,
    pub title: String,
    pub transcript: String,
    pub generation: u64,
    pub chunks: Vec<EmbeddedChunk>,
}

/// A scored chunk returned from similarity search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub identity: String,
    pub title: String,
    pub content: String,
    pub score: f32,
}

#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Insert or replace one recording atomically.
    async fn merge(&self, document: RecordingDocument) -> Result<()>;

    async fn contains(&self, identity: &str) -> Result<bool>;

    /// Top `limit` chunks by cosine similarity, best first.
    async fn search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<Candidate>>;

    async fn document_count(&self) -> Result<usize>;

    /// Last generation recorded; survives restarts for persistent stores.
    async fn generation(&self) -> Result<u64>;

    async fn set_generation(&self, generation: u64) -> Result<()>;
}

/// Sort by score descending and keep the best `limit`.
pub(crate) fn rank(mut candidates: Vec<Candidate>, limit: usize) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(limit);
    candidates
}
