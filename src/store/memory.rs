//! In-memory [`IndexStore`] for tests and ephemeral runs.
//!
//! All documents sit behind one `RwLock`; a merge holds the write lock for
//! the whole recording, so readers see it entirely or not at all.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::{rank, Candidate, IndexStore, RecordingDocument};
use crate::embedding::cosine_similarity;

#[derive(Default)]
pub struct InMemoryIndexStore {
    documents: RwLock<HashMap<String, RecordingDocument>>,
    generation: AtomicU64,
}

impl InMemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IndexStore for InMemoryIndexStore {
    async fn merge(&self, document: RecordingDocument) -> Result<()> {
        let mut documents = self
            .documents
            .write()
            .map_err(|_| anyhow!("Index lock poisoned"))?;
        documents.insert(document.identity.clone(), document);
        Ok(())
    }

    async fn contains(&self, identity: &str) -> Result<bool> {
        let documents = self
            .documents
            .read()
            .map_err(|_| anyhow!("Index lock poisoned"))?;
        Ok(documents.contains_key(identity))
    }

    async fn search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<Candidate>> {
        let documents = self
            .documents
            .read()
            .map_err(|_| anyhow!("Index lock poisoned"))?;

        let candidates = documents
            .values()
            .flat_map(|doc| {
                doc.chunks.iter().map(move |chunk| Candidate {
                    identity: doc.identity.clone(),
                    title: doc.title.clone(),
                    content: chunk.content.clone(),
                    score: cosine_similarity(query_vec, &chunk.vector),
                })
            })
            .collect();

        Ok(rank(candidates, limit))
    }

    async fn document_count(&self) -> Result<usize> {
        let documents = self
            .documents
            .read()
            .map_err(|_| anyhow!("Index lock poisoned"))?;
        Ok(documents.len())
    }

    async fn generation(&self) -> Result<u64> {
        Ok(self.generation.load(Ordering::SeqCst))
    }

    async fn set_generation(&self, generation: u64) -> Result<()> {
        self.generation.store(generation, Ordering::SeqCst);
        Ok(())
    }
}
