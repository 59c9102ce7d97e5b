//! Index lifecycle state and its shared handle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::IndexError;

/// Phase of the index lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexPhase {
    Uninitialized,
    Updating,
    Ready,
    Failed,
}

impl IndexPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Updating => "updating",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    /// Whether some committed index content may exist.
    pub fn is_queryable(&self) -> bool {
        !matches!(self, Self::Uninitialized)
    }
}

/// Snapshot of the index state as seen by pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStatus {
    pub state: IndexPhase,
    pub message: String,
    pub generation: u64,
    pub updated_at: DateTime<Utc>,
}

impl Default for IndexStatus {
    fn default() -> Self {
        Self {
            state: IndexPhase::Uninitialized,
            message: "No index has been built yet".to_string(),
            generation: 0,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct StateCell {
    status: IndexStatus,
    /// Phase to fall back to for query eligibility while updating.
    committed: Option<IndexPhase>,
}

/// Thread-safe handle to the single process-wide index state.
///
/// Moving into `updating` is a compare-and-set under the lock; every other
/// transition is only applied by the job that owns the current generation.
#[derive(Clone, Default)]
pub struct IndexStateHandle {
    inner: Arc<Mutex<StateCell>>,
}

impl IndexStateHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> IndexStatus {
        self.inner.lock().await.status.clone()
    }

    /// Seed the state at startup from what the store already holds.
    pub async fn restore(&self, phase: IndexPhase, message: String, generation: u64) {
        let mut cell = self.inner.lock().await;
        cell.status = IndexStatus {
            state: phase,
            message,
            generation,
            updated_at: Utc::now(),
        };
        cell.committed = Some(phase);
    }

    /// Move to `updating` unless a job is already in flight.
    ///
    /// Returns the new generation on success.
    pub async fn try_begin_update(&self, message: String) -> Result<u64, IndexError> {
        let mut cell = self.inner.lock().await;
        if cell.status.state == IndexPhase::Updating {
            return Err(IndexError::ConcurrentUpdateRejected {
                generation: cell.status.generation,
            });
        }

        cell.committed = Some(cell.status.state);
        cell.status.generation += 1;
        cell.status.state = IndexPhase::Updating;
        cell.status.message = message;
        cell.status.updated_at = Utc::now();
        Ok(cell.status.generation)
    }

    /// Progress message for the in-flight job. Ignored for stale generations.
    pub async fn set_message(&self, generation: u64, message: String) -> bool {
        let mut cell = self.inner.lock().await;
        if cell.status.generation != generation || cell.status.state != IndexPhase::Updating {
            return false;
        }
        cell.status.message = message;
        cell.status.updated_at = Utc::now();
        true
    }

    /// Resolve the in-flight job. Ignored for stale generations.
    pub async fn finish(&self, generation: u64, phase: IndexPhase, message: String) -> bool {
        let mut cell = self.inner.lock().await;
        if cell.status.generation != generation || cell.status.state != IndexPhase::Updating {
            return false;
        }
        cell.status.state = phase;
        cell.status.message = message;
        cell.status.updated_at = Utc::now();
        cell.committed = Some(phase);
        true
    }

    /// True once any generation has committed content or a prior build
    /// existed. A first build that is still `updating` is not queryable.
    pub async fn is_queryable(&self, has_documents: bool) -> bool {
        let cell = self.inner.lock().await;
        match cell.status.state {
            IndexPhase::Uninitialized => false,
            IndexPhase::Ready | IndexPhase::Failed => true,
            IndexPhase::Updating => {
                has_documents
                    || cell
                        .committed
                        .map(|phase| phase.is_queryable())
                        .unwrap_or(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_phase_as_str() {
        assert_eq!(IndexPhase::Uninitialized.as_str(), "uninitialized");
        assert_eq!(IndexPhase::Updating.as_str(), "updating");
        assert_eq!(IndexPhase::Ready.as_str(), "ready");
        assert_eq!(IndexPhase::Failed.as_str(), "failed");
    }

    #[test]
    fn test_index_phase_serialization() {
        let json = serde_json::to_string(&IndexPhase::Updating).unwrap();
        assert_eq!(json, "\"updating\"");

        let parsed: IndexPhase = serde_json::from_str("\"ready\"").unwrap();
        assert_eq!(parsed, IndexPhase::Ready);
    }

    #[tokio::test]
    async fn test_second_begin_is_rejected() {
        let handle = IndexStateHandle::new();
        let generation = handle.try_begin_update("first".to_string()).await.unwrap();
        assert_eq!(generation, 1);

        let err = handle
            .try_begin_update("second".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::ConcurrentUpdateRejected { generation: 1 }));

        let status = handle.get().await;
        assert_eq!(status.state, IndexPhase::Updating);
        assert_eq!(status.message, "first");
    }

    #[tokio::test]
    async fn test_finish_then_begin_increments_generation() {
        let handle = IndexStateHandle::new();
        let first = handle.try_begin_update("go".to_string()).await.unwrap();
        assert!(handle.finish(first, IndexPhase::Failed, "nothing worked".to_string()).await);

        let second = handle.try_begin_update("again".to_string()).await.unwrap();
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn test_stale_generation_cannot_finish() {
        let handle = IndexStateHandle::new();
        let first = handle.try_begin_update("go".to_string()).await.unwrap();
        handle.finish(first, IndexPhase::Ready, "done".to_string()).await;

        assert!(!handle.finish(first, IndexPhase::Failed, "late".to_string()).await);
        assert!(!handle.set_message(first, "late".to_string()).await);
        assert_eq!(handle.get().await.state, IndexPhase::Ready);
    }

    #[tokio::test]
    async fn test_query_eligibility() {
        let handle = IndexStateHandle::new();
        assert!(!handle.is_queryable(false).await);

        // First build in flight with nothing committed yet
        let generation = handle.try_begin_update("build".to_string()).await.unwrap();
        assert!(!handle.is_queryable(false).await);
        assert!(handle.is_queryable(true).await);

        handle.finish(generation, IndexPhase::Ready, "ok".to_string()).await;
        handle.try_begin_update("update".to_string()).await.unwrap();
        assert!(handle.is_queryable(false).await);
    }

    #[tokio::test]
    async fn test_restore() {
        let handle = IndexStateHandle::new();
        handle
            .restore(IndexPhase::Ready, "Index loaded and ready to query".to_string(), 4)
            .await;
        let status = handle.get().await;
        assert_eq!(status.state, IndexPhase::Ready);
        assert_eq!(status.generation, 4);
        assert_eq!(handle.try_begin_update("next".to_string()).await.unwrap(), 5);
    }
}
