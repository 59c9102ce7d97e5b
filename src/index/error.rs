//! Error kinds surfaced by the indexing core.

use thiserror::Error;

/// Errors produced while ingesting recordings or serving the index.
///
/// Per-recording kinds (`SourceFetch`, `Transcription`, `Embedding`, `Merge`,
/// `Timeout`) are captured into the job report and never abort a batch.
/// The remaining kinds are returned synchronously to the caller.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Failed to fetch recording {identity}: {reason}")]
    SourceFetch { identity: String, reason: String },

    #[error("Failed to transcribe {identity}: {reason}")]
    Transcription { identity: String, reason: String },

    #[error("Failed to embed {identity}: {reason}")]
    Embedding { identity: String, reason: String },

    #[error("Failed to merge {identity} into the index: {reason}")]
    Merge { identity: String, reason: String },

    #[error("{stage} of {identity} timed out after {seconds}s")]
    Timeout {
        identity: String,
        stage: &'static str,
        seconds: u64,
    },

    #[error("Index update already in progress (generation {generation}); retry once it completes")]
    ConcurrentUpdateRejected { generation: u64 },

    #[error("No index exists yet; build one before querying")]
    QueryOnEmptyIndex,

    #[error("Upload rejected: {0}")]
    UploadRejected(String),

    #[error("Upload of {size} bytes exceeds the {limit} byte limit")]
    UploadTooLarge { size: u64, limit: u64 },

    #[error("Recording source '{0}' is not configured on this server")]
    SourceUnavailable(String),

    #[error("Transcription backend '{0}' is not available")]
    BackendUnavailable(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl IndexError {
    /// True for the kinds that only affect a single recording of a batch.
    pub fn is_per_recording(&self) -> bool {
        matches!(
            self,
            IndexError::SourceFetch { .. }
                | IndexError::Transcription { .. }
                | IndexError::Embedding { .. }
                | IndexError::Merge { .. }
                | IndexError::Timeout { .. }
        )
    }
}

impl From<rusqlite::Error> for IndexError {
    fn from(err: rusqlite::Error) -> Self {
        IndexError::Storage(err.to_string())
    }
}
