//! Read-only projection of index state and pending uploads for pollers.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::recording::JobReport;
use super::state::{IndexStateHandle, IndexStatus};
use crate::embedding::EmbeddingInfo;
use crate::transcription::TranscriberInfo;
use crate::uploads::{UploadRecord, UploadStagingArea};

/// Which optional backends this process was started with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub daily: bool,
    pub transcriber: TranscriberInfo,
    pub embedding: EmbeddingInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadsStatus {
    pub files: Vec<String>,
    pub count: usize,
    pub details: Vec<UploadRecord>,
}

#[derive(Clone)]
pub struct StatusRegistry {
    state: IndexStateHandle,
    report: Arc<RwLock<Option<JobReport>>>,
    uploads: UploadStagingArea,
    capabilities: Capabilities,
}

impl StatusRegistry {
    pub fn new(
        state: IndexStateHandle,
        report: Arc<RwLock<Option<JobReport>>>,
        uploads: UploadStagingArea,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            state,
            report,
            uploads,
            capabilities,
        }
    }

    pub async fn db_status(&self) -> IndexStatus {
        self.state.get().await
    }

    pub async fn uploads(&self) -> anyhow::Result<UploadsStatus> {
        let staging = self.uploads.clone();
        let details = tokio::task::spawn_blocking(move || staging.snapshot()).await??;
        Ok(UploadsStatus {
            files: details.iter().map(|r| r.identity.clone()).collect(),
            count: details.len(),
            details,
        })
    }

    pub async fn last_report(&self) -> Option<JobReport> {
        self.report.read().await.clone()
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }
}
