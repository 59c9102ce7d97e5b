//! Shared fakes for driving the orchestrator without real backends.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use recall_index::daily::Recording;
use recall_index::embedding::HashingEmbedder;
use recall_index::index::{IndexComponents, IndexOrchestrator, OrchestratorSettings};
use recall_index::normalizer::{PlainTextNormalizer, TranscriptionNormalizer};
use recall_index::source::{CloudSource, RecordingCatalog, RecordingSource, UploadSource};
use recall_index::store::{InMemoryIndexStore, IndexStore};
use recall_index::transcription::{MediaRef, Transcriber, TranscriptionProvider};
use recall_index::uploads::UploadStagingArea;
use rusqlite::Connection;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Reads uploaded files as their own transcript. Files starting with
/// `CORRUPT` fail like an undecodable video would, `HANG` never finishes
/// and `PANIC` panics mid-transcription.
pub struct ScriptedProvider {
    gate: Option<Arc<Semaphore>>,
}

impl TranscriptionProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "Scripted"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn requires_local_audio(&self) -> bool {
        false
    }

    fn transcribe<'a>(
        &'a self,
        media: &'a MediaRef,
        _language: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await?;
            }
            match media {
                MediaRef::LocalFile(path) => {
                    let text = tokio::fs::read_to_string(path).await?;
                    if text.starts_with("CORRUPT") {
                        bail!("decoder error: invalid data found when processing input");
                    }
                    if text.starts_with("HANG") {
                        std::future::pending::<()>().await;
                    }
                    if text.starts_with("PANIC") {
                        panic!("transcriber crashed on {:?}", path);
                    }
                    Ok(text)
                }
                MediaRef::RemoteUrl(url) => Ok(format!(
                    "The recording at {} covered the quarterly roadmap",
                    url
                )),
            }
        })
    }

    fn normalizer(&self) -> Result<Box<dyn TranscriptionNormalizer>> {
        Ok(Box::new(PlainTextNormalizer::new()))
    }
}

/// Returns every recording regardless of the requested limit.
pub struct FakeCatalog {
    pub recordings: Vec<Recording>,
}

impl FakeCatalog {
    pub fn with_count(count: usize) -> Self {
        let recordings = (0..count)
            .map(|i| Recording {
                id: format!("rec-{}", i),
                room_name: "standup".to_string(),
                timestamp: Utc
                    .timestamp_opt(1_700_000_000 + i as i64 * 3600, 0)
                    .unwrap(),
            })
            .collect();
        Self { recordings }
    }
}

#[async_trait]
impl RecordingCatalog for FakeCatalog {
    async fn fetch_recordings(&self, _room_name: Option<&str>, _limit: usize) -> Result<Vec<Recording>> {
        Ok(self.recordings.clone())
    }

    async fn access_link(&self, recording_id: &str) -> Result<String> {
        Ok(format!("https://media.example.com/{}", recording_id))
    }
}

pub struct Harness {
    pub orchestrator: IndexOrchestrator,
    pub staging: UploadStagingArea,
    pub dir: tempfile::TempDir,
}

pub struct HarnessOptions {
    pub store: Arc<dyn IndexStore>,
    pub cloud_recordings: Option<usize>,
    pub gate: Option<Arc<Semaphore>>,
    pub recording_timeout: Duration,
    /// Replaces the staging-backed upload source.
    pub uploads_source: Option<Arc<dyn RecordingSource>>,
    pub dir: tempfile::TempDir,
}

impl HarnessOptions {
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemoryIndexStore::new()),
            cloud_recordings: None,
            gate: None,
            recording_timeout: Duration::from_secs(10),
            uploads_source: None,
            dir: tempfile::tempdir().unwrap(),
        }
    }
}

pub fn harness(options: HarnessOptions) -> Harness {
    let staging = UploadStagingArea::with_connection(
        Connection::open_in_memory().unwrap(),
        options.dir.path().join("uploads"),
        1024 * 1024,
    )
    .unwrap();

    let cloud: Option<Arc<dyn RecordingSource>> = options.cloud_recordings.map(|count| {
        Arc::new(CloudSource::new(
            Arc::new(FakeCatalog::with_count(count)),
            options.dir.path().join("staging"),
            Duration::from_secs(5),
        )) as Arc<dyn RecordingSource>
    });

    let transcriber = Transcriber::from_provider(
        Box::new(ScriptedProvider { gate: options.gate }),
        "en".to_string(),
    )
    .unwrap();

    let orchestrator = IndexOrchestrator::new(
        IndexComponents {
            store: options.store,
            transcriber: Arc::new(transcriber),
            embedder: Arc::new(HashingEmbedder::new(256)),
            cloud,
            uploads: options
                .uploads_source
                .unwrap_or_else(|| Arc::new(UploadSource::new(staging.clone()))),
        },
        OrchestratorSettings {
            concurrency: 3,
            recording_timeout: options.recording_timeout,
            ..OrchestratorSettings::default()
        },
    );

    Harness {
        orchestrator,
        staging,
        dir: options.dir,
    }
}

pub fn upload(staging: &UploadStagingArea, name: &str, transcript: &str) {
    staging.accept(name, transcript.as_bytes()).unwrap();
}
