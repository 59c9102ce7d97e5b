//! Build/update jobs over recordings, and queries against the result.
//!
//! Only one job runs at a time. A request that arrives while a job is in
//! flight is rejected, never queued. Each job runs in the background:
//! recordings are staged, transcribed, cleaned, chunked, embedded and then
//! merged one at a time, with at most `concurrency` recordings in progress.
//! A recording that fails is recorded in the job report and the rest of
//! the batch carries on.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::recording::{JobReport, RecordingOutcome, RecordingReport};
use super::state::{IndexPhase, IndexStateHandle};
use super::status::{Capabilities, StatusRegistry};
use super::IndexError;
use crate::config::Config;
use crate::embedding::{self, chunk_text, EmbeddingProvider};
use crate::source::{RecordingDescriptor, RecordingOrigin, RecordingSource, SourceParams};
use crate::store::{EmbeddedChunk, IndexStore, RecordingDocument};
use crate::transcription::Transcriber;
use crate::uploads::UploadStagingArea;

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub concurrency: usize,
    /// Bound on fetching and, separately, on transcribing one recording.
    pub recording_timeout: Duration,
    pub chunk_max_words: usize,
    pub query_top_k: usize,
    pub default_room: Option<String>,
    pub default_max_recordings: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for OrchestratorSettings {
    fn from(config: &Config) -> Self {
        Self {
            concurrency: config.indexing.concurrency.max(1),
            recording_timeout: Duration::from_secs(config.indexing.recording_timeout_seconds),
            chunk_max_words: config.indexing.chunk_max_words,
            query_top_k: config.indexing.query_top_k,
            default_room: config.daily.room_name.clone(),
            default_max_recordings: config.daily.max_recordings,
        }
    }
}

/// The collaborators an orchestrator drives.
pub struct IndexComponents {
    pub store: Arc<dyn IndexStore>,
    pub transcriber: Arc<Transcriber>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    /// `None` when no cloud provider is configured.
    pub cloud: Option<Arc<dyn RecordingSource>>,
    pub uploads: Arc<dyn RecordingSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexRequest {
    pub source: Option<String>,
    pub room_name: Option<String>,
    pub max_recordings: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accepted {
    pub generation: u64,
    pub source: RecordingOrigin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySource {
    pub identity: String,
    pub title: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub answer: String,
    pub sources: Vec<QuerySource>,
}

const NO_MATCH_ANSWER: &str = "No matching passages were found in the indexed recordings.";

struct Inner {
    state: IndexStateHandle,
    report: Arc<RwLock<Option<JobReport>>>,
    store: Arc<dyn IndexStore>,
    transcriber: Arc<Transcriber>,
    embedder: Arc<dyn EmbeddingProvider>,
    cloud: Option<Arc<dyn RecordingSource>>,
    uploads: Arc<dyn RecordingSource>,
    settings: OrchestratorSettings,
    job: Mutex<Option<JoinHandle<()>>>,
}

/// Owns the index lifecycle. Cheap to clone; clones share one state.
#[derive(Clone)]
pub struct IndexOrchestrator {
    inner: Arc<Inner>,
}

impl IndexOrchestrator {
    pub fn new(components: IndexComponents, settings: OrchestratorSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: IndexStateHandle::new(),
                report: Arc::new(RwLock::new(None)),
                store: components.store,
                transcriber: components.transcriber,
                embedder: components.embedder,
                cloud: components.cloud,
                uploads: components.uploads,
                settings,
                job: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> IndexStateHandle {
        self.inner.state.clone()
    }

    pub async fn last_report(&self) -> Option<JobReport> {
        self.inner.report.read().await.clone()
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            daily: self.inner.cloud.is_some(),
            transcriber: self.inner.transcriber.info(),
            embedding: embedding::describe(self.inner.embedder.as_ref()),
        }
    }

    /// Read-only view for pollers.
    pub fn status_registry(&self, uploads: UploadStagingArea) -> StatusRegistry {
        StatusRegistry::new(
            self.inner.state.clone(),
            Arc::clone(&self.inner.report),
            uploads,
            self.capabilities(),
        )
    }

    /// Seed state from the persisted store. Call once at startup.
    pub async fn load_existing(&self) -> Result<(), IndexError> {
        let count = self
            .inner
            .store
            .document_count()
            .await
            .map_err(storage_error)?;
        let generation = self.inner.store.generation().await.map_err(storage_error)?;

        if count > 0 {
            info!(
                "Loaded existing index with {} recordings (generation {})",
                count, generation
            );
            self.inner
                .state
                .restore(
                    IndexPhase::Ready,
                    "Index loaded and ready to query".to_string(),
                    generation,
                )
                .await;
        } else {
            info!("No existing index found");
            self.inner
                .state
                .restore(
                    IndexPhase::Uninitialized,
                    "No index has been built yet".to_string(),
                    generation,
                )
                .await;
        }
        Ok(())
    }

    /// Start a build/update in the background, or reject synchronously.
    pub async fn request_build_or_update(&self, request: IndexRequest) -> Result<Accepted, IndexError> {
        let source_name = request.source.as_deref().unwrap_or("cloud");
        let origin = RecordingOrigin::parse(source_name).ok_or_else(|| {
            IndexError::InvalidRequest(format!(
                "Unrecognized source: {}. Source must be 'cloud' or 'upload'",
                source_name
            ))
        })?;

        let (source, params) = match origin {
            RecordingOrigin::Cloud => {
                let source = self
                    .inner
                    .cloud
                    .clone()
                    .ok_or_else(|| IndexError::SourceUnavailable("cloud".to_string()))?;
                let max_recordings = request
                    .max_recordings
                    .unwrap_or(self.inner.settings.default_max_recordings);
                if max_recordings == 0 {
                    return Err(IndexError::InvalidRequest(
                        "max_recordings must be a positive integer".to_string(),
                    ));
                }
                let room_name = request
                    .room_name
                    .filter(|room| !room.trim().is_empty())
                    .or_else(|| self.inner.settings.default_room.clone());
                (
                    source,
                    SourceParams {
                        room_name,
                        max_recordings,
                    },
                )
            }
            RecordingOrigin::Upload => (Arc::clone(&self.inner.uploads), SourceParams::default()),
        };

        if !self.inner.transcriber.is_available() {
            return Err(IndexError::BackendUnavailable(
                self.inner.transcriber.name().to_string(),
            ));
        }

        let mut job_slot = self.inner.job.lock().await;
        let generation = self
            .inner
            .state
            .try_begin_update(format!("Fetching recordings from {} source", origin.as_str()))
            .await?;

        // Persist before any merge so a crash mid-job never reuses this number
        if let Err(e) = self.inner.store.set_generation(generation).await {
            warn!("Failed to persist generation {}: {:#}", generation, e);
        }

        info!(
            "Accepted index update from {} source (generation {})",
            origin.as_str(),
            generation
        );
        *self.inner.report.write().await = Some(JobReport::new(generation, origin));

        let inner = Arc::clone(&self.inner);
        let job = tokio::spawn(run_job(inner, generation, source, params));

        // A panicking job must still resolve the state
        let state = self.inner.state.clone();
        let supervisor = tokio::spawn(async move {
            if let Err(e) = job.await {
                error!("Indexing job for generation {} aborted: {}", generation, e);
                state
                    .finish(
                        generation,
                        IndexPhase::Failed,
                        format!("Index update aborted unexpectedly (generation {})", generation),
                    )
                    .await;
            }
        });
        *job_slot = Some(supervisor);

        Ok(Accepted {
            generation,
            source: origin,
        })
    }

    /// Wait until no job is running.
    pub async fn wait_for_idle(&self) {
        let handle = self.inner.job.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    pub async fn query(&self, text: &str) -> Result<QueryAnswer, IndexError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(IndexError::InvalidRequest("query must not be empty".to_string()));
        }

        let has_documents = self
            .inner
            .store
            .document_count()
            .await
            .map_err(storage_error)?
            > 0;
        if !self.inner.state.is_queryable(has_documents).await {
            return Err(IndexError::QueryOnEmptyIndex);
        }

        let vector = embedding::embed_query(self.inner.embedder.as_ref(), text)
            .await
            .map_err(|e| IndexError::Embedding {
                identity: "query".to_string(),
                reason: format!("{:#}", e),
            })?;

        let candidates = self
            .inner
            .store
            .search(&vector, self.inner.settings.query_top_k)
            .await
            .map_err(storage_error)?;
        let candidates: Vec<_> = candidates.into_iter().filter(|c| c.score > 0.0).collect();

        debug!("Query matched {} passages", candidates.len());

        if candidates.is_empty() {
            return Ok(QueryAnswer {
                answer: NO_MATCH_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let answer = candidates
            .iter()
            .map(|c| c.content.trim().trim_end_matches('.'))
            .collect::<Vec<_>>()
            .join(". ");

        let mut seen = HashSet::new();
        let sources = candidates
            .iter()
            .filter(|c| seen.insert(c.identity.clone()))
            .map(|c| QuerySource {
                identity: c.identity.clone(),
                title: c.title.clone(),
                score: c.score,
            })
            .collect();

        Ok(QueryAnswer {
            answer: format!("{}.", answer),
            sources,
        })
    }
}

fn storage_error(err: anyhow::Error) -> IndexError {
    IndexError::Storage(format!("{:#}", err))
}

async fn run_job(
    inner: Arc<Inner>,
    generation: u64,
    source: Arc<dyn RecordingSource>,
    params: SourceParams,
) {
    let origin = source.origin();

    let listed = match source.list(&params).await {
        Ok(listed) => listed,
        Err(e) => {
            error!("Failed to list recordings for generation {}: {:#}", generation, e);
            finish_job(
                &inner,
                generation,
                IndexPhase::Failed,
                format!(
                    "Index update failed: could not list {} recordings: {:#} (generation {})",
                    origin.as_str(),
                    e,
                    generation
                ),
            )
            .await;
            return;
        }
    };

    // One task per identity
    let mut seen = HashSet::new();
    let recordings: Vec<RecordingDescriptor> = listed
        .into_iter()
        .filter(|r| seen.insert(r.identity.clone()))
        .collect();
    let total = recordings.len();

    if let Some(report) = inner.report.write().await.as_mut() {
        report.recordings = recordings
            .iter()
            .map(|r| RecordingReport::pending(r.identity.clone(), r.origin, r.title.clone()))
            .collect();
    }

    inner
        .state
        .set_message(generation, format!("Indexing {} recordings", total))
        .await;

    let semaphore = Arc::new(Semaphore::new(inner.settings.concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for recording in recordings {
        let inner = Arc::clone(&inner);
        let source = Arc::clone(&source);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let result = process_recording(&inner, generation, source.as_ref(), &recording).await;
            (recording.identity, result)
        });
    }

    let mut done = 0usize;
    while let Some(joined) = tasks.join_next().await {
        done += 1;
        match joined {
            Ok((identity, Ok(outcome))) => {
                info!("Recording {}: {}", identity, outcome.as_str());
                record_outcome(&inner, &identity, outcome, None).await;
            }
            Ok((identity, Err(e))) => {
                if e.is_per_recording() {
                    warn!("Recording {} failed: {}", identity, e);
                } else {
                    error!("Recording {} failed: {}", identity, e);
                }
                record_outcome(&inner, &identity, RecordingOutcome::Failed, Some(e.to_string())).await;
            }
            Err(e) => {
                error!("Recording task panicked: {}", e);
            }
        }
        inner
            .state
            .set_message(generation, format!("Processed {} of {} recordings", done, total))
            .await;
    }

    // Tasks that panicked never reported back
    if let Some(report) = inner.report.write().await.as_mut() {
        for recording in report.recordings.iter_mut() {
            if !recording.outcome.is_terminal() {
                recording.outcome = RecordingOutcome::Failed;
                recording.error = Some("processing task aborted".to_string());
            }
        }
    }

    let (phase, message) = summarize(&inner, generation).await;
    match phase {
        IndexPhase::Failed => error!("{}", message),
        _ => info!("{}", message),
    }
    finish_job(&inner, generation, phase, message).await;
}

async fn summarize(inner: &Inner, generation: u64) -> (IndexPhase, String) {
    let guard = inner.report.read().await;
    let Some(report) = guard.as_ref() else {
        return (
            IndexPhase::Failed,
            format!("Index update lost its report (generation {})", generation),
        );
    };

    let succeeded = report.succeeded();
    let failed = report.failed();
    let skipped = report.skipped();

    if succeeded == 0 && failed == 0 {
        let message = if skipped > 0 {
            format!(
                "No new recordings to index; {} already indexed (generation {})",
                skipped, generation
            )
        } else {
            format!("No new recordings to index (generation {})", generation)
        };
        return (IndexPhase::Ready, message);
    }

    if succeeded > 0 {
        let mut message = format!(
            "Indexed {} of {} recordings: {} succeeded, {} failed",
            succeeded,
            succeeded + failed,
            succeeded,
            failed
        );
        if skipped > 0 {
            message.push_str(&format!(", {} already indexed", skipped));
        }
        message.push_str(&format!(" (generation {})", generation));
        return (IndexPhase::Ready, message);
    }

    (
        IndexPhase::Failed,
        format!(
            "Index update failed: 0 succeeded, {} failed (generation {}): {}",
            failed,
            generation,
            report.failure_summary()
        ),
    )
}

async fn finish_job(inner: &Inner, generation: u64, phase: IndexPhase, message: String) {
    if let Err(e) = inner.store.set_generation(generation).await {
        warn!("Failed to persist generation {}: {:#}", generation, e);
    }
    if let Some(report) = inner.report.write().await.as_mut() {
        report.finished_at = Some(Utc::now());
    }
    inner.state.finish(generation, phase, message).await;
}

async fn record_outcome(inner: &Inner, identity: &str, outcome: RecordingOutcome, error: Option<String>) {
    if let Some(report) = inner.report.write().await.as_mut() {
        report.update(identity, |r| {
            r.outcome = outcome;
            r.error = error;
        });
    }
}

async fn process_recording(
    inner: &Inner,
    generation: u64,
    source: &dyn RecordingSource,
    recording: &RecordingDescriptor,
) -> Result<RecordingOutcome, IndexError> {
    let identity = recording.identity.as_str();
    let timeout = inner.settings.recording_timeout;

    let already_indexed = inner
        .store
        .contains(identity)
        .await
        .map_err(|e| IndexError::Merge {
            identity: identity.to_string(),
            reason: format!("{:#}", e),
        })?;
    if already_indexed {
        debug!("{} is already indexed; skipping", identity);
        if let Err(e) = source.complete(recording).await {
            warn!("Failed to clear staged copy of {}: {:#}", identity, e);
        }
        return Ok(RecordingOutcome::Skipped);
    }

    let staged = tokio::time::timeout(
        timeout,
        source.stage(recording, inner.transcriber.requires_local_audio()),
    )
    .await
    .map_err(|_| IndexError::Timeout {
        identity: identity.to_string(),
        stage: "Fetch",
        seconds: timeout.as_secs(),
    })?
    .map_err(|e| IndexError::SourceFetch {
        identity: identity.to_string(),
        reason: format!("{:#}", e),
    })?;

    let raw = tokio::time::timeout(timeout, inner.transcriber.transcribe(&staged.media))
        .await
        .map_err(|_| IndexError::Timeout {
            identity: identity.to_string(),
            stage: "Transcription",
            seconds: timeout.as_secs(),
        })?
        .map_err(|e| IndexError::Transcription {
            identity: identity.to_string(),
            reason: format!("{:#}", e),
        })?;
    drop(staged);

    let transcript = inner.transcriber.clean(&raw);
    if let Some(report) = inner.report.write().await.as_mut() {
        report.update(identity, |r| {
            r.outcome = RecordingOutcome::Transcribed;
            r.transcript_chars = Some(transcript.len());
        });
    }

    let chunks = chunk_text(&transcript, inner.settings.chunk_max_words);
    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let vectors = if texts.is_empty() {
        Vec::new()
    } else {
        inner
            .embedder
            .embed(&texts)
            .await
            .map_err(|e| IndexError::Embedding {
                identity: identity.to_string(),
                reason: format!("{:#}", e),
            })?
    };
    if vectors.len() != chunks.len() {
        return Err(IndexError::Embedding {
            identity: identity.to_string(),
            reason: format!("expected {} vectors, got {}", chunks.len(), vectors.len()),
        });
    }

    let document = RecordingDocument {
        identity: identity.to_string(),
        origin: recording.origin,
        title: recording.title.clone(),
        transcript,
        generation,
        chunks: chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddedChunk {
                index: chunk.index,
                content: chunk.content,
                hash: chunk.hash,
                vector,
            })
            .collect(),
    };

    inner
        .store
        .merge(document)
        .await
        .map_err(|e| IndexError::Merge {
            identity: identity.to_string(),
            reason: format!("{:#}", e),
        })?;

    if let Err(e) = source.complete(recording).await {
        warn!("Indexed {} but failed to clear its staged copy: {:#}", identity, e);
    }

    Ok(RecordingOutcome::Embedded)
}
