//! End-to-end index lifecycle scenarios against fake backends.

mod common;

use anyhow::Result;
use async_trait::async_trait;
use common::{harness, upload, HarnessOptions};
use recall_index::index::{IndexError, IndexPhase, IndexRequest, RecordingOutcome};
use recall_index::source::{
    RecordingDescriptor, RecordingOrigin, RecordingSource, SourceParams, StagedMedia,
};
use recall_index::store::{InMemoryIndexStore, IndexStore, SqliteIndexStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

fn memory_options(cloud_recordings: Option<usize>) -> HarnessOptions {
    HarnessOptions {
        cloud_recordings,
        ..HarnessOptions::in_memory()
    }
}

fn cloud_request(max_recordings: usize) -> IndexRequest {
    IndexRequest {
        source: Some("cloud".to_string()),
        room_name: None,
        max_recordings: Some(max_recordings),
    }
}

fn upload_request() -> IndexRequest {
    IndexRequest {
        source: Some("upload".to_string()),
        ..IndexRequest::default()
    }
}

#[tokio::test]
async fn test_cloud_build_keeps_most_recent_recordings() {
    let store = Arc::new(InMemoryIndexStore::new());
    let h = harness(HarnessOptions {
        store: store.clone(),
        ..memory_options(Some(12))
    });
    h.orchestrator.load_existing().await.unwrap();

    let accepted = h
        .orchestrator
        .request_build_or_update(cloud_request(10))
        .await
        .unwrap();
    assert_eq!(accepted.generation, 1);
    h.orchestrator.wait_for_idle().await;

    let status = h.orchestrator.state().get().await;
    assert_eq!(status.state, IndexPhase::Ready);
    assert_eq!(status.generation, 1);
    assert!(status.message.contains("10 succeeded, 0 failed"), "{}", status.message);

    assert_eq!(store.document_count().await.unwrap(), 10);
    assert!(!store.contains("rec-0").await.unwrap());
    assert!(!store.contains("rec-1").await.unwrap());
    assert!(store.contains("rec-11").await.unwrap());

    let report = h.orchestrator.last_report().await.unwrap();
    assert_eq!(report.recordings.len(), 10);
    assert!(report.finished_at.is_some());
}

#[tokio::test]
async fn test_reindexing_same_recordings_does_not_duplicate() {
    let store = Arc::new(InMemoryIndexStore::new());
    let h = harness(HarnessOptions {
        store: store.clone(),
        ..memory_options(Some(3))
    });
    h.orchestrator.load_existing().await.unwrap();

    h.orchestrator.request_build_or_update(cloud_request(10)).await.unwrap();
    h.orchestrator.wait_for_idle().await;
    let second = h
        .orchestrator
        .request_build_or_update(cloud_request(10))
        .await
        .unwrap();
    h.orchestrator.wait_for_idle().await;

    assert_eq!(second.generation, 2);
    assert_eq!(store.document_count().await.unwrap(), 3);

    let status = h.orchestrator.state().get().await;
    assert_eq!(status.state, IndexPhase::Ready);
    assert!(status.message.contains("3 already indexed"), "{}", status.message);

    let report = h.orchestrator.last_report().await.unwrap();
    assert!(report
        .recordings
        .iter()
        .all(|r| r.outcome == RecordingOutcome::Skipped));
}

#[tokio::test]
async fn test_one_corrupt_upload_does_not_fail_the_batch() {
    let h = harness(memory_options(None));
    h.orchestrator.load_existing().await.unwrap();

    upload(&h.staging, "budget.mp4", "The budget review approved two new engineers.");
    upload(&h.staging, "launch.mov", "Marketing launch is scheduled for friday.");
    upload(&h.staging, "broken.mp4", "CORRUPT header");
    upload(&h.staging, "hiring.mp4", "Hiring pipeline has four candidates in final rounds.");
    upload(&h.staging, "infra.mp4", "The database migration finished over the weekend.");

    h.orchestrator.request_build_or_update(upload_request()).await.unwrap();
    h.orchestrator.wait_for_idle().await;

    let status = h.orchestrator.state().get().await;
    assert_eq!(status.state, IndexPhase::Ready);
    assert!(status.message.contains("4 succeeded, 1 failed"), "{}", status.message);

    // Only the failed upload stays staged for a retry
    assert_eq!(h.staging.identities().unwrap(), vec!["broken"]);

    let report = h.orchestrator.last_report().await.unwrap();
    let broken = report
        .recordings
        .iter()
        .find(|r| r.identity == "broken")
        .unwrap();
    assert_eq!(broken.outcome, RecordingOutcome::Failed);
    assert!(broken.error.as_deref().unwrap().contains("decoder error"));
}

#[tokio::test]
async fn test_all_uploads_failing_marks_index_failed() {
    let h = harness(memory_options(None));
    h.orchestrator.load_existing().await.unwrap();

    upload(&h.staging, "a.mp4", "CORRUPT one");
    upload(&h.staging, "b.mp4", "CORRUPT two");

    h.orchestrator.request_build_or_update(upload_request()).await.unwrap();
    h.orchestrator.wait_for_idle().await;

    let status = h.orchestrator.state().get().await;
    assert_eq!(status.state, IndexPhase::Failed);
    assert!(status.message.contains("0 succeeded, 2 failed"), "{}", status.message);
    assert_eq!(h.staging.count().unwrap(), 2);
}

#[tokio::test]
async fn test_query_before_first_build_is_rejected() {
    let h = harness(memory_options(None));
    h.orchestrator.load_existing().await.unwrap();

    assert_eq!(
        h.orchestrator.state().get().await.state,
        IndexPhase::Uninitialized
    );
    let err = h.orchestrator.query("what was decided?").await.unwrap_err();
    assert!(matches!(err, IndexError::QueryOnEmptyIndex));
}

#[tokio::test]
async fn test_empty_upload_batch_ends_ready() {
    let h = harness(memory_options(None));
    h.orchestrator.load_existing().await.unwrap();

    h.orchestrator.request_build_or_update(upload_request()).await.unwrap();
    h.orchestrator.wait_for_idle().await;

    let status = h.orchestrator.state().get().await;
    assert_eq!(status.state, IndexPhase::Ready);
    assert_eq!(status.message, "No new recordings to index (generation 1)");
}

#[tokio::test]
async fn test_rejected_requests() {
    let h = harness(memory_options(None));
    h.orchestrator.load_existing().await.unwrap();

    let err = h
        .orchestrator
        .request_build_or_update(cloud_request(10))
        .await
        .unwrap_err();
    assert!(matches!(err, IndexError::SourceUnavailable(_)));

    let err = h
        .orchestrator
        .request_build_or_update(IndexRequest {
            source: Some("ftp".to_string()),
            ..IndexRequest::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, IndexError::InvalidRequest(_)));

    // Rejections never start a job
    assert_eq!(h.orchestrator.state().get().await.generation, 0);
}

#[tokio::test]
async fn test_zero_max_recordings_is_rejected() {
    let h = harness(memory_options(Some(3)));
    h.orchestrator.load_existing().await.unwrap();

    let err = h
        .orchestrator
        .request_build_or_update(cloud_request(0))
        .await
        .unwrap_err();
    assert!(matches!(err, IndexError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_concurrent_request_is_rejected_not_queued() {
    let gate = Arc::new(Semaphore::new(0));
    let store = Arc::new(InMemoryIndexStore::new());
    let h = harness(HarnessOptions {
        store: store.clone(),
        gate: Some(gate.clone()),
        ..memory_options(None)
    });
    h.orchestrator.load_existing().await.unwrap();
    upload(&h.staging, "standup.mp4", "Standup covered the release checklist.");

    let first = h
        .orchestrator
        .request_build_or_update(upload_request())
        .await
        .unwrap();
    assert_eq!(h.orchestrator.state().get().await.state, IndexPhase::Updating);

    // The generation is durable before anything is merged
    assert_eq!(store.generation().await.unwrap(), first.generation);
    assert_eq!(store.document_count().await.unwrap(), 0);

    let err = h
        .orchestrator
        .request_build_or_update(upload_request())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IndexError::ConcurrentUpdateRejected { generation } if generation == first.generation
    ));

    // Nothing committed yet, so the first build is not queryable
    let err = h.orchestrator.query("release checklist").await.unwrap_err();
    assert!(matches!(err, IndexError::QueryOnEmptyIndex));

    gate.add_permits(100);
    h.orchestrator.wait_for_idle().await;

    let status = h.orchestrator.state().get().await;
    assert_eq!(status.state, IndexPhase::Ready);
    assert_eq!(status.generation, 1);
}

#[tokio::test]
async fn test_queries_during_update_see_only_committed_recordings() {
    let gate = Arc::new(Semaphore::new(1));
    let h = harness(HarnessOptions {
        gate: Some(gate.clone()),
        ..memory_options(None)
    });
    h.orchestrator.load_existing().await.unwrap();

    upload(&h.staging, "budget.mp4", "The budget review approved hiring two engineers.");
    h.orchestrator.request_build_or_update(upload_request()).await.unwrap();
    h.orchestrator.wait_for_idle().await;

    // Hold the next transcription until the query below has run
    gate.acquire().await.unwrap().forget();
    upload(&h.staging, "launch.mp4", "Marketing launch scheduled for friday morning.");
    h.orchestrator.request_build_or_update(upload_request()).await.unwrap();
    assert_eq!(h.orchestrator.state().get().await.state, IndexPhase::Updating);

    let during = h.orchestrator.query("marketing launch friday").await.unwrap();
    assert!(during.sources.iter().all(|s| s.identity != "launch"));

    let budget = h.orchestrator.query("budget review hiring").await.unwrap();
    assert_eq!(budget.sources[0].identity, "budget");

    gate.add_permits(1);
    h.orchestrator.wait_for_idle().await;

    let after = h.orchestrator.query("marketing launch friday").await.unwrap();
    assert_eq!(after.sources[0].identity, "launch");
    assert!(after.answer.contains("Marketing launch scheduled for friday morning"));
}

#[tokio::test]
async fn test_restart_reloads_persisted_index() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("index.db");

    {
        let h = harness(HarnessOptions {
            store: Arc::new(SqliteIndexStore::open(&db_path).unwrap()),
            ..HarnessOptions::in_memory()
        });
        h.orchestrator.load_existing().await.unwrap();
        upload(&h.staging, "retro.mp4", "The retro agreed to rotate the on-call schedule.");
        h.orchestrator.request_build_or_update(upload_request()).await.unwrap();
        h.orchestrator.wait_for_idle().await;
        assert_eq!(h.orchestrator.state().get().await.state, IndexPhase::Ready);
    }

    let h = harness(HarnessOptions {
        store: Arc::new(SqliteIndexStore::open(&db_path).unwrap()),
        ..HarnessOptions::in_memory()
    });
    h.orchestrator.load_existing().await.unwrap();

    let status = h.orchestrator.state().get().await;
    assert_eq!(status.state, IndexPhase::Ready);
    assert_eq!(status.message, "Index loaded and ready to query");
    assert_eq!(status.generation, 1);

    let answer = h.orchestrator.query("on-call schedule rotation").await.unwrap();
    assert_eq!(answer.sources[0].identity, "retro");

    // The next job continues the generation sequence
    let next = h
        .orchestrator
        .request_build_or_update(upload_request())
        .await
        .unwrap();
    assert_eq!(next.generation, 2);
    h.orchestrator.wait_for_idle().await;
}

#[tokio::test]
async fn test_recording_past_its_timeout_fails_alone() {
    let h = harness(HarnessOptions {
        recording_timeout: Duration::from_secs(1),
        ..memory_options(None)
    });
    h.orchestrator.load_existing().await.unwrap();

    upload(&h.staging, "budget.mp4", "The budget review approved two new engineers.");
    upload(&h.staging, "stuck.mp4", "HANG forever");
    upload(&h.staging, "launch.mp4", "Marketing launch is scheduled for friday.");

    h.orchestrator.request_build_or_update(upload_request()).await.unwrap();
    h.orchestrator.wait_for_idle().await;

    let status = h.orchestrator.state().get().await;
    assert_eq!(status.state, IndexPhase::Ready);
    assert!(status.message.contains("2 succeeded, 1 failed"), "{}", status.message);

    let report = h.orchestrator.last_report().await.unwrap();
    let stuck = report.recordings.iter().find(|r| r.identity == "stuck").unwrap();
    assert_eq!(stuck.outcome, RecordingOutcome::Failed);
    assert!(stuck.error.as_deref().unwrap().contains("timed out"));

    assert_eq!(h.staging.identities().unwrap(), vec!["stuck"]);
}

#[tokio::test]
async fn test_recording_task_panic_is_reported_as_failure() {
    let h = harness(memory_options(None));
    h.orchestrator.load_existing().await.unwrap();

    upload(&h.staging, "crash.mp4", "PANIC now");
    upload(&h.staging, "retro.mp4", "The retro agreed to rotate the on-call schedule.");

    h.orchestrator.request_build_or_update(upload_request()).await.unwrap();
    h.orchestrator.wait_for_idle().await;

    let status = h.orchestrator.state().get().await;
    assert_eq!(status.state, IndexPhase::Ready);
    assert!(status.message.contains("1 succeeded, 1 failed"), "{}", status.message);

    let report = h.orchestrator.last_report().await.unwrap();
    let crash = report.recordings.iter().find(|r| r.identity == "crash").unwrap();
    assert_eq!(crash.outcome, RecordingOutcome::Failed);
    assert_eq!(h.staging.identities().unwrap(), vec!["crash"]);
}

/// A source whose listing panics, taking the whole job body down.
struct PanickingSource;

#[async_trait]
impl RecordingSource for PanickingSource {
    fn origin(&self) -> RecordingOrigin {
        RecordingOrigin::Upload
    }

    async fn list(&self, _params: &SourceParams) -> Result<Vec<RecordingDescriptor>> {
        panic!("listing exploded");
    }

    async fn stage(&self, recording: &RecordingDescriptor, _requires_local: bool) -> Result<StagedMedia> {
        anyhow::bail!("{} cannot be staged", recording.identity)
    }
}

#[tokio::test]
async fn test_panicking_job_still_resolves_to_failed() {
    let h = harness(HarnessOptions {
        uploads_source: Some(Arc::new(PanickingSource)),
        ..memory_options(None)
    });
    h.orchestrator.load_existing().await.unwrap();

    let accepted = h
        .orchestrator
        .request_build_or_update(upload_request())
        .await
        .unwrap();
    h.orchestrator.wait_for_idle().await;

    let status = h.orchestrator.state().get().await;
    assert_eq!(status.state, IndexPhase::Failed);
    assert_eq!(status.generation, accepted.generation);
    assert!(status.message.contains("aborted unexpectedly"), "{}", status.message);

    // The lifecycle is not wedged in updating
    let next = h
        .orchestrator
        .request_build_or_update(upload_request())
        .await
        .unwrap();
    assert_eq!(next.generation, accepted.generation + 1);
    h.orchestrator.wait_for_idle().await;
}
