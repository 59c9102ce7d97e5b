//! Recording sources: cloud recordings from Daily, or staged uploads.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempPath;
use tracing::{debug, info, warn};

use crate::daily::{DailyClient, Recording};
use crate::media;
use crate::transcription::MediaRef;
use crate::uploads::{UploadRecord, UploadStagingArea};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingOrigin {
    Cloud,
    Upload,
}

impl RecordingOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cloud => "cloud",
            Self::Upload => "upload",
        }
    }

    /// Accepts the names used by the HTTP surface and the CLI.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cloud" | "daily" => Some(Self::Cloud),
            "upload" | "uploads" => Some(Self::Upload),
            _ => None,
        }
    }
}

/// Parameters for listing a source. Only meaningful for `Cloud`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceParams {
    /// `None` means every room.
    pub room_name: Option<String>,
    pub max_recordings: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceHandle {
    Cloud { recording_id: String },
    Upload(UploadRecord),
}

/// A recording discovered by a source, not yet fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingDescriptor {
    pub identity: String,
    pub origin: RecordingOrigin,
    pub title: String,
    pub recorded_at: Option<DateTime<Utc>>,
    pub handle: SourceHandle,
}

/// Media ready to hand to a transcriber. Downloaded files are removed on drop.
#[derive(Debug)]
pub struct StagedMedia {
    pub media: MediaRef,
    _download: Option<TempPath>,
}

impl StagedMedia {
    pub fn new(media: MediaRef) -> Self {
        Self {
            media,
            _download: None,
        }
    }

    fn downloaded(path: TempPath) -> Self {
        Self {
            media: MediaRef::LocalFile(path.to_path_buf()),
            _download: Some(path),
        }
    }
}

#[async_trait]
pub trait RecordingSource: Send + Sync {
    fn origin(&self) -> RecordingOrigin;

    async fn list(&self, params: &SourceParams) -> Result<Vec<RecordingDescriptor>>;

    /// Resolve the media for one recording, downloading it when the
    /// transcriber needs a local file.
    async fn stage(&self, recording: &RecordingDescriptor, requires_local: bool) -> Result<StagedMedia>;

    /// Called once a recording is in the index (or was already there).
    async fn complete(&self, _recording: &RecordingDescriptor) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Cloud recordings
// ============================================================================

/// The cloud recording API as seen by [`CloudSource`].
#[async_trait]
pub trait RecordingCatalog: Send + Sync {
    async fn fetch_recordings(&self, room_name: Option<&str>, limit: usize) -> Result<Vec<Recording>>;

    async fn access_link(&self, recording_id: &str) -> Result<String>;
}

#[async_trait]
impl RecordingCatalog for DailyClient {
    async fn fetch_recordings(&self, room_name: Option<&str>, limit: usize) -> Result<Vec<Recording>> {
        DailyClient::fetch_recordings(self, room_name, limit).await
    }

    async fn access_link(&self, recording_id: &str) -> Result<String> {
        self.get_access_link(recording_id).await
    }
}

pub struct CloudSource {
    catalog: Arc<dyn RecordingCatalog>,
    http: reqwest::Client,
    staging_dir: PathBuf,
    download_timeout: Duration,
}

impl CloudSource {
    pub fn new(catalog: Arc<dyn RecordingCatalog>, staging_dir: PathBuf, download_timeout: Duration) -> Self {
        Self {
            catalog,
            http: reqwest::Client::new(),
            staging_dir,
            download_timeout,
        }
    }
}

#[async_trait]
impl RecordingSource for CloudSource {
    fn origin(&self) -> RecordingOrigin {
        RecordingOrigin::Cloud
    }

    async fn list(&self, params: &SourceParams) -> Result<Vec<RecordingDescriptor>> {
        if params.max_recordings == 0 {
            bail!("max_recordings must be a positive integer");
        }

        let room = params.room_name.as_deref();
        let mut recordings = self
            .catalog
            .fetch_recordings(room, params.max_recordings)
            .await?;
        let fetched = recordings.len();

        // The provider is asked to filter and limit, but is not trusted to
        if let Some(room) = room {
            recordings.retain(|r| r.room_name == room);
        }
        recordings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recordings.truncate(params.max_recordings);

        info!(
            "Cloud source listed {} recordings ({} returned by provider)",
            recordings.len(),
            fetched
        );

        Ok(recordings
            .into_iter()
            .map(|r| RecordingDescriptor {
                title: format!("{} {}", r.room_name, r.timestamp.format("%Y-%m-%d %H:%M")),
                identity: r.id.clone(),
                origin: RecordingOrigin::Cloud,
                recorded_at: Some(r.timestamp),
                handle: SourceHandle::Cloud { recording_id: r.id },
            })
            .collect())
    }

    async fn stage(&self, recording: &RecordingDescriptor, requires_local: bool) -> Result<StagedMedia> {
        let SourceHandle::Cloud { recording_id } = &recording.handle else {
            bail!("{} is not a cloud recording", recording.identity);
        };

        let link = self.catalog.access_link(recording_id).await?;
        if !requires_local {
            return Ok(StagedMedia::new(MediaRef::RemoteUrl(link)));
        }

        std::fs::create_dir_all(&self.staging_dir)
            .with_context(|| format!("Failed to create staging directory {:?}", self.staging_dir))?;
        let file = tempfile::Builder::new()
            .prefix(&format!("{}-", recording_id))
            .suffix(".mp4")
            .tempfile_in(&self.staging_dir)
            .context("Failed to create staging file")?;
        let path = file.into_temp_path();

        media::download_to(&self.http, &link, &path, self.download_timeout).await?;
        Ok(StagedMedia::downloaded(path))
    }
}

// ============================================================================
// Uploads
// ============================================================================

pub struct UploadSource {
    staging: UploadStagingArea,
}

impl UploadSource {
    pub fn new(staging: UploadStagingArea) -> Self {
        Self { staging }
    }
}

#[async_trait]
impl RecordingSource for UploadSource {
    fn origin(&self) -> RecordingOrigin {
        RecordingOrigin::Upload
    }

    async fn list(&self, _params: &SourceParams) -> Result<Vec<RecordingDescriptor>> {
        let staging = self.staging.clone();
        let records = tokio::task::spawn_blocking(move || staging.snapshot())
            .await
            .context("Upload snapshot task failed")??;

        debug!("Upload source snapshot has {} files", records.len());
        Ok(records
            .into_iter()
            .map(|record| RecordingDescriptor {
                identity: record.identity.clone(),
                origin: RecordingOrigin::Upload,
                title: record.original_filename.clone(),
                recorded_at: Some(record.received_at),
                handle: SourceHandle::Upload(record),
            })
            .collect())
    }

    async fn stage(&self, recording: &RecordingDescriptor, _requires_local: bool) -> Result<StagedMedia> {
        let SourceHandle::Upload(record) = &recording.handle else {
            bail!("{} is not an upload", recording.identity);
        };

        if !tokio::fs::try_exists(&record.staged_path).await.unwrap_or(false) {
            bail!("Staged file {:?} is missing", record.staged_path);
        }
        Ok(StagedMedia::new(MediaRef::LocalFile(record.staged_path.clone())))
    }

    async fn complete(&self, recording: &RecordingDescriptor) -> Result<()> {
        let SourceHandle::Upload(record) = &recording.handle else {
            return Ok(());
        };

        let staging = self.staging.clone();
        let record = record.clone();
        let removed = tokio::task::spawn_blocking(move || staging.remove_if_current(&record))
            .await
            .context("Upload removal task failed")??;
        if !removed {
            warn!(
                "Upload {} was replaced during indexing; keeping the newer file",
                recording.identity
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct FakeCatalog {
        recordings: Vec<Recording>,
    }

    #[async_trait]
    impl RecordingCatalog for FakeCatalog {
        async fn fetch_recordings(&self, _room: Option<&str>, _limit: usize) -> Result<Vec<Recording>> {
            // Ignores the limit on purpose
            Ok(self.recordings.clone())
        }

        async fn access_link(&self, recording_id: &str) -> Result<String> {
            Ok(format!("https://cdn.example.com/{}.mp4", recording_id))
        }
    }

    fn recording(id: usize, room: &str) -> Recording {
        Recording {
            id: format!("rec-{:02}", id),
            room_name: room.to_string(),
            timestamp: Utc.timestamp_opt(1_700_000_000 + id as i64 * 60, 0).unwrap(),
        }
    }

    fn cloud_source(recordings: Vec<Recording>) -> CloudSource {
        CloudSource::new(
            Arc::new(FakeCatalog { recordings }),
            std::env::temp_dir(),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_origin_parse() {
        assert_eq!(RecordingOrigin::parse("daily"), Some(RecordingOrigin::Cloud));
        assert_eq!(RecordingOrigin::parse("Uploads"), Some(RecordingOrigin::Upload));
        assert_eq!(RecordingOrigin::parse("dropbox"), None);
    }

    #[tokio::test]
    async fn test_cloud_enforces_max_bound() {
        let source = cloud_source((0..12).map(|i| recording(i, "standup")).collect());
        let params = SourceParams {
            room_name: None,
            max_recordings: 10,
        };

        let listed = source.list(&params).await.unwrap();
        assert_eq!(listed.len(), 10);
        // Most recent first
        assert_eq!(listed[0].identity, "rec-11");
        assert_eq!(listed[9].identity, "rec-02");
    }

    #[tokio::test]
    async fn test_cloud_drops_other_rooms() {
        let source = cloud_source(vec![recording(1, "standup"), recording(2, "retro")]);
        let params = SourceParams {
            room_name: Some("retro".to_string()),
            max_recordings: 10,
        };

        let listed = source.list(&params).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].identity, "rec-02");
    }

    #[tokio::test]
    async fn test_cloud_rejects_zero_max() {
        let source = cloud_source(vec![recording(1, "standup")]);
        assert!(source.list(&SourceParams::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_cloud_stage_passes_url_to_remote_backend() {
        let source = cloud_source(vec![recording(1, "standup")]);
        let params = SourceParams {
            room_name: None,
            max_recordings: 1,
        };
        let listed = source.list(&params).await.unwrap();

        let staged = source.stage(&listed[0], false).await.unwrap();
        assert_eq!(
            staged.media,
            MediaRef::RemoteUrl("https://cdn.example.com/rec-01.mp4".to_string())
        );
    }

    #[tokio::test]
    async fn test_upload_source_lists_and_completes() {
        let dir = tempfile::tempdir().unwrap();
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let staging =
            UploadStagingArea::with_connection(conn, dir.path().join("uploads"), 1024).unwrap();
        staging.accept("kickoff.mp4", b"bytes").unwrap();

        let source = UploadSource::new(staging.clone());
        let listed = source.list(&SourceParams::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].origin, RecordingOrigin::Upload);

        let staged = source.stage(&listed[0], true).await.unwrap();
        assert!(staged.media.local_path().is_some());

        source.complete(&listed[0]).await.unwrap();
        assert_eq!(staging.count().unwrap(), 0);
    }
}
