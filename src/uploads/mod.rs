//! Durable staging of uploaded recordings awaiting indexing.
//!
//! Files live under `<data_dir>/uploads` as `{upload_id}_{filename}`; the
//! `uploads` table is the source of truth for what is pending. All table
//! access goes through one guarded connection so an indexing job draining
//! the set and new uploads arriving never interleave mid-operation.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{self, UploadRepository, UploadRow};
use crate::index::IndexError;
use crate::media;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadRecord {
    /// File stem of the uploaded name; re-uploading the same name replaces it.
    pub identity: String,
    pub upload_id: String,
    pub original_filename: String,
    pub size_bytes: u64,
    pub received_at: DateTime<Utc>,
    pub staged_path: PathBuf,
}

impl UploadRecord {
    fn from_row(row: UploadRow) -> Result<Self> {
        let received_at = DateTime::parse_from_rfc3339(&row.received_at)
            .with_context(|| format!("Invalid received_at for upload {}", row.identity))?
            .with_timezone(&Utc);
        Ok(Self {
            identity: row.identity,
            upload_id: row.upload_id,
            original_filename: row.original_filename,
            size_bytes: row.size_bytes.max(0) as u64,
            received_at,
            staged_path: PathBuf::from(row.staged_path),
        })
    }

    fn to_row(&self) -> UploadRow {
        UploadRow {
            identity: self.identity.clone(),
            upload_id: self.upload_id.clone(),
            original_filename: self.original_filename.clone(),
            size_bytes: self.size_bytes as i64,
            received_at: self.received_at.to_rfc3339(),
            staged_path: self.staged_path.to_string_lossy().to_string(),
        }
    }
}

#[derive(Clone)]
pub struct UploadStagingArea {
    conn: Arc<Mutex<Connection>>,
    dir: PathBuf,
    max_upload_bytes: u64,
}

impl UploadStagingArea {
    pub fn open(db_path: &Path, dir: PathBuf, max_upload_bytes: u64) -> Result<Self> {
        let conn = db::open(db_path)?;
        Self::with_connection(conn, dir, max_upload_bytes)
    }

    pub fn with_connection(conn: Connection, dir: PathBuf, max_upload_bytes: u64) -> Result<Self> {
        db::migrate(&conn)?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create upload directory {:?}", dir))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dir,
            max_upload_bytes,
        })
    }

    /// Listing-only view; `accept` and `remove_if_current` fail through it.
    pub fn open_read_only(db_path: &Path, dir: PathBuf, max_upload_bytes: u64) -> Result<Self> {
        let conn = db::open_reader(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dir,
            max_upload_bytes,
        })
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Upload store lock poisoned"))
    }

    /// Type and size checks; touches no shared state.
    pub fn validate(&self, original_filename: &str, size: u64) -> Result<String, IndexError> {
        let file_name = Path::new(original_filename)
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| IndexError::UploadRejected("missing file name".to_string()))?;

        if !media::is_supported_video(Path::new(file_name)) {
            return Err(IndexError::UploadRejected(format!(
                "unsupported file type for '{}'; only {} files are accepted",
                file_name,
                media::SUPPORTED_VIDEO_EXTENSIONS
                    .iter()
                    .map(|ext| format!(".{}", ext))
                    .collect::<Vec<_>>()
                    .join(" and ")
            )));
        }

        if size == 0 {
            return Err(IndexError::UploadRejected(format!("'{}' is empty", file_name)));
        }

        if size > self.max_upload_bytes {
            return Err(IndexError::UploadTooLarge {
                size,
                limit: self.max_upload_bytes,
            });
        }

        Ok(file_name.to_string())
    }

    /// Validate, persist the bytes and register the upload.
    pub fn accept(&self, original_filename: &str, bytes: &[u8]) -> Result<UploadRecord, IndexError> {
        let file_name = self.validate(original_filename, bytes.len() as u64)?;
        let identity = Path::new(&file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&file_name)
            .to_string();

        let upload_id = Uuid::new_v4().to_string();
        let staged_path = self.dir.join(format!("{}_{}", upload_id, file_name));
        let partial_path = self.dir.join(format!(".{}.part", upload_id));

        write_then_rename(&partial_path, &staged_path, bytes)
            .map_err(|e| IndexError::Storage(format!("{:#}", e)))?;

        let record = UploadRecord {
            identity,
            upload_id,
            original_filename: file_name,
            size_bytes: bytes.len() as u64,
            received_at: Utc::now(),
            staged_path,
        };

        let replaced = match self.register(&record) {
            Ok(replaced) => replaced,
            Err(e) => {
                media::cleanup_temp_file(&record.staged_path);
                return Err(IndexError::Storage(format!("{:#}", e)));
            }
        };

        if let Some(previous) = replaced {
            debug!(
                "Upload {} replaces earlier upload {}",
                record.identity, previous.upload_id
            );
            if previous.staged_path != record.staged_path {
                media::cleanup_temp_file(&previous.staged_path);
            }
        }

        info!(
            "Accepted upload {} ({} bytes) as {:?}",
            record.identity, record.size_bytes, record.staged_path
        );
        Ok(record)
    }

    fn register(&self, record: &UploadRecord) -> Result<Option<UploadRecord>> {
        let conn = self.lock()?;
        UploadRepository::upsert(&conn, &record.to_row())?
            .map(UploadRecord::from_row)
            .transpose()
    }

    /// Consistent view of every pending upload at one instant.
    pub fn snapshot(&self) -> Result<Vec<UploadRecord>> {
        let rows = {
            let conn = self.lock()?;
            UploadRepository::list(&conn)?
        };
        rows.into_iter().map(UploadRecord::from_row).collect()
    }

    /// Drop `record` once indexed, unless a newer upload replaced it meanwhile.
    pub fn remove_if_current(&self, record: &UploadRecord) -> Result<bool> {
        let removed = {
            let conn = self.lock()?;
            UploadRepository::delete_if_current(&conn, &record.identity, &record.upload_id)?
        };

        if removed {
            if let Err(e) = std::fs::remove_file(&record.staged_path) {
                warn!("Failed to remove staged file {:?}: {}", record.staged_path, e);
            }
            debug!("Removed upload {} from staging", record.identity);
        }
        Ok(removed)
    }

    pub fn identities(&self) -> Result<Vec<String>> {
        Ok(self
            .snapshot()?
            .into_iter()
            .map(|record| record.identity)
            .collect())
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        Ok(UploadRepository::count(&conn)?.max(0) as usize)
    }
}

fn write_then_rename(partial: &Path, dest: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(partial, bytes).with_context(|| format!("Failed to write {:?}", partial))?;
    if let Err(e) = std::fs::rename(partial, dest) {
        media::cleanup_temp_file(partial);
        return Err(e).with_context(|| format!("Failed to move upload into {:?}", dest));
    }
    Ok(())
}
