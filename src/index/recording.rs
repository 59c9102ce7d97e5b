//! Per-recording outcomes and the report for one indexing job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::source::RecordingOrigin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingOutcome {
    Pending,
    Transcribed,
    Embedded,
    Failed,
    /// Already in the index; not re-transcribed.
    Skipped,
}

impl RecordingOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Transcribed => "transcribed",
            Self::Embedded => "embedded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Embedded | Self::Failed | Self::Skipped)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingReport {
    pub identity: String,
    pub origin: RecordingOrigin,
    pub title: String,
    pub outcome: RecordingOutcome,
    pub error: Option<String>,
    pub transcript_chars: Option<usize>,
}

impl RecordingReport {
    pub fn pending(identity: String, origin: RecordingOrigin, title: String) -> Self {
        Self {
            identity,
            origin,
            title,
            outcome: RecordingOutcome::Pending,
            error: None,
            transcript_chars: None,
        }
    }
}

/// Outcome of one build/update job, kept until the next job starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    pub generation: u64,
    pub source: RecordingOrigin,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub recordings: Vec<RecordingReport>,
}

impl JobReport {
    pub fn new(generation: u64, source: RecordingOrigin) -> Self {
        Self {
            generation,
            source,
            started_at: Utc::now(),
            finished_at: None,
            recordings: Vec::new(),
        }
    }

    fn count(&self, outcome: RecordingOutcome) -> usize {
        self.recordings
            .iter()
            .filter(|r| r.outcome == outcome)
            .count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(RecordingOutcome::Embedded)
    }

    pub fn failed(&self) -> usize {
        self.count(RecordingOutcome::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(RecordingOutcome::Skipped)
    }

    pub fn update(&mut self, identity: &str, f: impl FnOnce(&mut RecordingReport)) {
        if let Some(report) = self.recordings.iter_mut().find(|r| r.identity == identity) {
            f(report);
        }
    }

    /// Failure messages joined for the final state message.
    pub fn failure_summary(&self) -> String {
        self.recordings
            .iter()
            .filter(|r| r.outcome == RecordingOutcome::Failed)
            .map(|r| match &r.error {
                Some(error) => format!("{}: {}", r.identity, error),
                None => r.identity.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}
