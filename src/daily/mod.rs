//! Daily REST API client for listing cloud recordings.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::DailyConfig;

/// One finished cloud recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    pub id: String,
    pub room_name: String,
    /// When the recording finished (`start_ts + duration`).
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RecordingsPage {
    #[serde(default)]
    data: Vec<RawRecording>,
}

#[derive(Debug, Deserialize)]
struct RawRecording {
    id: String,
    room_name: String,
    start_ts: i64,
    #[serde(default)]
    duration: i64,
}

#[derive(Debug, Deserialize)]
struct AccessLink {
    download_link: String,
}

impl RawRecording {
    fn into_recording(self) -> Result<Recording> {
        let started = DateTime::<Utc>::from_timestamp(self.start_ts, 0)
            .with_context(|| format!("Invalid start_ts {} for recording {}", self.start_ts, self.id))?;
        Ok(Recording {
            id: self.id,
            room_name: self.room_name,
            timestamp: started + ChronoDuration::seconds(self.duration),
        })
    }
}

pub struct DailyClient {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    timeout: Duration,
}

impl DailyClient {
    pub fn new(api_key: String, api_url: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &DailyConfig) -> Option<Self> {
        let api_key = config.api_key.clone().filter(|key| !key.trim().is_empty())?;
        info!("Daily recordings enabled via {}", config.api_url);
        Some(Self::new(
            api_key,
            config.api_url.clone(),
            Duration::from_secs(config.request_timeout_seconds),
        ))
    }

    pub async fn fetch_recordings(
        &self,
        room_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Recording>> {
        let url = format!("{}/recordings", self.api_url);

        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(room) = room_name {
            params.push(("room_name", room.to_string()));
        }
        if limit > 0 {
            params.push(("limit", limit.to_string()));
        }

        debug!("Daily query url: {} {:?}", url, params);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&params)
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to fetch Daily recordings")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read Daily recordings response")?;

        if !status.is_success() {
            error!("Daily recordings request failed with status {}: {}", status, body);
            bail!("Failed to fetch recordings; return code {}; {}", status, body);
        }

        let page: RecordingsPage =
            serde_json::from_str(&body).context("Failed to parse Daily recordings response")?;

        page.data
            .into_iter()
            .map(RawRecording::into_recording)
            .collect()
    }

    pub async fn get_access_link(&self, recording_id: &str) -> Result<String> {
        let url = format!("{}/recordings/{}/access-link", self.api_url, recording_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to request recording access link")?;

        let status = response.status();
        if !status.is_success() {
            bail!("Failed to get recording access link; return code {}", status);
        }

        let link: AccessLink = response
            .json()
            .await
            .context("Failed to parse access link response")?;
        Ok(link.download_link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recordings_page() {
        let body = r#"{
            "total_count": 2,
            "data": [
                {"id": "rec-1", "room_name": "standup", "start_ts": 1700000000, "duration": 600, "status": "finished"},
                {"id": "rec-2", "room_name": "retro", "start_ts": 1700003600}
            ]
        }"#;
        let page: RecordingsPage = serde_json::from_str(body).unwrap();
        let recordings: Vec<Recording> = page
            .data
            .into_iter()
            .map(|r| r.into_recording().unwrap())
            .collect();

        assert_eq!(recordings.len(), 2);
        assert_eq!(recordings[0].id, "rec-1");
        assert_eq!(recordings[0].timestamp.timestamp(), 1_700_000_600);
        assert_eq!(recordings[1].timestamp.timestamp(), 1_700_003_600);
    }

    #[test]
    fn test_from_config_requires_key() {
        let mut config = DailyConfig::default();
        assert!(DailyClient::from_config(&config).is_none());

        config.api_key = Some("   ".to_string());
        assert!(DailyClient::from_config(&config).is_none());

        config.api_key = Some("secret".to_string());
        assert!(DailyClient::from_config(&config).is_some());
    }

    #[test]
    fn test_api_url_trailing_slash_trimmed() {
        let client = DailyClient::new(
            "k".to_string(),
            "https://api.daily.co/v1/".to_string(),
            Duration::from_secs(5),
        );
        assert_eq!(client.api_url, "https://api.daily.co/v1");
    }
}
