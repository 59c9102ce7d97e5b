use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, error, info};

use super::{MediaRef, TranscriptionProvider};
use crate::media;
use crate::normalizer::{PlainTextNormalizer, TranscriptionNormalizer};

const DEFAULT_ENDPOINT: &str = "https://api.deepgram.com/v1/listen";
const DEFAULT_MODEL: &str = "nova";

#[derive(Debug, Serialize)]
struct UrlSource<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: Option<ListenResults>,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    #[serde(default)]
    channels: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    err_msg: Option<String>,
    reason: Option<String>,
}

/// Remote Deepgram backend. Accepts either a URL Deepgram can fetch or
/// the bytes of a local file.
pub struct DeepgramProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
    model: String,
    request_timeout: Option<Duration>,
}

impl DeepgramProvider {
    pub fn new(api_key: Option<String>, endpoint: Option<String>, model: Option<String>) -> Result<Self> {
        let client = reqwest::Client::new();
        let endpoint = endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());

        info!(
            "Initialized Deepgram provider with endpoint: {} (model {})",
            endpoint, model
        );

        Ok(Self {
            client,
            api_key,
            endpoint,
            model,
            request_timeout: None,
        })
    }

    /// Bound each listen request, including the upload of local media.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Deepgram HTTP client")?;
        self.request_timeout = Some(timeout);
        Ok(self)
    }

    fn listen_url(&self, language: &str) -> String {
        let mut url = format!("{}?model={}&filler_words=true", self.endpoint, self.model);
        if !language.is_empty() && language != "auto" {
            url.push_str("&language=");
            url.push_str(language);
        }
        url
    }
}

/// Pulls the first alternative of the first channel; no speech is `""`.
fn extract_transcript(response: ListenResponse) -> String {
    response
        .results
        .and_then(|results| results.channels.into_iter().next())
        .and_then(|channel| channel.alternatives.into_iter().next())
        .map(|alt| alt.transcript)
        .unwrap_or_default()
}

impl TranscriptionProvider for DeepgramProvider {
    fn name(&self) -> &'static str {
        "Deepgram API"
    }

    fn is_available(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.is_empty())
    }

    fn requires_local_audio(&self) -> bool {
        false
    }

    fn transcribe<'a>(
        &'a self,
        media_ref: &'a MediaRef,
        language: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let api_key = self
                .api_key
                .as_deref()
                .context("api_key is required for Deepgram provider")?;

            let request = self
                .client
                .post(self.listen_url(language))
                .header("Authorization", format!("Token {}", api_key));

            let request = match media_ref {
                MediaRef::RemoteUrl(url) => {
                    debug!("Sending recording URL to Deepgram");
                    request.json(&UrlSource { url })
                }
                MediaRef::LocalFile(path) => {
                    info!("Uploading {:?} to Deepgram", path);
                    let bytes = tokio::fs::read(path)
                        .await
                        .with_context(|| format!("Failed to read {:?}", path))?;
                    request
                        .header("Content-Type", media::mime_type_for(path))
                        .body(bytes)
                }
            };

            let response = request
                .send()
                .await
                .context("Failed to send request to Deepgram")?;

            let status = response.status();
            let response_text = response
                .text()
                .await
                .context("Failed to read Deepgram response body")?;

            if !status.is_success() {
                error!(
                    "Deepgram request failed with status {}: {}",
                    status, response_text
                );

                if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&response_text) {
                    if let Some(message) = error_response.err_msg.or(error_response.reason) {
                        return Err(anyhow::anyhow!("Deepgram API error: {}", message));
                    }
                }

                return Err(anyhow::anyhow!(
                    "Deepgram request failed with status {}: {}",
                    status,
                    response_text
                ));
            }

            let parsed: ListenResponse =
                serde_json::from_str(&response_text).context("Failed to parse Deepgram response")?;
            let text = extract_transcript(parsed);

            debug!("Deepgram transcript: {} chars", text.len());
            Ok(text)
        })
    }

    fn normalizer(&self) -> Result<Box<dyn TranscriptionNormalizer>> {
        Ok(Box::new(PlainTextNormalizer::new()))
    }
}
