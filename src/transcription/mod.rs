use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::config::TranscriptionConfig;
use crate::normalizer::Normalizer;

pub mod providers;

pub use providers::{DeepgramProvider, MediaRef, TranscriptionProvider, WhisperCppProvider};

/// The transcription backend selected at startup, plus the cleanup chain
/// that goes with it.
pub struct Transcriber {
    provider: Box<dyn TranscriptionProvider>,
    normalizer: Normalizer,
    language: String,
}

impl Transcriber {
    pub fn with_provider(provider_name: &str, config: ProviderConfig) -> Result<Self> {
        let language = config.language.clone().unwrap_or_else(|| "en".to_string());

        let provider: Box<dyn TranscriptionProvider> = match provider_name {
            "deepgram" => {
                let provider =
                    DeepgramProvider::new(config.api_key, config.api_endpoint, config.model)?;
                match config.timeout_seconds {
                    Some(seconds) => Box::new(provider.with_timeout(Duration::from_secs(seconds))?),
                    None => Box::new(provider),
                }
            }
            "whisper-cpp" => {
                let model = config.model.unwrap_or_else(|| "base".to_string());
                Box::new(WhisperCppProvider::new(
                    config.command_path,
                    model,
                    config.model_path,
                )?)
            }
            _ => bail!(
                "Unknown transcription provider '{}'. Supported providers: deepgram, whisper-cpp",
                provider_name
            ),
        };

        info!("Using {} for transcription", provider.name());

        Self::from_provider(provider, language)
    }

    /// Explicit provider, or Deepgram when a key is configured, else whisper.cpp.
    pub fn from_config(config: &TranscriptionConfig) -> Result<Self> {
        let provider_name = match config.provider.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ if config.api_key.is_some() => "deepgram",
            _ => "whisper-cpp",
        };
        Self::with_provider(provider_name, ProviderConfig::from(config))
    }

    pub fn from_provider(provider: Box<dyn TranscriptionProvider>, language: String) -> Result<Self> {
        let normalizer = Normalizer::new(provider.normalizer()?)?;
        Ok(Self {
            provider,
            normalizer,
            language,
        })
    }

    /// Raw backend output, before normalization.
    pub async fn transcribe(&self, media: &MediaRef) -> Result<String> {
        info!("Transcribing {:?} with {}", media, self.provider.name());
        self.provider.transcribe(media, &self.language).await
    }

    /// Backend cleanup followed by filler-word removal.
    pub fn clean(&self, raw: &str) -> String {
        self.normalizer.run(raw)
    }

    pub fn requires_local_audio(&self) -> bool {
        self.provider.requires_local_audio()
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_available()
    }

    pub fn name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn info(&self) -> TranscriberInfo {
        TranscriberInfo {
            provider: self.provider.name().to_string(),
            available: self.provider.is_available(),
            requires_local_audio: self.provider.requires_local_audio(),
            language: self.language.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub model: Option<String>,
    pub model_path: Option<String>,
    pub language: Option<String>,
    pub command_path: Option<String>,
    pub api_endpoint: Option<String>,
    pub api_key: Option<String>,
    /// Per-request bound for remote backends.
    pub timeout_seconds: Option<u64>,
}

impl From<&TranscriptionConfig> for ProviderConfig {
    fn from(config: &TranscriptionConfig) -> Self {
        Self {
            model: config.model.clone(),
            model_path: config.model_path.clone(),
            language: config.language.clone(),
            command_path: config.command_path.clone(),
            api_endpoint: config.api_endpoint.clone(),
            api_key: config.api_key.clone(),
            timeout_seconds: Some(config.timeout_seconds).filter(|s| *s > 0),
        }
    }
}

/// Summary of the active backend for capability reporting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranscriberInfo {
    pub provider: String,
    pub available: bool,
    pub requires_local_audio: bool,
    pub language: String,
}
