use anyhow::{bail, Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{MediaRef, TranscriptionProvider};
use crate::media;
use crate::normalizer::{TranscriptionNormalizer, WhisperCppNormalizer};

const DEFAULT_COMMAND: &str = "whisper-cli";

/// Local whisper.cpp backend. Runs entirely on the serving machine.
pub struct WhisperCppProvider {
    command_path: PathBuf,
    model_path: PathBuf,
}

impl WhisperCppProvider {
    pub fn new(command_path: Option<String>, model: String, model_path: Option<String>) -> Result<Self> {
        let command_path = match command_path {
            Some(path) => PathBuf::from(path),
            None => which::which(DEFAULT_COMMAND).unwrap_or_else(|_| PathBuf::from(DEFAULT_COMMAND)),
        };

        let model_path = match model_path {
            Some(path) => PathBuf::from(path),
            None => crate::global::data_dir()?
                .join("models")
                .join(format!("ggml-{}.bin", model)),
        };

        if !model_path.exists() {
            warn!("whisper.cpp model not found at {:?}", model_path);
        }

        info!(
            "Initialized whisper.cpp provider: command={:?}, model={:?}",
            command_path, model_path
        );

        Ok(Self {
            command_path,
            model_path,
        })
    }

    async fn run_whisper(&self, wav_path: &Path, language: &str) -> Result<String> {
        let mut command = Command::new(&self.command_path);
        command
            .arg("-m")
            .arg(&self.model_path)
            .arg("-f")
            .arg(wav_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if !language.is_empty() {
            command.arg("-l").arg(language);
        }

        debug!("Running whisper.cpp on {:?}", wav_path);
        let output = command
            .output()
            .await
            .with_context(|| format!("Failed to run {:?}", self.command_path))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("whisper.cpp failed: {}", stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl TranscriptionProvider for WhisperCppProvider {
    fn name(&self) -> &'static str {
        "whisper.cpp"
    }

    fn is_available(&self) -> bool {
        let command_found =
            self.command_path.exists() || which::which(&self.command_path).is_ok();
        command_found && self.model_path.exists() && media::check_ffmpeg_available()
    }

    fn requires_local_audio(&self) -> bool {
        true
    }

    fn transcribe<'a>(
        &'a self,
        media_ref: &'a MediaRef,
        language: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let input = match media_ref {
                MediaRef::LocalFile(path) => path,
                MediaRef::RemoteUrl(_) => {
                    bail!("whisper.cpp requires a local media file")
                }
            };

            info!("Transcribing {:?} with whisper.cpp", input);

            // The WAV lives only as long as this call
            let scratch = tempfile::tempdir().context("Failed to create scratch directory")?;
            let wav_path = media::extract_audio(input, scratch.path()).await?;
            let raw = self.run_whisper(&wav_path, language).await?;

            debug!("Raw whisper.cpp output: {} chars", raw.len());
            Ok(raw)
        })
    }

    fn normalizer(&self) -> Result<Box<dyn TranscriptionNormalizer>> {
        Ok(Box::new(WhisperCppNormalizer::new()?))
    }
}
