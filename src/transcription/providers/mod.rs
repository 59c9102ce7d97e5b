use anyhow::Result;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::normalizer::TranscriptionNormalizer;

pub mod deepgram_api;
pub mod whisper_cpp;

pub use deepgram_api::DeepgramProvider;
pub use whisper_cpp::WhisperCppProvider;

/// Where the media for one recording can be read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRef {
    LocalFile(PathBuf),
    RemoteUrl(String),
}

impl MediaRef {
    pub fn local_path(&self) -> Option<&PathBuf> {
        match self {
            MediaRef::LocalFile(path) => Some(path),
            MediaRef::RemoteUrl(_) => None,
        }
    }
}

pub trait TranscriptionProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool;

    /// Whether `transcribe` needs a `MediaRef::LocalFile`.
    fn requires_local_audio(&self) -> bool;

    /// Empty or silent audio resolves to `Ok("")`, not an error.
    fn transcribe<'a>(
        &'a self,
        media: &'a MediaRef,
        language: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

    fn normalizer(&self) -> Result<Box<dyn TranscriptionNormalizer>>;
}
