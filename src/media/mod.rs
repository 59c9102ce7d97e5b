//! Media file utilities for transcription.
//!
//! Audio extraction from uploaded or downloaded video with FFmpeg, and
//! streaming download of cloud recordings into the staging directory.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Video containers accepted for upload.
pub const SUPPORTED_VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov"];

/// Check if FFmpeg is available on the system.
pub fn check_ffmpeg_available() -> bool {
    which::which("ffmpeg").is_ok()
}

/// True when the path carries one of the supported video extensions.
pub fn is_supported_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_VIDEO_EXTENSIONS
                .iter()
                .any(|supported| supported.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// MIME type to announce when sending a local media file to an API.
pub fn mime_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("opus") | Some("ogg") => "audio/ogg",
        _ => "application/octet-stream",
    }
}

/// Extract a 16 kHz mono WAV track from a media file.
///
/// Writes into `output_dir` and returns the produced path.
pub async fn extract_audio(input: &Path, output_dir: &Path) -> Result<PathBuf> {
    if !check_ffmpeg_available() {
        bail!(
            "FFmpeg is required to extract audio but was not found.\n\
             Install FFmpeg:\n\
             - macOS: brew install ffmpeg\n\
             - Ubuntu/Debian: sudo apt install ffmpeg\n\
             - Arch: sudo pacman -S ffmpeg"
        );
    }

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("audio");
    let output = output_dir.join(format!("{}.wav", stem));

    // -vn: drop video, -ac 1: mono, -ar 16000: whisper's native rate
    let status = Command::new("ffmpeg")
        .arg("-i")
        .arg(input)
        .args(["-vn"])
        .args(["-ac", "1"])
        .args(["-ar", "16000"])
        .args(["-codec:a", "pcm_s16le"])
        .args(["-y"])
        .arg(&output)
        .kill_on_drop(true)
        .output()
        .await
        .context("Failed to run FFmpeg")?;

    if !status.status.success() {
        let stderr = String::from_utf8_lossy(&status.stderr);
        bail!("FFmpeg audio extraction failed: {}", stderr.trim());
    }

    if !output.exists() {
        bail!("FFmpeg did not produce output file");
    }

    debug!("Extracted audio {:?} -> {:?}", input, output);
    Ok(output)
}

/// Stream a remote recording to `destination`.
pub async fn download_to(
    client: &reqwest::Client,
    url: &str,
    destination: &Path,
    timeout: Duration,
) -> Result<u64> {
    info!("Downloading recording to {:?}", destination);

    let mut response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .context("Failed to request recording download")?;

    let status = response.status();
    if !status.is_success() {
        bail!("Recording download failed with status {}", status);
    }

    let mut file = tokio::fs::File::create(destination)
        .await
        .with_context(|| format!("Failed to create {:?}", destination))?;

    let mut written = 0u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .context("Failed while reading recording download")?
    {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    debug!("Downloaded {} bytes to {:?}", written, destination);
    Ok(written)
}

/// Remove a temporary file, ignoring errors.
pub fn cleanup_temp_file(path: &Path) {
    let _ = std::fs::remove_file(path);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_video_extensions() {
        assert!(is_supported_video(Path::new("/tmp/standup.mp4")));
        assert!(is_supported_video(Path::new("/tmp/STANDUP.MOV")));
        assert!(!is_supported_video(Path::new("/tmp/notes.txt")));
        assert!(!is_supported_video(Path::new("/tmp/no_extension")));
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(mime_type_for(Path::new("a.mp4")), "video/mp4");
        assert_eq!(mime_type_for(Path::new("a.WAV")), "audio/wav");
        assert_eq!(mime_type_for(Path::new("a.bin")), "application/octet-stream");
    }

    #[test]
    fn test_check_ffmpeg_available() {
        // Documents behavior only; passes with or without FFmpeg installed
        let available = check_ffmpeg_available();
        println!("FFmpeg available: {}", available);
    }

    #[tokio::test]
    async fn test_extract_audio_missing_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = extract_audio(Path::new("/nonexistent/video.mp4"), dir.path()).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_cleanup_missing_file_is_noop() {
        cleanup_temp_file(Path::new("/nonexistent/file.wav"));
    }
}
