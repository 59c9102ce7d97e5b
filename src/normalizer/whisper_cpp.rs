use anyhow::Result;
use regex::Regex;
use tracing::debug;

use crate::normalizer::TranscriptionNormalizer;

/// Segment timestamps, with either `.` or `:` before the milliseconds.
const SEGMENT_TIMESTAMP: &str =
    r"\[\d{2}:\d{2}:\d{2}[:.]\d{3}\s*-->\s*\d{2}:\d{2}:\d{2}[:.]\d{3}\]";
/// `[BLANK_AUDIO]`, `[MUSIC]`, `(applause)` and similar.
const NON_SPEECH: &str = r"\[[A-Z_ ]+\]|\((?i:music|applause|laughter|silence|inaudible)\)";

/// Turns whisper.cpp segment output into one line of prose.
pub struct WhisperCppNormalizer {
    segment_noise: Regex,
}

impl WhisperCppNormalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            segment_noise: Regex::new(&format!("{}|{}", SEGMENT_TIMESTAMP, NON_SPEECH))?,
        })
    }
}

impl TranscriptionNormalizer for WhisperCppNormalizer {
    fn normalize(&self, raw_output: &str) -> String {
        let speech: Vec<String> = raw_output
            .lines()
            .map(|segment| self.segment_noise.replace_all(segment, " "))
            .flat_map(|segment| {
                segment
                    .split_whitespace()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();

        debug!(
            "whisper.cpp output: {} segments, {} words kept",
            raw_output.lines().count(),
            speech.len()
        );
        speech.join(" ")
    }

    fn name(&self) -> &'static str {
        "WhisperCppNormalizer"
    }
}
