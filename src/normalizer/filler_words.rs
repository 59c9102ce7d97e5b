use anyhow::Result;
use regex::Regex;
use tracing::debug;

use crate::normalizer::TranscriptionNormalizer;

/// Hesitation sounds removed from every transcript regardless of backend.
const FILLER_PATTERN: &str = r"(?i)\b(?:u+m+|u+h+|e+r+m+|e+r+|a+h+|h+m+|m+h+m+)\b[,.]?";

/// Deterministic filler-word removal applied before embedding.
///
/// Removes hesitation tokens ("um", "uh", "erm", "hmm", ...) together with
/// a directly trailing comma or period, then repairs the spacing and
/// punctuation left behind.
pub struct FillerWordFilter {
    filler_regex: Regex,
    space_before_punct: Regex,
    repeated_commas: Regex,
}

impl FillerWordFilter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            filler_regex: Regex::new(FILLER_PATTERN)?,
            space_before_punct: Regex::new(r"\s+([,.!?;:])")?,
            repeated_commas: Regex::new(r",(\s*,)+")?,
        })
    }
}

impl TranscriptionNormalizer for FillerWordFilter {
    fn normalize(&self, raw_output: &str) -> String {
        let stripped = self.filler_regex.replace_all(raw_output, "");
        let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
        let spaced = self.space_before_punct.replace_all(&collapsed, "$1");
        let deduped = self.repeated_commas.replace_all(&spaced, ",");

        let result = deduped
            .trim_start_matches(|c: char| c == ',' || c == '.' || c.is_whitespace())
            .trim_end()
            .to_string();

        debug!(
            "Filler filter reduced {} chars to {} chars",
            raw_output.len(),
            result.len()
        );
        result
    }

    fn name(&self) -> &'static str {
        "FillerWordFilter"
    }
}
