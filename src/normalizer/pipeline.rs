use anyhow::Result;
use tracing::debug;

use crate::normalizer::{FillerWordFilter, TranscriptionNormalizer};

/// Backend-specific cleanup followed by the shared filler-word filter.
pub struct Normalizer {
    backend: Box<dyn TranscriptionNormalizer>,
    filler: FillerWordFilter,
}

impl Normalizer {
    pub fn new(backend: Box<dyn TranscriptionNormalizer>) -> Result<Self> {
        Ok(Self {
            backend,
            filler: FillerWordFilter::new()?,
        })
    }

    /// Run the full normalization chain on a raw transcript
    pub fn run(&self, raw_output: &str) -> String {
        debug!("Running {} then {}", self.backend.name(), self.filler.name());
        let cleaned = self.backend.normalize(raw_output);
        self.filler.normalize(&cleaned)
    }
}
