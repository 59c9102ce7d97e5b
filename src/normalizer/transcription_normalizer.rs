/// Backend-specific cleanup applied to raw transcriber output.
pub trait TranscriptionNormalizer: Send + Sync {
    fn normalize(&self, raw_output: &str) -> String;

    /// Used in debug logs.
    fn name(&self) -> &'static str;
}
