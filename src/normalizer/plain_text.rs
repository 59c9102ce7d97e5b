use crate::normalizer::TranscriptionNormalizer;

/// Normalizer for API backends that already return clean prose
pub struct PlainTextNormalizer;

impl Default for PlainTextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PlainTextNormalizer {
    pub fn new() -> Self {
        Self
    }
}

impl TranscriptionNormalizer for PlainTextNormalizer {
    fn normalize(&self, raw_output: &str) -> String {
        raw_output.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn name(&self) -> &'static str {
        "PlainTextNormalizer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_normalizer() {
        let normalizer = PlainTextNormalizer::new();

        let input = "  This is   clean\ntext  ";
        let expected = "This is clean text";

        assert_eq!(normalizer.normalize(input), expected);
    }

    #[test]
    fn test_plain_text_normalizer_empty() {
        assert_eq!(PlainTextNormalizer::new().normalize("   \n "), "");
    }
}
