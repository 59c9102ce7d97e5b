mod filler_words;
mod pipeline;
mod plain_text;
mod transcription_normalizer;
mod whisper_cpp;

pub use filler_words::FillerWordFilter;
pub use pipeline::Normalizer;
pub use plain_text::PlainTextNormalizer;
pub use transcription_normalizer::TranscriptionNormalizer;
pub use whisper_cpp::WhisperCppNormalizer;
