//! Sentence-aware transcript chunker.
//!
//! Sentences are packed into chunks of at most `max_words` words. A single
//! sentence longer than that is split on word boundaries. Each chunk
//! carries a SHA-256 of its text.

use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub index: usize,
    pub content: String,
    pub hash: String,
}

/// Empty or whitespace-only text yields no chunks.
pub fn chunk_text(text: &str, max_words: usize) -> Vec<TextChunk> {
    let max_words = max_words.max(1);
    let mut pieces: Vec<String> = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();

    for sentence in split_sentences(text) {
        let words: Vec<&str> = sentence.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }

        if buffer.len() + words.len() > max_words && !buffer.is_empty() {
            pieces.push(buffer.join(" "));
            buffer.clear();
        }

        if words.len() > max_words {
            for window in words.chunks(max_words) {
                pieces.push(window.join(" "));
            }
            continue;
        }

        buffer.extend(words);
    }

    if !buffer.is_empty() {
        pieces.push(buffer.join(" "));
    }

    pieces
        .into_iter()
        .enumerate()
        .map(|(index, content)| TextChunk {
            index,
            hash: content_hash(&content),
            content,
        })
        .collect()
}

/// Splits after `.`, `!` or `?` followed by whitespace, keeping the mark.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let end = i + c.len_utf8();
            if chars.peek().map_or(true, |(_, next)| next.is_whitespace()) {
                sentences.push(&text[start..end]);
                start = end;
            }
        }
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
