/// A staged upload awaiting indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRow {
    pub identity: String,
    pub upload_id: String,
    pub original_filename: String,
    pub size_bytes: i64,
    /// RFC 3339
    pub received_at: String,
    pub staged_path: String,
}

/// One indexed recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRow {
    pub identity: String,
    pub origin: String,
    pub title: String,
    pub transcript: String,
    pub generation: i64,
}

/// A chunk to be written alongside its document.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRow {
    pub chunk_index: i64,
    pub content: String,
    pub content_hash: String,
    pub embedding: Vec<f32>,
}

/// A committed chunk joined with its document's title.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredChunk {
    pub identity: String,
    pub title: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// Encode a float vector as little-endian f32 bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
