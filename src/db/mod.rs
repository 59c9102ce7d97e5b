//! SQLite persistence for staged uploads and the vector index.
//!
//! Raw SQL with rusqlite, no ORM. Each table has a repository with
//! associated functions taking a `&Connection`.

mod documents;
mod init;
pub mod schemas;
mod uploads;

pub use documents::DocumentRepository;
pub use init::{migrate, open, open_reader};
pub use schemas::{blob_to_vec, vec_to_blob, ChunkRow, DocumentRow, StoredChunk, UploadRow};
pub use uploads::UploadRepository;
