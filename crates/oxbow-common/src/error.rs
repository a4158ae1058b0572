//! Error types for OxbowDB.

use thiserror::Error;

/// Result type alias using OxbowError.
pub type Result<T> = std::result::Result<T, OxbowError>;

/// Errors that can occur in OxbowDB operations.
#[derive(Debug, Error)]
pub enum OxbowError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Storage errors
    #[error("Page {page_id} out of bounds (file holds {num_pages} pages)")]
    PageOutOfBounds { page_id: u32, num_pages: u32 },

    #[error("Buffer pool full, unable to allocate frame")]
    BufferPoolFull,

    // Index errors
    #[error("Key size mismatch: expected {expected} bytes, got {actual}")]
    KeySizeMismatch { expected: usize, actual: usize },

    #[error("Invalid node type")]
    InvalidNodeType,

    #[error("B+ tree corrupted: {0}")]
    IndexCorrupted(String),

    // Configuration errors
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },
}
