//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
///
/// Expected conditions (missing, expired, or corrupt entries, held locks) are
/// reported through return values. Only genuine I/O failures surface here.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
