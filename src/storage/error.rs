//! Errors specific to the KV storage layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("KV store error: {0}")]
    Kv(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Malformed key '{key}'")]
    KeyFormat { key: String },

    #[error("Corrupted record at key '{key}': {reason}")]
    Corrupted { key: String, reason: String },
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
