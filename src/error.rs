//! Error types for the code-graph engine.
//!
//! Structured errors via thiserror, one enum per subsystem boundary:
//! `IndexError` for indexing and query operations, `StorageError` (in
//! `storage::error`) for the KV layer.

use std::path::PathBuf;
use thiserror::Error;

use crate::storage::StorageError;

/// Main error type for indexing and query operations.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Workspace path '{path}' does not exist")]
    WorkspaceNotFound { path: PathBuf },

    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unsupported file extension '{extension}' for '{path}'")]
    UnsupportedLanguage { path: PathBuf, extension: String },

    #[error("Unsupported file type '{extension}' for file '{path}'")]
    UnsupportedFileType { path: PathBuf, extension: String },

    #[error("No index found for '{path}'. Index the workspace first.")]
    IndexNotFound { path: PathBuf },

    #[error("Missing required parameter '{name}'")]
    MissingParam { name: &'static str },

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParam { name: &'static str, reason: String },

    #[error("Code-graph indexing is disabled by configuration")]
    IndexDisabled,

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{0}")]
    General(String),
}

impl IndexError {
    /// Whether a caller may retry without changing the request.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Storage(_))
    }
}

/// Result type alias for indexing and query operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Helper trait for attaching path context to foreign errors.
pub trait ErrorContext<T> {
    fn with_path(self, path: &std::path::Path) -> IndexResult<T>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_path(self, path: &std::path::Path) -> IndexResult<T> {
        self.map_err(|e| IndexError::General(format!("error processing '{}': {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_path() {
        let err = IndexError::UnsupportedLanguage {
            path: PathBuf::from("notes.txt"),
            extension: "txt".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("notes.txt"));
        assert!(msg.contains("txt"));
    }

    #[test]
    fn test_missing_param_message() {
        let err = IndexError::MissingParam { name: "file_path" };
        assert!(err.to_string().contains("file_path"));
    }
}
