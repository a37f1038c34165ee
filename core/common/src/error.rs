//! Common error types for jsonloc.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for location and sync operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested location key does not resolve in the registry.
    #[error("Location not found: {0}")]
    LocationNotFound(String),

    /// No location was chosen for a document.
    #[error("No location chosen for document")]
    NoLocation,

    /// Target directory exists but cannot be written.
    #[error("Not writable: {}", .0.display())]
    NotWritable(PathBuf),

    /// A file copy or removal failed.
    #[error("Copy failed: {0}")]
    CopyFailed(String),

    /// Expected module subdirectory is absent.
    #[error("Directory missing: {}", .0.display())]
    DirectoryMissing(PathBuf),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
