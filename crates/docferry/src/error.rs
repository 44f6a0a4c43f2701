//! Error types for docferry
//!
//! Remote failures are batch-scoped: they end up in the ledger and the run
//! moves on. Storage, parse and configuration failures stop the run.

use thiserror::Error;

/// Result type alias for docferry operations
pub type Result<T> = std::result::Result<T, UploadError>;

/// Error type shared by the pipeline, the ledger and the remote adapters
#[derive(Error, Debug)]
pub enum UploadError {
    /// A call to the document service or blob storage failed
    #[error("Remote call failed: {0}")]
    Remote(String),

    /// The metadata file is malformed
    #[error("Invalid metadata: {0}. Check the CSV header and the configured column names.")]
    Parse(String),

    /// The progress ledger could not be read or written
    #[error("Ledger error: {0}. Check that the ledger path is writable and not used by another tool.")]
    Storage(#[from] rusqlite::Error),

    /// File system operation failed
    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed before a response was received
    #[error("Network request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// CSV reader failed
    #[error("Failed to read metadata CSV: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding or decoding failed
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration is missing or out of range
    #[error("Configuration error: {0}")]
    Config(String),

    /// The run was interrupted before this operation started
    #[error("Operation cancelled")]
    Cancelled,

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl UploadError {
    /// Create a remote call error
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    /// Create a metadata parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Errors that must stop the whole run rather than a single batch
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            UploadError::Storage(_) | UploadError::Config(_) | UploadError::Parse(_)
        )
    }
}
