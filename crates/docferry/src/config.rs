//! Upload configuration
//!
//! Every option the pipeline recognises lives in [`UploadConfig`]. The CLI
//! fills it from flags and `DOCFERRY_*` environment variables; tests build it
//! with [`UploadConfig::new`] and override fields directly.

use crate::error::{Result, UploadError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Document service base URL when not given on the command line.
pub const DEFAULT_API_URL: &str = "https://api.www.documentcloud.org/api";

/// Column holding the stable item identifier.
pub const DEFAULT_ID_COLUMN: &str = "document_number";

/// Column holding the human-readable title.
pub const DEFAULT_TITLE_COLUMN: &str = "title";

/// Extension appended to the lowercased identifier to find the local file.
pub const DEFAULT_FILE_EXTENSION: &str = "pdf";

/// Ledger database created next to the working directory by default.
pub const DEFAULT_LEDGER_PATH: &str = "docferry.db";

/// The bulk endpoints accept at most this many documents per call.
pub const MAX_BATCH_SIZE: usize = 25;

/// Upload bandwidth, not CPU, bounds useful parallelism.
pub const MAX_WORKERS: usize = 4;

/// Visibility of created documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    Public,
    Private,
    Organization,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Public => "public",
            AccessLevel::Private => "private",
            AccessLevel::Organization => "organization",
        }
    }
}

impl std::str::FromStr for AccessLevel {
    type Err = UploadError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(AccessLevel::Public),
            "private" => Ok(AccessLevel::Private),
            "organization" | "org" => Ok(AccessLevel::Organization),
            other => Err(UploadError::config(format!(
                "unknown access level '{}', expected public, private or organization",
                other
            ))),
        }
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed parameters applied to every upload request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSettings {
    pub project_id: u64,
    pub access: AccessLevel,
    pub source: String,
    pub files_root: PathBuf,
    pub file_extension: String,
    /// Defer search indexing on the remote side; much cheaper for bulk loads
    pub delayed_index: bool,
}

impl UploadSettings {
    /// Local file for an identifier: `<root>/<lowercased id>.<ext>`
    pub fn file_path(&self, identifier: &str) -> PathBuf {
        self.files_root
            .join(format!("{}.{}", identifier.to_lowercase(), self.file_extension))
    }
}

/// Documents per service call must stay within what the service accepts
pub fn check_batch_size(batch_size: usize) -> Result<()> {
    if !(1..=MAX_BATCH_SIZE).contains(&batch_size) {
        return Err(UploadError::config(format!(
            "batch size must be between 1 and {}, got {}",
            MAX_BATCH_SIZE, batch_size
        )));
    }
    Ok(())
}

/// Everything a single `upload` or `reconcile` run needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Destination project (container) id
    pub project_id: u64,

    /// Directory holding one file per item
    pub files_root: PathBuf,

    /// CSV file with one row per item
    pub metadata_path: PathBuf,

    pub id_column: String,

    pub title_column: String,

    pub file_extension: String,

    pub workers: usize,

    pub batch_size: usize,

    /// Stop enqueuing after this many items
    #[serde(default)]
    pub max_items: Option<usize>,

    pub ledger_path: PathBuf,

    pub access: AccessLevel,

    /// Source label attached to every created document
    pub source: String,
}

impl UploadConfig {
    /// Config with every optional setting at its default
    pub fn new(
        project_id: u64,
        files_root: impl Into<PathBuf>,
        metadata_path: impl Into<PathBuf>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            project_id,
            files_root: files_root.into(),
            metadata_path: metadata_path.into(),
            id_column: DEFAULT_ID_COLUMN.to_string(),
            title_column: DEFAULT_TITLE_COLUMN.to_string(),
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
            workers: 1,
            batch_size: MAX_BATCH_SIZE,
            max_items: None,
            ledger_path: PathBuf::from(DEFAULT_LEDGER_PATH),
            access: AccessLevel::default(),
            source: source.into(),
        }
    }

    /// Check ranges and paths before any work starts
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_WORKERS).contains(&self.workers) {
            return Err(UploadError::config(format!(
                "worker count must be between 1 and {}, got {}",
                MAX_WORKERS, self.workers
            )));
        }

        check_batch_size(self.batch_size)?;

        if self.max_items == Some(0) {
            return Err(UploadError::config("max items must be at least 1 when set"));
        }

        if self.source.trim().is_empty() {
            return Err(UploadError::config("source label must not be empty"));
        }

        if self.id_column == self.title_column {
            return Err(UploadError::config(
                "identifier and title columns must be different",
            ));
        }

        if !self.metadata_path.is_file() {
            return Err(UploadError::config(format!(
                "metadata file '{}' does not exist",
                self.metadata_path.display()
            )));
        }

        if !self.files_root.is_dir() {
            return Err(UploadError::config(format!(
                "files root '{}' is not a directory",
                self.files_root.display()
            )));
        }

        Ok(())
    }

    /// Queue capacity: two batches of slack per worker
    pub fn queue_capacity(&self) -> usize {
        self.workers * self.batch_size * 2
    }

    pub fn upload_settings(&self) -> UploadSettings {
        UploadSettings {
            project_id: self.project_id,
            access: self.access,
            source: self.source.clone(),
            files_root: self.files_root.clone(),
            file_extension: self.file_extension.clone(),
            delayed_index: true,
        }
    }
}
