//! docferry library
//!
//! Resumable bulk upload of a local document corpus to a remote
//! document-management service.
//!
//! # Overview
//!
//! - **Upload**: stream a metadata CSV through a bounded queue to upload
//!   workers that register, transfer and process documents in batches
//!   (`docferry upload`)
//! - **Ledger**: a SQLite progress ledger that makes every run resumable
//!   (`docferry status`, `docferry failures`)
//! - **Reconcile**: settle failures left by earlier runs against the remote
//!   search index (`docferry reconcile`)
//! - **Maintenance**: remove duplicates and empty a project
//!   (`docferry dedupe`, `docferry purge`)

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metadata;
pub mod pipeline;
pub mod progress;
pub mod reconcile;
pub mod shutdown;
pub mod upload;

// Re-export commonly used types
pub use config::{AccessLevel, UploadConfig};
pub use error::{Result, UploadError};
pub use ledger::Ledger;
pub use pipeline::{Pipeline, RunSummary};
pub use reconcile::{ReconcileReport, Reconciler, Sweep};
pub use shutdown::Shutdown;

use clap::{Args, Parser, Subcommand};
use config::{
    DEFAULT_API_URL, DEFAULT_FILE_EXTENSION, DEFAULT_ID_COLUMN, DEFAULT_LEDGER_PATH,
    DEFAULT_TITLE_COLUMN, MAX_BATCH_SIZE,
};
use std::path::{Path, PathBuf};

/// docferry - resumable bulk uploads to a document service
#[derive(Parser, Debug)]
#[command(name = "docferry")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Progress ledger database
    #[arg(long, env = "DOCFERRY_LEDGER", default_value = DEFAULT_LEDGER_PATH, global = true)]
    pub ledger: PathBuf,

    /// Document service API URL
    #[arg(long, env = "DOCFERRY_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload every item of the metadata file that is not yet completed
    Upload {
        #[command(flatten)]
        project: ProjectArgs,

        /// Parallel upload workers (1-4)
        #[arg(short, long, env = "DOCFERRY_WORKERS", default_value_t = 1)]
        workers: usize,

        /// Stop after queueing this many items
        #[arg(short, long, env = "DOCFERRY_MAX_ITEMS")]
        max_items: Option<usize>,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Settle failures left behind by earlier runs
    Reconcile {
        #[command(flatten)]
        project: ProjectArgs,

        /// Which sweep to run
        #[arg(long, value_enum, default_value = "both")]
        sweep: Sweep,
    },

    /// Show ledger totals
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List identifiers that have not completed
    Failures {
        /// Limit number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Delete duplicate remote documents, keeping one success per identifier
    Dedupe {
        /// File with one identifier per line
        #[arg(short, long)]
        input: PathBuf,

        /// Metadata key holding the identifier
        #[arg(long, env = "DOCFERRY_ID_COLUMN", default_value = DEFAULT_ID_COLUMN)]
        id_column: String,
    },

    /// Delete every document in a project
    Purge {
        /// Destination project id
        #[arg(long, env = "DOCFERRY_PROJECT_ID")]
        project_id: u64,

        /// Documents deleted per call
        #[arg(long, default_value_t = MAX_BATCH_SIZE)]
        batch_size: usize,

        /// Confirm deletion
        #[arg(short, long)]
        yes: bool,
    },
}

/// Options shared by `upload` and `reconcile`
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Destination project id
    #[arg(long, env = "DOCFERRY_PROJECT_ID")]
    pub project_id: u64,

    /// Metadata CSV, one row per item
    #[arg(long, env = "DOCFERRY_METADATA")]
    pub metadata: PathBuf,

    /// Directory holding one file per item
    #[arg(long, env = "DOCFERRY_FILES_ROOT")]
    pub files_root: PathBuf,

    /// Source label attached to every document
    #[arg(long, env = "DOCFERRY_SOURCE")]
    pub source: String,

    /// Column holding the unique identifier
    #[arg(long, env = "DOCFERRY_ID_COLUMN", default_value = DEFAULT_ID_COLUMN)]
    pub id_column: String,

    /// Column holding the document title
    #[arg(long, env = "DOCFERRY_TITLE_COLUMN", default_value = DEFAULT_TITLE_COLUMN)]
    pub title_column: String,

    /// Extension of the local files
    #[arg(long, env = "DOCFERRY_FILE_EXTENSION", default_value = DEFAULT_FILE_EXTENSION)]
    pub file_extension: String,

    /// Visibility of created documents (public, private, organization)
    #[arg(long, env = "DOCFERRY_ACCESS", default_value = "public")]
    pub access: AccessLevel,

    /// Documents per batch (1-25)
    #[arg(short, long, env = "DOCFERRY_BATCH_SIZE", default_value_t = MAX_BATCH_SIZE)]
    pub batch_size: usize,
}

impl ProjectArgs {
    /// Build the run configuration; `validate` is left to the caller
    pub fn to_config(&self, ledger: &Path) -> UploadConfig {
        let mut config = UploadConfig::new(
            self.project_id,
            &self.files_root,
            &self.metadata,
            self.source.clone(),
        );
        config.id_column = self.id_column.clone();
        config.title_column = self.title_column.clone();
        config.file_extension = self.file_extension.clone();
        config.access = self.access;
        config.batch_size = self.batch_size;
        config.ledger_path = ledger.to_path_buf();
        config
    }
}
