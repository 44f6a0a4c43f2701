//! Reconciliation between the ledger and the remote index
//!
//! Earlier runs can leave remote state that the ledger does not reflect:
//! a document created but never filled, a success that was never recorded,
//! or duplicates from a retried register call. The sweeps here look at both
//! sides and either settle an identifier or feed it back through
//! [`BatchUploader::process_batch`].

use crate::api::types::{DocumentStatus, RemoteDocument, SearchQuery};
use crate::api::DocumentService;
use crate::config::check_batch_size;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::metadata::MetadataSource;
use crate::shutdown::Shutdown;
use crate::upload::{Batch, BatchUploader};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which sweeps to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Sweep {
    /// Identifiers the ledger has as failed
    Local,
    /// Remote documents in error or no-file state
    Remote,
    Both,
}

impl Sweep {
    pub fn includes_local(&self) -> bool {
        matches!(self, Sweep::Local | Sweep::Both)
    }

    pub fn includes_remote(&self) -> bool {
        matches!(self, Sweep::Remote | Sweep::Both)
    }
}

/// Totals for one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub examined: usize,
    pub marked_completed: usize,
    pub requeued: usize,
    pub uploaded: usize,
    pub failed: usize,
}

impl ReconcileReport {
    pub fn merge(&mut self, other: &ReconcileReport) {
        self.examined += other.examined;
        self.marked_completed += other.marked_completed;
        self.requeued += other.requeued;
        self.uploaded += other.uploaded;
        self.failed += other.failed;
    }
}

/// How a local-sweep identifier was settled
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolution {
    Completed,
    Requeue,
    Failed(String),
}

/// Result of deduplicating one identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DedupeResult {
    /// One success kept, the other matches deleted
    Kept { identifier: String, kept: u64, deleted: Vec<u64> },
    /// Matches exist but none succeeded; left alone
    NoSuccess { identifier: String, matches: usize },
    NotFound { identifier: String },
    Failed { identifier: String, error: String },
}

/// Runs the reconciliation sweeps against one destination project
pub struct Reconciler {
    uploader: BatchUploader,
    source: MetadataSource,
    batch_size: usize,
    shutdown: Shutdown,
}

impl Reconciler {
    pub fn new(uploader: BatchUploader, source: MetadataSource, batch_size: usize) -> Self {
        Self {
            uploader,
            source,
            batch_size: batch_size.max(1),
            shutdown: Shutdown::new(),
        }
    }

    /// Stop between identifiers once `shutdown` fires
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    fn service(&self) -> &Arc<dyn DocumentService> {
        self.uploader.service()
    }

    fn id_column(&self) -> &str {
        self.source.schema().identifier_column()
    }

    fn project_id(&self) -> u64 {
        self.uploader.settings().project_id
    }

    /// Settle every identifier the ledger has as failed
    pub async fn local_sweep(&self, ledger: &mut Ledger) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let mut requeue = Vec::new();

        let failed = ledger.failed_identifiers()?;
        info!(count = failed.len(), "Local sweep starting");

        for identifier in failed {
            if self.shutdown.is_triggered() {
                info!(examined = report.examined, "Local sweep interrupted");
                break;
            }
            report.examined += 1;

            match self.resolve(&identifier).await {
                Resolution::Completed => {
                    ledger.record_success(&identifier)?;
                    report.marked_completed += 1;
                },
                Resolution::Requeue => requeue.push(identifier),
                Resolution::Failed(message) => {
                    warn!(identifier = %identifier, error = %message, "Could not reconcile");
                    ledger.record_failure(&identifier, &message)?;
                    report.failed += 1;
                },
            }
        }

        self.reupload(ledger, requeue, &mut report).await?;
        info!(?report, "Local sweep finished");
        Ok(report)
    }

    async fn resolve(&self, identifier: &str) -> Resolution {
        let query = SearchQuery::by_identifier(self.id_column(), identifier);
        let matches = match self.service().search(&query).await {
            Ok(matches) => matches,
            Err(e) => return Resolution::Failed(format!("search failed: {}", e)),
        };

        match matches.as_slice() {
            [] => Resolution::Requeue,
            [only] if only.is_success() => {
                debug!(identifier, remote_id = only.id, "Found unrecorded success");
                Resolution::Completed
            },
            [only] => match self.service().delete_document(only.id).await {
                Ok(()) => Resolution::Requeue,
                Err(e) => Resolution::Failed(format!(
                    "remote document {} ({}) could not be deleted: {}",
                    only.id, only.status, e
                )),
            },
            several => {
                let keep = several.iter().find(|doc| doc.is_success()).map(|doc| doc.id);
                let extra: Vec<u64> = several
                    .iter()
                    .map(|doc| doc.id)
                    .filter(|id| Some(*id) != keep)
                    .collect();

                debug!(identifier, matches = several.len(), ?keep, "Removing duplicate remote documents");

                if let Err(e) = self.service().delete_documents(&extra).await {
                    return Resolution::Failed(format!(
                        "duplicate remote documents {:?} could not be deleted: {}",
                        extra, e
                    ));
                }

                if keep.is_some() {
                    Resolution::Completed
                } else {
                    Resolution::Requeue
                }
            },
        }
    }

    /// Delete remote documents stuck in error or no-file state and upload them again
    pub async fn remote_sweep(&self, ledger: &mut Ledger) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let mut seen = HashSet::new();
        let mut requeue = Vec::new();

        let query = SearchQuery::in_project_with_status(
            self.project_id(),
            &[DocumentStatus::Nofile, DocumentStatus::Error],
        );
        let broken = self.service().search(&query).await?;
        info!(count = broken.len(), "Remote sweep starting");

        for doc in broken {
            if self.shutdown.is_triggered() {
                info!(examined = report.examined, "Remote sweep interrupted");
                break;
            }
            report.examined += 1;

            let Some(identifier) = self.identifier_of(&doc) else {
                warn!(remote_id = doc.id, "Remote document has no identifier, skipping");
                continue;
            };

            // Reopen before deleting so a completed row is retried once the remote copy is gone
            ledger.reopen(
                &identifier,
                &format!("remote document {} in {} state", doc.id, doc.status),
            )?;

            if let Err(e) = self.service().delete_document(doc.id).await {
                let message = format!(
                    "remote document {} ({}) could not be deleted: {}",
                    doc.id, doc.status, e
                );
                warn!(identifier = %identifier, error = %message, "Could not reconcile");
                ledger.record_failure(&identifier, &message)?;
                report.failed += 1;
                continue;
            }

            if seen.insert(identifier.clone()) {
                requeue.push(identifier);
            }
        }

        self.reupload(ledger, requeue, &mut report).await?;
        info!(?report, "Remote sweep finished");
        Ok(report)
    }

    fn identifier_of(&self, doc: &RemoteDocument) -> Option<String> {
        doc.data_value(self.id_column())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }

    /// Push identifiers through the upload protocol in batch-sized groups
    async fn reupload(
        &self,
        ledger: &mut Ledger,
        identifiers: Vec<String>,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        if identifiers.is_empty() {
            return Ok(());
        }
        report.requeued += identifiers.len();

        let wanted: HashSet<String> = identifiers.iter().cloned().collect();
        let records = self.source.records_for(&wanted)?;

        let found: HashSet<&str> = records.iter().map(|r| r.identifier.as_str()).collect();
        for missing in identifiers.iter().filter(|id| !found.contains(id.as_str())) {
            warn!(identifier = %missing, "Identifier not in metadata file");
            ledger.record_failure(missing, "identifier not found in metadata file")?;
            report.failed += 1;
        }

        for chunk in records.chunks(self.batch_size) {
            if self.shutdown.is_triggered() {
                info!("Re-upload interrupted");
                break;
            }

            let batch = Batch::from_records(chunk, self.uploader.settings());
            let outcome = self.uploader.process_batch(ledger, &batch).await?;
            report.uploaded += outcome.completed_count();
            report.failed += outcome.failed_count();
        }

        Ok(())
    }
}

/// Keep one successful remote document per identifier and delete the others
///
/// The ledger is not touched.
pub async fn dedupe(
    service: &dyn DocumentService,
    id_column: &str,
    identifiers: &[String],
    shutdown: &Shutdown,
) -> Vec<DedupeResult> {
    let mut results = Vec::with_capacity(identifiers.len());

    for identifier in identifiers {
        if shutdown.is_triggered() {
            break;
        }
        results.push(dedupe_one(service, id_column, identifier).await);
    }

    results
}

async fn dedupe_one(service: &dyn DocumentService, id_column: &str, identifier: &str) -> DedupeResult {
    let identifier_owned = identifier.to_string();
    let query = SearchQuery::by_identifier(id_column, identifier);

    let matches = match service.search(&query).await {
        Ok(matches) => matches,
        Err(e) => {
            return DedupeResult::Failed {
                identifier: identifier_owned,
                error: e.to_string(),
            }
        },
    };

    if matches.is_empty() {
        return DedupeResult::NotFound {
            identifier: identifier_owned,
        };
    }

    let Some(kept) = matches.iter().find(|doc| doc.is_success()).map(|doc| doc.id) else {
        return DedupeResult::NoSuccess {
            identifier: identifier_owned,
            matches: matches.len(),
        };
    };

    let deleted: Vec<u64> = matches.iter().map(|d| d.id).filter(|id| *id != kept).collect();
    match service.delete_documents(&deleted).await {
        Ok(()) => DedupeResult::Kept {
            identifier: identifier_owned,
            kept,
            deleted,
        },
        Err(e) => DedupeResult::Failed {
            identifier: identifier_owned,
            error: e.to_string(),
        },
    }
}

/// Delete every remote document in a project, `group_size` ids per call
pub async fn purge(
    service: &dyn DocumentService,
    project_id: u64,
    group_size: usize,
    shutdown: &Shutdown,
) -> Result<usize> {
    check_batch_size(group_size)?;

    let ids: Vec<u64> = service
        .search(&SearchQuery::in_project(project_id))
        .await?
        .into_iter()
        .map(|doc| doc.id)
        .collect();

    let mut deleted = 0;
    for chunk in ids.chunks(group_size) {
        if shutdown.is_triggered() {
            break;
        }
        service.delete_documents(chunk).await?;
        deleted += chunk.len();
        debug!(deleted, total = ids.len(), "Purging project");
    }

    info!(project = project_id, deleted, "Purge finished");
    Ok(deleted)
}
