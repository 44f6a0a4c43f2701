//! Three-phase batch upload
//!
//! 1. Register: one bulk-create call for the whole batch.
//! 2. Transfer: every file PUT to its presigned URL, concurrently.
//! 3. Process: one bulk call for the ids whose bytes arrived.
//!
//! Remote failures end up in the ledger as per-item failures. Remote records
//! that were created but cannot be completed are deleted on a best-effort
//! basis; anything that survives the delete is left for `reconcile`.

use crate::api::service::{BlobStore, DocumentService};
use crate::config::UploadSettings;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::upload::batch::{Batch, RegisteredItem};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The register call failed; nothing was created remotely
    Rejected {
        identifiers: Vec<String>,
        reason: String,
    },

    /// Processing was triggered for `completed`; `failed` lost their transfer
    Finished {
        completed: Vec<String>,
        failed: Vec<String>,
    },

    /// The process call failed after transfers
    ProcessingFailed {
        transfer_failed: Vec<String>,
        process_failed: Vec<String>,
        reason: String,
    },
}

impl BatchOutcome {
    pub fn completed_count(&self) -> usize {
        match self {
            BatchOutcome::Finished { completed, .. } => completed.len(),
            _ => 0,
        }
    }

    pub fn failed_count(&self) -> usize {
        match self {
            BatchOutcome::Rejected { identifiers, .. } => identifiers.len(),
            BatchOutcome::Finished { failed, .. } => failed.len(),
            BatchOutcome::ProcessingFailed {
                transfer_failed,
                process_failed,
                ..
            } => transfer_failed.len() + process_failed.len(),
        }
    }
}

/// Drives batches through the remote service
#[derive(Clone)]
pub struct BatchUploader {
    service: Arc<dyn DocumentService>,
    blobs: Arc<dyn BlobStore>,
    settings: UploadSettings,
}

impl BatchUploader {
    pub fn new(
        service: Arc<dyn DocumentService>,
        blobs: Arc<dyn BlobStore>,
        settings: UploadSettings,
    ) -> Self {
        Self {
            service,
            blobs,
            settings,
        }
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    pub fn service(&self) -> &Arc<dyn DocumentService> {
        &self.service
    }

    /// Run one batch through all three phases and record every item's outcome
    ///
    /// Only ledger failures are returned as `Err`, and those are fatal. The
    /// worker's non-fatal `Err` arm guards error sources added later.
    pub async fn process_batch(&self, ledger: &mut Ledger, batch: &Batch) -> Result<BatchOutcome> {
        if batch.is_empty() {
            return Ok(BatchOutcome::Finished {
                completed: Vec::new(),
                failed: Vec::new(),
            });
        }

        let registered = match self.register(batch).await {
            Ok(registered) => registered,
            Err(reason) => {
                let identifiers: Vec<String> = batch.identifiers().map(str::to_string).collect();
                warn!(items = identifiers.len(), reason = %reason, "Batch rejected at register");
                ledger.record_failures(identifiers.iter().map(|id| (id.as_str(), reason.as_str())))?;
                return Ok(BatchOutcome::Rejected {
                    identifiers,
                    reason,
                });
            },
        };

        let (sent, transfer_failures) = self.transfer(registered).await;

        let orphans: Vec<u64> = transfer_failures.iter().map(|(item, _)| item.remote_id).collect();
        let cleanup = self.discard(&orphans).await;
        let failures: Vec<(String, String)> = transfer_failures
            .into_iter()
            .map(|(item, error)| {
                let message = orphan_message(format!("transfer failed: {}", error), &item, &cleanup);
                warn!(identifier = %item.identifier, error = %message, "Item failed");
                (item.identifier, message)
            })
            .collect();
        ledger.record_failures(failures.iter().map(|(id, msg)| (id.as_str(), msg.as_str())))?;
        let transfer_failed: Vec<String> = failures.into_iter().map(|(id, _)| id).collect();

        if sent.is_empty() {
            info!(failed = transfer_failed.len(), "No transfers succeeded, skipping process call");
            return Ok(BatchOutcome::Finished {
                completed: Vec::new(),
                failed: transfer_failed,
            });
        }

        let ids: Vec<u64> = sent.iter().map(|item| item.remote_id).collect();
        if let Err(e) = self.service.process_documents(&ids).await {
            let reason = format!("process failed: {}", e);
            warn!(items = sent.len(), reason = %reason, "Process call failed");

            let cleanup = self.discard(&ids).await;
            let failures: Vec<(String, String)> = sent
                .into_iter()
                .map(|item| {
                    let message = orphan_message(reason.clone(), &item, &cleanup);
                    (item.identifier, message)
                })
                .collect();
            ledger.record_failures(failures.iter().map(|(id, msg)| (id.as_str(), msg.as_str())))?;

            return Ok(BatchOutcome::ProcessingFailed {
                transfer_failed,
                process_failed: failures.into_iter().map(|(id, _)| id).collect(),
                reason,
            });
        }

        let completed: Vec<String> = sent.into_iter().map(|item| item.identifier).collect();
        ledger.record_successes(completed.iter().map(String::as_str))?;

        Ok(BatchOutcome::Finished {
            completed,
            failed: transfer_failed,
        })
    }

    /// Phase 1; the error is the message recorded for every item
    async fn register(&self, batch: &Batch) -> std::result::Result<Vec<RegisteredItem>, String> {
        let handles = self
            .service
            .create_documents(&batch.documents())
            .await
            .map_err(|e| format!("register failed: {}", e))?;

        if handles.len() != batch.len() {
            let returned: Vec<u64> = handles.iter().map(|h| h.id).collect();
            let reason = format!(
                "register failed: service returned {} handles for {} documents",
                handles.len(),
                batch.len()
            );
            if let Err(e) = self.discard(&returned).await {
                return Err(format!(
                    "{}; remote documents {:?} could not be deleted: {}",
                    reason, returned, e
                ));
            }
            return Err(reason);
        }

        debug!(items = handles.len(), "Registered batch");

        Ok(batch
            .requests()
            .iter()
            .zip(handles)
            .map(|(request, handle)| RegisteredItem::pair(request, handle))
            .collect())
    }

    /// Phase 2; one future per item, joined before returning
    async fn transfer(
        &self,
        items: Vec<RegisteredItem>,
    ) -> (Vec<RegisteredItem>, Vec<(RegisteredItem, String)>) {
        let uploads = items.into_iter().map(|item| async move {
            let result = self.transfer_one(&item).await;
            (item, result)
        });

        let mut sent = Vec::new();
        let mut failed = Vec::new();
        for (item, result) in join_all(uploads).await {
            match result {
                Ok(()) => sent.push(item),
                Err(e) => failed.push((item, e)),
            }
        }

        (sent, failed)
    }

    async fn transfer_one(&self, item: &RegisteredItem) -> std::result::Result<(), String> {
        let bytes = tokio::fs::read(&item.file_path)
            .await
            .map_err(|e| format!("cannot read {}: {}", item.file_path.display(), e))?;

        self.blobs
            .put(&item.presigned_url, bytes)
            .await
            .map_err(|e| e.to_string())
    }

    /// Best-effort bulk delete; the error text ends up in failure messages
    async fn discard(&self, ids: &[u64]) -> std::result::Result<(), String> {
        if ids.is_empty() {
            return Ok(());
        }

        match self.service.delete_documents(ids).await {
            Ok(()) => {
                debug!(count = ids.len(), "Deleted orphaned remote documents");
                Ok(())
            },
            Err(e) => {
                warn!(ids = ?ids, error = %e, "Could not delete orphaned remote documents");
                Err(e.to_string())
            },
        }
    }
}

fn orphan_message(
    message: String,
    item: &RegisteredItem,
    cleanup: &std::result::Result<(), String>,
) -> String {
    match cleanup {
        Ok(()) => message,
        Err(e) => format!(
            "{}; orphaned remote document {} could not be deleted: {}",
            message, item.remote_id, e
        ),
    }
}
