//! Consumer side of the work queue

use crate::error::{Result, UploadError};
use crate::ledger::Ledger;
use crate::metadata::ItemRecord;
use crate::pipeline::Counters;
use crate::shutdown::Shutdown;
use crate::upload::{Batch, BatchOutcome, BatchUploader};
use crossbeam_channel::Receiver;
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

/// Everything one worker thread owns
pub(crate) struct Worker {
    pub id: usize,
    pub receiver: Receiver<ItemRecord>,
    pub uploader: BatchUploader,
    pub ledger_path: PathBuf,
    pub batch_size: usize,
    pub shutdown: Shutdown,
    pub counters: Arc<Counters>,
    pub progress: ProgressBar,
    pub runtime: Handle,
}

impl Worker {
    /// Pull batches until the queue closes or the run is cancelled
    ///
    /// A ledger failure triggers shutdown for everyone and is returned.
    pub(crate) fn run(self) -> Result<()> {
        let mut ledger = match Ledger::open(&self.ledger_path) {
            Ok(ledger) => ledger,
            Err(e) => {
                error!(worker = self.id, error = %e, "Could not open ledger");
                self.shutdown.trigger();
                return Err(e);
            },
        };

        debug!(worker = self.id, "Worker started");

        loop {
            if self.shutdown.is_triggered() {
                self.drain(0);
                break;
            }

            let records = self.next_batch();
            if records.is_empty() {
                break;
            }

            if self.shutdown.is_triggered() {
                self.drain(records.len());
                break;
            }

            if let Err(e) = self.handle(&mut ledger, &records) {
                error!(worker = self.id, error = %e, "Worker stopping on fatal error");
                self.shutdown.trigger();
                self.drain(0);
                return Err(e);
            }
        }

        debug!(worker = self.id, "Worker finished");
        Ok(())
    }

    /// Block for up to `batch_size` records; empty once the queue is closed and drained
    fn next_batch(&self) -> Vec<ItemRecord> {
        let mut records = Vec::with_capacity(self.batch_size);
        while records.len() < self.batch_size {
            match self.receiver.recv() {
                Ok(record) => records.push(record),
                Err(_) => break,
            }
        }
        records
    }

    fn handle(&self, ledger: &mut Ledger, records: &[ItemRecord]) -> Result<()> {
        let batch = Batch::from_records(records, self.uploader.settings());
        self.counters.batches.fetch_add(1, Ordering::Relaxed);

        let outcome = match self
            .runtime
            .block_on(self.uploader.process_batch(ledger, &batch))
        {
            Ok(outcome) => outcome,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(worker = self.id, items = batch.len(), error = %e, "Batch failed unexpectedly");
                record_unexpected(ledger, &batch, &e)?
            },
        };

        self.report(&outcome);
        Ok(())
    }

    fn report(&self, outcome: &BatchOutcome) {
        let completed = outcome.completed_count();
        let failed = outcome.failed_count();
        self.counters.completed.fetch_add(completed, Ordering::Relaxed);
        self.counters.failed.fetch_add(failed, Ordering::Relaxed);

        match outcome {
            BatchOutcome::Finished { .. } => {
                info!(worker = self.id, completed, failed, "Batch finished");
            },
            BatchOutcome::Rejected { reason, .. } => {
                info!(worker = self.id, failed, reason = %reason, "Batch rejected");
            },
            BatchOutcome::ProcessingFailed { reason, .. } => {
                info!(worker = self.id, failed, reason = %reason, "Batch processing failed");
            },
        }

        self.progress.inc((completed + failed) as u64);
        self.progress.set_message(crate::progress::outcome_message(
            self.counters.completed.load(Ordering::Relaxed),
            self.counters.failed.load(Ordering::Relaxed),
        ));
    }

    /// Discard whatever is left until the producer closes the queue
    fn drain(&self, already_taken: usize) {
        let discarded = already_taken + self.receiver.iter().count();
        if discarded > 0 {
            info!(worker = self.id, discarded, "Discarded queued items after shutdown");
        }
        self.counters.discarded.fetch_add(discarded, Ordering::Relaxed);
    }
}

/// Give every item of `batch` a failure for a non-fatal error that escaped
/// [`BatchUploader::process_batch`]
fn record_unexpected(ledger: &mut Ledger, batch: &Batch, error: &UploadError) -> Result<BatchOutcome> {
    let message = format!("unexpected error: {}", error);
    ledger.record_failures(batch.identifiers().map(|id| (id, message.as_str())))?;
    Ok(BatchOutcome::Rejected {
        identifiers: batch.identifiers().map(str::to_string).collect(),
        reason: message,
    })
}
