//! Upload pipeline
//!
//! One `enqueue` thread reads the metadata file into a bounded queue and
//! `upload-worker-N` threads take batches off it. Each worker owns a ledger
//! connection and drives its batch futures on the shared runtime with
//! [`Handle::block_on`], so transfers within a batch run concurrently on the
//! worker's own thread.
//!
//! The queue closes when the producer drops its sender. On shutdown the
//! producer stops, in-flight batches finish and queued items are discarded
//! without touching the ledger.

mod queue;
mod worker;

use crate::config::UploadConfig;
use crate::error::{Result, UploadError};
use crate::ledger::Ledger;
use crate::metadata::{ItemRecord, MetadataSource};
use crate::shutdown::Shutdown;
use crate::upload::BatchUploader;
use crossbeam_channel::{bounded, Receiver};
use indicatif::ProgressBar;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::runtime::Handle;
use tracing::info;
use worker::Worker;

/// Totals for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub enqueued: usize,
    pub batches: usize,
    pub completed: usize,
    pub failed: usize,
    /// Queued but never attempted because of shutdown
    pub discarded: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub enqueued: AtomicUsize,
    pub batches: AtomicUsize,
    pub completed: AtomicUsize,
    pub failed: AtomicUsize,
    pub discarded: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> RunSummary {
        RunSummary {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// A configured upload run
pub struct Pipeline {
    config: UploadConfig,
    uploader: BatchUploader,
    ledger_path: PathBuf,
    shutdown: Shutdown,
    progress: ProgressBar,
}

impl Pipeline {
    pub fn new(
        config: UploadConfig,
        uploader: BatchUploader,
        ledger_path: impl Into<PathBuf>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            config,
            uploader,
            ledger_path: ledger_path.into(),
            shutdown,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report progress on `progress` instead of a hidden bar
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Run until the metadata is exhausted, the item cap is hit or shutdown
    ///
    /// Blocks the calling thread, which must not be a runtime worker.
    pub fn run(&self, source: &MetadataSource, runtime: Handle) -> Result<RunSummary> {
        let completed = Ledger::initialize(&self.ledger_path)?.load_completed_ids()?;
        let skipped = completed.len();
        let records = source.records(completed)?;

        info!(
            workers = self.config.workers,
            batch_size = self.config.batch_size,
            skipped,
            "Starting upload run"
        );

        let counters = Arc::new(Counters::default());
        let (sender, receiver) = bounded::<ItemRecord>(self.config.queue_capacity());

        let mut workers = Vec::with_capacity(self.config.workers);
        for id in 0..self.config.workers {
            match self.spawn_worker(id, receiver.clone(), &counters, &runtime) {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    self.shutdown.trigger();
                    drop(sender);
                    join_all_threads(workers)?;
                    return Err(e.into());
                },
            }
        }
        drop(receiver);

        let producer = {
            let shutdown = self.shutdown.clone();
            let counters = Arc::clone(&counters);
            let max_items = self.config.max_items;
            thread::Builder::new()
                .name("enqueue".to_string())
                .spawn(move || queue::produce(records, sender, max_items, &shutdown, &counters))
        };

        let producer_result = match producer {
            Ok(handle) => join_thread(handle),
            Err(e) => {
                self.shutdown.trigger();
                Err(e.into())
            },
        };
        let workers_result = join_all_threads(workers);

        let summary = counters.snapshot();
        self.progress.finish_and_clear();

        info!(
            enqueued = summary.enqueued,
            batches = summary.batches,
            completed = summary.completed,
            failed = summary.failed,
            discarded = summary.discarded,
            "Upload run finished"
        );

        workers_result?;
        producer_result?;
        Ok(summary)
    }

    fn spawn_worker(
        &self,
        id: usize,
        receiver: Receiver<ItemRecord>,
        counters: &Arc<Counters>,
        runtime: &Handle,
    ) -> std::io::Result<JoinHandle<Result<()>>> {
        let worker = Worker {
            id,
            receiver,
            uploader: self.uploader.clone(),
            ledger_path: self.ledger_path.clone(),
            batch_size: self.config.batch_size,
            shutdown: self.shutdown.clone(),
            counters: Arc::clone(counters),
            progress: self.progress.clone(),
            runtime: runtime.clone(),
        };

        thread::Builder::new()
            .name(format!("upload-worker-{}", id))
            .spawn(move || worker.run())
    }
}

fn join_thread(handle: JoinHandle<Result<()>>) -> Result<()> {
    let name = handle.thread().name().unwrap_or("unnamed").to_string();
    handle
        .join()
        .map_err(|_| UploadError::Other(anyhow::anyhow!("thread '{}' panicked", name)))?
}

/// Join every thread, returning the first error after all have exited
fn join_all_threads(handles: Vec<JoinHandle<Result<()>>>) -> Result<()> {
    let mut first_error = None;
    for handle in handles {
        if let Err(e) = join_thread(handle) {
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}
