//! Producer side of the work queue

use crate::error::Result;
use crate::metadata::ItemRecord;
use crate::pipeline::Counters;
use crate::shutdown::Shutdown;
use crossbeam_channel::{SendTimeoutError, Sender};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{debug, error, info};

/// How often a producer blocked on a full queue checks for shutdown
const SEND_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Feed records into the queue until the source, the cap or the run ends
///
/// Dropping `sender` on return closes the queue for the workers.
pub(crate) fn produce<I>(
    records: I,
    sender: Sender<ItemRecord>,
    max_items: Option<usize>,
    shutdown: &Shutdown,
    counters: &Counters,
) -> Result<()>
where
    I: IntoIterator<Item = Result<ItemRecord>>,
{
    let mut enqueued = 0usize;

    for record in records {
        if shutdown.is_triggered() {
            info!(enqueued, "Shutdown requested, no more items will be queued");
            return Ok(());
        }

        if max_items.is_some_and(|max| enqueued >= max) {
            info!(enqueued, "Reached item cap");
            return Ok(());
        }

        let mut pending = match record {
            Ok(record) => record,
            Err(e) => {
                error!(enqueued, error = %e, "Stopped reading metadata");
                return Err(e);
            },
        };

        loop {
            match sender.send_timeout(pending, SEND_POLL_INTERVAL) {
                Ok(()) => {
                    enqueued += 1;
                    counters.enqueued.fetch_add(1, Ordering::Relaxed);
                    break;
                },
                Err(SendTimeoutError::Timeout(record)) => {
                    if shutdown.is_triggered() {
                        info!(enqueued, "Shutdown requested while queue was full");
                        return Ok(());
                    }
                    pending = record;
                },
                Err(SendTimeoutError::Disconnected(_)) => {
                    debug!(enqueued, "Every worker has exited, stopping producer");
                    return Ok(());
                },
            }
        }
    }

    info!(enqueued, "Metadata exhausted");
    Ok(())
}
