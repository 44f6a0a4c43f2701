//! Process-wide shutdown signal
//!
//! The producer checks it between items and every worker between batches.
//! Calls already in flight are never aborted.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Cloneable handle on one shared cancellation token
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder to stop; later calls are no-ops
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            debug!("Shutdown requested");
        }
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Resolves once [`Shutdown::trigger`] has been called
    pub async fn triggered(&self) {
        self.token.cancelled().await
    }

    /// Trigger on the first Ctrl-C; must be called inside a tokio runtime
    pub fn listen_for_ctrl_c(&self) -> tokio::task::JoinHandle<()> {
        let shutdown = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    match result {
                        Ok(()) => {
                            warn!("Interrupt received, finishing in-flight batches and discarding the rest");
                            eprintln!("Interrupted; draining in-flight batches...");
                            shutdown.trigger();
                        },
                        Err(e) => warn!(error = %e, "Could not install Ctrl-C handler"),
                    }
                },
                _ = shutdown.triggered() => {},
            }
        })
    }
}
