//! Ledger row types

use serde::Serialize;

/// State of one identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub identifier: String,
    pub completed: bool,
    pub error_count: u32,
    pub last_error: String,
    /// RFC 3339 timestamp of the last write
    pub updated_at: String,
}

/// Totals for the `status` command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub completed: u64,
    pub failed: u64,
    /// Sum of error counts over all rows, including ones that later succeeded
    pub total_errors: u64,
}

impl LedgerSummary {
    pub fn total(&self) -> u64 {
        self.completed + self.failed
    }
}
