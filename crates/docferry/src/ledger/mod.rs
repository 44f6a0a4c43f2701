//! Progress ledger
//!
//! A local SQLite file recording, per item identifier, whether the upload
//! completed and how often it failed. It is the only record of what is
//! already done, so a run can be killed at any point and started again.
//!
//! Every write is committed before the call returns. A crash between a
//! remote side effect and the ledger write can still leave the two out of
//! step; the reconcile sweeps exist for that case.

pub mod schema;
pub mod store;
pub mod types;

pub use store::Ledger;
pub use types::{LedgerEntry, LedgerSummary};
