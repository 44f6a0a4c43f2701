//! Remote upload protocol
//!
//! A [`Batch`] of [`UploadRequest`]s goes through register, transfer and
//! process with [`BatchUploader::process_batch`], which reports a
//! [`BatchOutcome`] after writing every item's result to the ledger.

pub mod batch;
pub mod protocol;

pub use batch::{Batch, RegisteredItem, UploadRequest};
pub use protocol::{BatchOutcome, BatchUploader};
