//! API client module
//!
//! HTTP access to the document service and to presigned blob storage.

pub mod client;
pub mod endpoints;
pub mod service;
pub mod types;

pub use client::ApiClient;
pub use service::{BlobStore, DocumentService};
pub use types::*;
