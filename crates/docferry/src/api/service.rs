//! Remote collaborator traits
//!
//! The upload protocol and the reconcile sweeps only talk to the outside
//! world through these two traits. [`crate::api::ApiClient`] implements both
//! over HTTP; tests plug in in-memory fakes.

use crate::api::types::{CreateDocument, CreatedDocument, RemoteDocument, SearchQuery};
use crate::error::Result;
use async_trait::async_trait;

/// The document-management service
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Create one remote record per request; the response is positional
    async fn create_documents(&self, documents: &[CreateDocument]) -> Result<Vec<CreatedDocument>>;

    /// Delete several records in one call
    async fn delete_documents(&self, ids: &[u64]) -> Result<()>;

    /// Delete a single record
    async fn delete_document(&self, id: u64) -> Result<()>;

    /// Start processing for records whose bytes are uploaded
    async fn process_documents(&self, ids: &[u64]) -> Result<()>;

    /// All records matching a query, across every result page
    async fn search(&self, query: &SearchQuery) -> Result<Vec<RemoteDocument>>;
}

/// Storage behind presigned URLs
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// PUT raw bytes to a one-time URL
    async fn put(&self, url: &str, body: Vec<u8>) -> Result<()>;
}
