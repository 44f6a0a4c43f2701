//! HTTP API client for the document service
//!
//! Service calls carry a bearer token. Blob uploads go straight to the
//! presigned URL with no credentials of ours attached.

use crate::api::service::{BlobStore, DocumentService};
use crate::api::{endpoints, types::*};
use crate::config::DEFAULT_API_URL;
use crate::error::{Result, UploadError};
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;

// ============================================================================
// API Client Constants
// ============================================================================

/// Default timeout for API requests in seconds.
/// Can be overridden via DOCFERRY_API_TIMEOUT_SECS environment variable.
/// Generous because a single PUT may carry a large scan.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 300;

/// Environment variable holding the API token.
pub const API_TOKEN_ENV: &str = "DOCFERRY_API_TOKEN";

/// Search page size requested from the index.
pub const SEARCH_PAGE_SIZE: u32 = 100;

/// Longest response body quoted in an error message.
const MAX_ERROR_BODY: usize = 500;

/// API client for the document service
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let timeout_secs = std::env::var("DOCFERRY_API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_API_TIMEOUT_SECS);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            token: token.into(),
        })
    }

    /// Create with the token from `DOCFERRY_API_TOKEN`
    ///
    /// A missing token is a startup error.
    pub fn from_env(base_url: Option<String>) -> Result<Self> {
        let token = std::env::var(API_TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                UploadError::config(format!(
                    "missing API credentials; set {} (or add it to .env)",
                    API_TOKEN_ENV
                ))
            })?;

        Self::new(base_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()), token)
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn search_page(&self, url: &str, query: Option<&SearchQuery>) -> Result<SearchPage> {
        let mut request = self.client.get(url).bearer_auth(&self.token);

        if let Some(query) = query {
            request = request
                .query(&[("q", query.query.as_str())])
                .query(&[("per_page", SEARCH_PAGE_SIZE.to_string())])
                .query(&query.filters);
        }

        let response = check(request.send().await?, "search").await?;
        Ok(response.json().await?)
    }
}

/// Turn a non-2xx response into a remote error quoting the body
async fn check(response: Response, call: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }

    Err(UploadError::remote(format!("{} returned {}: {}", call, status, body.trim())))
}

#[async_trait]
impl DocumentService for ApiClient {
    async fn create_documents(&self, documents: &[CreateDocument]) -> Result<Vec<CreatedDocument>> {
        let url = endpoints::documents_url(&self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(documents)
            .send()
            .await?;

        let response = check(response, "create documents").await?;
        Ok(response.json().await?)
    }

    async fn delete_documents(&self, ids: &[u64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let url = endpoints::documents_url(&self.base_url);

        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.token)
            .query(&[("id__in", endpoints::id_list(ids))])
            .send()
            .await?;

        check(response, "delete documents").await?;
        Ok(())
    }

    async fn delete_document(&self, id: u64) -> Result<()> {
        let url = endpoints::document_url(&self.base_url, id);

        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        check(response, "delete document").await?;
        Ok(())
    }

    async fn process_documents(&self, ids: &[u64]) -> Result<()> {
        let url = endpoints::process_url(&self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&ProcessRequest::new(ids))
            .send()
            .await?;

        check(response, "process documents").await?;
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<RemoteDocument>> {
        let first = endpoints::search_url(&self.base_url);
        let mut page = self.search_page(&first, Some(query)).await?;
        let mut documents = std::mem::take(&mut page.results);

        while let Some(next) = page.next.take() {
            page = self.search_page(&next, None).await?;
            documents.append(&mut page.results);
        }

        tracing::debug!(query = %query.query, matches = documents.len(), "Search finished");
        Ok(documents)
    }
}

#[async_trait]
impl BlobStore for ApiClient {
    async fn put(&self, url: &str, body: Vec<u8>) -> Result<()> {
        let response = self.client.put(url).body(body).send().await?;
        check(response, "file upload").await?;
        Ok(())
    }
}
