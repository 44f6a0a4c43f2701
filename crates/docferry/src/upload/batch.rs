//! Batches of upload requests

use crate::api::types::{CreateDocument, CreatedDocument};
use crate::config::UploadSettings;
use crate::metadata::ItemRecord;
use std::path::PathBuf;

/// One item ready for the register call
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub identifier: String,
    pub file_path: PathBuf,
    pub document: CreateDocument,
}

impl UploadRequest {
    /// Apply the fixed upload parameters to a metadata row
    pub fn new(record: &ItemRecord, settings: &UploadSettings) -> Self {
        Self {
            identifier: record.identifier.clone(),
            file_path: settings.file_path(&record.identifier),
            document: CreateDocument {
                title: record.title.clone(),
                projects: vec![settings.project_id],
                source: settings.source.clone(),
                access: settings.access,
                delayed_index: settings.delayed_index,
                data: record.metadata(),
            },
        }
    }
}

/// Requests processed together through the three remote calls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    requests: Vec<UploadRequest>,
}

impl Batch {
    pub fn new(requests: Vec<UploadRequest>) -> Self {
        Self { requests }
    }

    pub fn from_records<'a, I>(records: I, settings: &UploadSettings) -> Self
    where
        I: IntoIterator<Item = &'a ItemRecord>,
    {
        Self::new(
            records
                .into_iter()
                .map(|record| UploadRequest::new(record, settings))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn requests(&self) -> &[UploadRequest] {
        &self.requests
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.requests.iter().map(|r| r.identifier.as_str())
    }

    pub(crate) fn documents(&self) -> Vec<CreateDocument> {
        self.requests.iter().map(|r| r.document.clone()).collect()
    }
}

/// A request after the register call handed back its remote handle
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredItem {
    pub identifier: String,
    pub file_path: PathBuf,
    pub remote_id: u64,
    pub presigned_url: String,
}

impl RegisteredItem {
    pub(crate) fn pair(request: &UploadRequest, handle: CreatedDocument) -> Self {
        Self {
            identifier: request.identifier.clone(),
            file_path: request.file_path.clone(),
            remote_id: handle.id,
            presigned_url: handle.presigned_url,
        }
    }
}
