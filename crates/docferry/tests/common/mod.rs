//! Shared fixtures for integration tests
//!
//! `FakeRemote` is an in-memory document service and blob store. Switches
//! on it make individual calls fail so each protocol phase can be tested.

#![allow(dead_code)]

use async_trait::async_trait;
use docferry::api::{
    BlobStore, CreateDocument, CreatedDocument, DocumentService, DocumentStatus, RemoteDocument,
    SearchQuery,
};
use docferry::error::{Result, UploadError};
use docferry::metadata::{MetadataColumns, MetadataSource};
use docferry::upload::BatchUploader;
use docferry::{Shutdown, UploadConfig};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const ID_COLUMN: &str = "document_number";
pub const PROJECT_ID: u64 = 209284;

#[derive(Debug, Clone)]
pub struct FakeDocument {
    pub id: u64,
    pub status: DocumentStatus,
    pub data: Map<String, Value>,
}

impl FakeDocument {
    pub fn identifier(&self) -> Option<&str> {
        self.data.get(ID_COLUMN).and_then(Value::as_str)
    }
}

#[derive(Default)]
struct State {
    next_id: u64,
    docs: BTreeMap<u64, FakeDocument>,
    create_calls: usize,
    process_calls: usize,
    delete_calls: usize,
    puts: usize,
    fail_create: bool,
    short_create: bool,
    fail_process: bool,
    fail_delete: bool,
    fail_search: bool,
    fail_put_for: HashSet<String>,
    cancel_on_create: Option<Shutdown>,
}

#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<State>,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn fail_create(&self) {
        self.with(|s| s.fail_create = true);
    }

    pub fn short_create(&self) {
        self.with(|s| s.short_create = true);
    }

    pub fn fail_process(&self) {
        self.with(|s| s.fail_process = true);
    }

    pub fn fail_delete(&self) {
        self.with(|s| s.fail_delete = true);
    }

    pub fn fail_search(&self) {
        self.with(|s| s.fail_search = true);
    }

    pub fn fail_put_for(&self, identifier: &str) {
        self.with(|s| s.fail_put_for.insert(identifier.to_string()));
    }

    pub fn cancel_on_create(&self, shutdown: Shutdown) {
        self.with(|s| s.cancel_on_create = Some(shutdown));
    }

    /// Seed a remote document as if an earlier run had created it
    pub fn insert(&self, identifier: Option<&str>, status: DocumentStatus) -> u64 {
        self.with(|s| {
            s.next_id += 1;
            let id = s.next_id;
            let mut data = Map::new();
            if let Some(identifier) = identifier {
                data.insert(ID_COLUMN.to_string(), Value::String(identifier.to_string()));
            }
            s.docs.insert(id, FakeDocument { id, status, data });
            id
        })
    }

    pub fn create_calls(&self) -> usize {
        self.with(|s| s.create_calls)
    }

    pub fn process_calls(&self) -> usize {
        self.with(|s| s.process_calls)
    }

    pub fn delete_calls(&self) -> usize {
        self.with(|s| s.delete_calls)
    }

    pub fn puts(&self) -> usize {
        self.with(|s| s.puts)
    }

    pub fn document_count(&self) -> usize {
        self.with(|s| s.docs.len())
    }

    pub fn documents_for(&self, identifier: &str) -> Vec<FakeDocument> {
        self.with(|s| {
            s.docs
                .values()
                .filter(|d| d.identifier() == Some(identifier))
                .cloned()
                .collect()
        })
    }

    pub fn status_of(&self, id: u64) -> Option<DocumentStatus> {
        self.with(|s| s.docs.get(&id).map(|d| d.status))
    }
}

fn to_remote(doc: &FakeDocument) -> RemoteDocument {
    RemoteDocument {
        id: doc.id,
        status: doc.status,
        data: doc.data.clone(),
    }
}

#[async_trait]
impl DocumentService for FakeRemote {
    async fn create_documents(&self, documents: &[CreateDocument]) -> Result<Vec<CreatedDocument>> {
        self.with(|s| {
            s.create_calls += 1;
            if let Some(shutdown) = s.cancel_on_create.take() {
                shutdown.trigger();
            }
            if s.fail_create {
                return Err(UploadError::remote("create documents returned 500: boom"));
            }

            // A short response is a service that silently dropped the last request
            let created = if s.short_create {
                documents.len().saturating_sub(1)
            } else {
                documents.len()
            };

            let mut handles = Vec::with_capacity(created);
            for document in &documents[..created] {
                s.next_id += 1;
                let id = s.next_id;
                s.docs.insert(
                    id,
                    FakeDocument {
                        id,
                        status: DocumentStatus::Nofile,
                        data: document.data.clone(),
                    },
                );
                handles.push(CreatedDocument {
                    id,
                    presigned_url: format!("mem://upload/{}", id),
                });
            }

            Ok(handles)
        })
    }

    async fn delete_documents(&self, ids: &[u64]) -> Result<()> {
        self.with(|s| {
            s.delete_calls += 1;
            if s.fail_delete {
                return Err(UploadError::remote("delete documents returned 503: unavailable"));
            }
            for id in ids {
                s.docs.remove(id);
            }
            Ok(())
        })
    }

    async fn delete_document(&self, id: u64) -> Result<()> {
        self.delete_documents(&[id]).await
    }

    async fn process_documents(&self, ids: &[u64]) -> Result<()> {
        self.with(|s| {
            s.process_calls += 1;
            if s.fail_process {
                return Err(UploadError::remote("process documents returned 500: boom"));
            }
            for id in ids {
                if let Some(doc) = s.docs.get_mut(id) {
                    doc.status = DocumentStatus::Success;
                }
            }
            Ok(())
        })
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<RemoteDocument>> {
        self.with(|s| {
            if s.fail_search {
                return Err(UploadError::remote("search returned 502: bad gateway"));
            }

            let wanted = query
                .filters
                .iter()
                .find(|(key, _)| key == &format!("data_{}", ID_COLUMN))
                .map(|(_, value)| value.clone());

            let docs = s.docs.values().filter(|doc| {
                if let Some(identifier) = &wanted {
                    return doc.identifier() == Some(identifier.as_str());
                }
                if query.query.contains("+status:") {
                    return matches!(doc.status, DocumentStatus::Nofile | DocumentStatus::Error);
                }
                true
            });

            Ok(docs.map(to_remote).collect())
        })
    }
}

#[async_trait]
impl BlobStore for FakeRemote {
    async fn put(&self, url: &str, body: Vec<u8>) -> Result<()> {
        self.with(|s| {
            let id: u64 = url
                .trim_start_matches("mem://upload/")
                .parse()
                .map_err(|_| UploadError::remote(format!("unknown upload url {}", url)))?;

            let identifier = s
                .docs
                .get(&id)
                .and_then(|d| d.identifier().map(str::to_string))
                .ok_or_else(|| UploadError::remote(format!("no document {}", id)))?;

            if s.fail_put_for.contains(&identifier) || body.is_empty() {
                return Err(UploadError::remote("file upload returned 503: slow down"));
            }

            s.puts += 1;
            Ok(())
        })
    }
}

/// A metadata file and a directory of files on disk
pub struct Corpus {
    pub dir: TempDir,
    pub metadata: PathBuf,
    pub files: PathBuf,
    pub ledger: PathBuf,
    pub identifiers: Vec<String>,
}

impl Corpus {
    /// `count` items named `DOC-0001`... with a file for each
    pub fn new(count: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let files = dir.path().join("files");
        std::fs::create_dir_all(&files).unwrap();

        let identifiers: Vec<String> = (1..=count).map(|i| format!("DOC-{:04}", i)).collect();

        let mut csv = String::from("pages,document_number,title\n");
        for (i, identifier) in identifiers.iter().enumerate() {
            csv.push_str(&format!("{},{},\"Memo {}, page set\"\n", i + 1, identifier, i + 1));
            std::fs::write(
                files.join(format!("{}.pdf", identifier.to_lowercase())),
                format!("%PDF-1.4 {}", identifier),
            )
            .unwrap();
        }

        let metadata = dir.path().join("metadata.csv");
        std::fs::write(&metadata, csv).unwrap();
        let ledger = dir.path().join("ledger").join("docferry.db");

        Self {
            dir,
            metadata,
            files,
            ledger,
            identifiers,
        }
    }

    pub fn remove_file(&self, identifier: &str) {
        std::fs::remove_file(self.files.join(format!("{}.pdf", identifier.to_lowercase()))).unwrap();
    }

    pub fn config(&self, workers: usize, batch_size: usize) -> UploadConfig {
        let mut config = UploadConfig::new(PROJECT_ID, &self.files, &self.metadata, "Test Archive");
        config.workers = workers;
        config.batch_size = batch_size;
        config.ledger_path = self.ledger.clone();
        config
    }

    pub fn source(&self) -> MetadataSource {
        MetadataSource::open(&self.metadata, &MetadataColumns::new(ID_COLUMN, "title")).unwrap()
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

pub fn uploader(remote: &Arc<FakeRemote>, config: &UploadConfig) -> BatchUploader {
    BatchUploader::new(remote.clone(), remote.clone(), config.upload_settings())
}
