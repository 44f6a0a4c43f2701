//! API request and response types
//!
//! Shapes follow the document service's JSON API.

use crate::config::AccessLevel;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Body element of the bulk-create call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateDocument {
    pub title: String,
    pub projects: Vec<u64>,
    pub source: String,
    pub access: AccessLevel,
    pub delayed_index: bool,
    /// Opaque per-item metadata, searchable as `data_<key>`
    pub data: Map<String, Value>,
}

/// One element of the bulk-create response, positionally matched to the request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedDocument {
    #[serde(deserialize_with = "id_from_number_or_string")]
    pub id: u64,
    /// One-time URL the file bytes must be PUT to
    pub presigned_url: String,
}

/// Body of the bulk-process call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessRequest {
    pub ids: Vec<String>,
}

impl ProcessRequest {
    pub fn new(ids: &[u64]) -> Self {
        Self {
            ids: ids.iter().map(u64::to_string).collect(),
        }
    }
}

/// Processing state of a remote document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Success,
    Readable,
    Pending,
    Error,
    Nofile,
    #[serde(other)]
    Unknown,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Success => "success",
            DocumentStatus::Readable => "readable",
            DocumentStatus::Pending => "pending",
            DocumentStatus::Error => "error",
            DocumentStatus::Nofile => "nofile",
            DocumentStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document as returned by search
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteDocument {
    #[serde(deserialize_with = "id_from_number_or_string")]
    pub id: u64,
    pub status: DocumentStatus,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl RemoteDocument {
    /// Value of a metadata key; the index stores values as lists
    pub fn data_value(&self, key: &str) -> Option<&str> {
        match self.data.get(key)? {
            Value::String(s) => Some(s.as_str()),
            Value::Array(values) => values.first().and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DocumentStatus::Success
    }
}

/// One page of search results
#[derive(Debug, Clone, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub count: Option<u64>,
    /// Absolute URL of the following page
    #[serde(default)]
    pub next: Option<String>,
    pub results: Vec<RemoteDocument>,
}

/// A search against the document index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    /// Extra query-string filters such as `data_document_number`
    pub filters: Vec<(String, String)>,
}

impl SearchQuery {
    /// All documents whose metadata `column` equals `identifier`
    pub fn by_identifier(column: &str, identifier: &str) -> Self {
        Self {
            query: "*:*".to_string(),
            filters: vec![(format!("data_{}", column), identifier.to_string())],
        }
    }

    /// Documents in a project with one of the given statuses
    pub fn in_project_with_status(project_id: u64, statuses: &[DocumentStatus]) -> Self {
        let statuses: Vec<&str> = statuses.iter().map(DocumentStatus::as_str).collect();
        Self {
            query: format!("+project:{} +status:({})", project_id, statuses.join(" OR ")),
            filters: Vec::new(),
        }
    }

    /// Every document in a project
    pub fn in_project(project_id: u64) -> Self {
        Self {
            query: format!("project:{}", project_id),
            filters: Vec::new(),
        }
    }
}

/// Ids come back as numbers from the REST endpoints and as strings from search
fn id_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(n) => Ok(n),
        RawId::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_document_serialization() {
        let mut data = Map::new();
        data.insert("document_number".to_string(), json!("CIA-1"));
        let doc = CreateDocument {
            title: "Memo".to_string(),
            projects: vec![209284],
            source: "CIA CREST Database".to_string(),
            access: AccessLevel::Public,
            delayed_index: true,
            data,
        };

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["access"], "public");
        assert_eq!(value["projects"], json!([209284]));
        assert_eq!(value["delayed_index"], true);
        assert_eq!(value["data"]["document_number"], "CIA-1");
    }

    #[test]
    fn test_remote_document_accepts_string_ids_and_list_data() {
        let doc: RemoteDocument = serde_json::from_value(json!({
            "id": "20059100",
            "status": "nofile",
            "data": {"document_number": ["CIA-1"]}
        }))
        .unwrap();

        assert_eq!(doc.id, 20059100);
        assert_eq!(doc.status, DocumentStatus::Nofile);
        assert_eq!(doc.data_value("document_number"), Some("CIA-1"));
        assert_eq!(doc.data_value("missing"), None);
    }

    #[test]
    fn test_unknown_status_does_not_fail() {
        let doc: RemoteDocument =
            serde_json::from_value(json!({"id": 7, "status": "frozen"})).unwrap();
        assert_eq!(doc.status, DocumentStatus::Unknown);
        assert!(!doc.is_success());
    }

    #[test]
    fn test_search_queries() {
        let q = SearchQuery::by_identifier("document_number", "CIA-1");
        assert_eq!(q.query, "*:*");
        assert_eq!(
            q.filters,
            vec![("data_document_number".to_string(), "CIA-1".to_string())]
        );

        let q = SearchQuery::in_project_with_status(
            209284,
            &[DocumentStatus::Nofile, DocumentStatus::Error],
        );
        assert_eq!(q.query, "+project:209284 +status:(nofile OR error)");
    }

    #[test]
    fn test_process_request_sends_string_ids() {
        let value = serde_json::to_value(ProcessRequest::new(&[1, 22])).unwrap();
        assert_eq!(value, json!({"ids": ["1", "22"]}));
    }
}
