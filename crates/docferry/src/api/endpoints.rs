//! API endpoint URL builders
//!
//! All builders expect `base_url` without a trailing slash.

/// Bulk create and bulk delete
pub fn documents_url(base_url: &str) -> String {
    format!("{}/documents/", base_url)
}

/// Single document, used for targeted deletes
pub fn document_url(base_url: &str, id: u64) -> String {
    format!("{}/documents/{}/", base_url, id)
}

/// Bulk processing trigger
pub fn process_url(base_url: &str) -> String {
    format!("{}/documents/process/", base_url)
}

/// Full-text search
pub fn search_url(base_url: &str) -> String {
    format!("{}/documents/search/", base_url)
}

/// Comma separated id list for `id__in` filters
pub fn id_list(ids: &[u64]) -> String {
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
