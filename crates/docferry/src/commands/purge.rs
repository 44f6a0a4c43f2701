//! `docferry purge` command implementation

use crate::api::ApiClient;
use crate::error::{Result, UploadError};
use crate::progress::create_spinner;
use crate::reconcile;
use crate::shutdown::Shutdown;
use colored::Colorize;

/// Delete every document in the project; refuses to run without `yes`
pub async fn run(
    project_id: u64,
    batch_size: usize,
    yes: bool,
    api_url: String,
    shutdown: Shutdown,
) -> Result<usize> {
    if !yes {
        return Err(UploadError::config(format!(
            "purge deletes every document in project {}; pass --yes to confirm",
            project_id
        )));
    }

    let client = ApiClient::from_env(Some(api_url))?;

    let spinner = create_spinner(&format!("Deleting all documents in project {}...", project_id));
    let deleted = reconcile::purge(&client, project_id, batch_size, &shutdown).await;
    spinner.finish_and_clear();
    let deleted = deleted?;
    println!("{} Deleted {} document(s)", "✓".green(), deleted);

    Ok(deleted)
}
