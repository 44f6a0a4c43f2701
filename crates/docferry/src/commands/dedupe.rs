//! `docferry dedupe` command implementation

use crate::api::ApiClient;
use crate::error::{Result, UploadError};
use crate::progress::create_spinner;
use crate::reconcile::{self, DedupeResult};
use crate::shutdown::Shutdown;
use colored::Colorize;
use std::path::Path;

/// Deduplicate every identifier listed in `input`
pub async fn run(
    input: &Path,
    id_column: &str,
    api_url: String,
    shutdown: Shutdown,
) -> Result<Vec<DedupeResult>> {
    let identifiers = read_identifiers(input)?;
    if identifiers.is_empty() {
        return Err(UploadError::config(format!(
            "'{}' lists no identifiers",
            input.display()
        )));
    }

    let client = ApiClient::from_env(Some(api_url))?;
    let spinner = create_spinner(&format!("Checking {} identifier(s)...", identifiers.len()));
    let results = reconcile::dedupe(&client, id_column, &identifiers, &shutdown).await;
    spinner.finish_and_clear();

    for result in &results {
        match result {
            DedupeResult::Kept {
                identifier,
                kept,
                deleted,
            } => println!(
                "{} {} kept {}, deleted {}",
                "✓".green(),
                identifier,
                kept,
                deleted.len()
            ),
            DedupeResult::NoSuccess {
                identifier,
                matches,
            } => println!("{} {} no success among {} match(es)", "!".yellow(), identifier, matches),
            DedupeResult::NotFound { identifier } => {
                println!("{} {} not found", "-".dimmed(), identifier)
            },
            DedupeResult::Failed { identifier, error } => {
                println!("{} {} {}", "✗".red(), identifier, error)
            },
        }
    }

    Ok(results)
}

/// One identifier per line; blank lines are skipped
fn read_identifiers(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
