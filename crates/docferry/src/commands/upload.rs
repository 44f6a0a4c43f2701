//! `docferry upload` command implementation
//!
//! Runs the upload pipeline over the metadata file.

use crate::api::ApiClient;
use crate::config::UploadConfig;
use crate::error::{Result, UploadError};
use crate::ledger::Ledger;
use crate::metadata::{MetadataColumns, MetadataSource};
use crate::pipeline::{Pipeline, RunSummary};
use crate::progress;
use crate::shutdown::Shutdown;
use crate::upload::BatchUploader;
use colored::Colorize;
use indicatif::ProgressBar;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Upload everything not yet completed
pub async fn run(
    config: UploadConfig,
    api_url: String,
    show_progress: bool,
    shutdown: Shutdown,
) -> Result<RunSummary> {
    config.validate()?;

    let client = Arc::new(ApiClient::from_env(Some(api_url))?);
    let columns = MetadataColumns::new(&config.id_column, &config.title_column);
    let source = MetadataSource::open(&config.metadata_path, &columns)?;

    // Fail before spawning anything if the ledger path is unusable
    drop(Ledger::initialize(&config.ledger_path)?);

    println!(
        "{} Uploading to project {} with {} worker(s), {} per batch",
        "→".cyan(),
        config.project_id,
        config.workers,
        config.batch_size
    );

    let bar = if show_progress {
        progress::create_upload_progress(config.max_items.map(|n| n as u64))
    } else {
        ProgressBar::hidden()
    };

    let uploader = BatchUploader::new(client.clone(), client, config.upload_settings());
    let ledger_path = config.ledger_path.clone();
    let pipeline = Pipeline::new(config, uploader, ledger_path, shutdown.clone()).with_progress(bar);

    let runtime = Handle::current();
    let summary = tokio::task::spawn_blocking(move || pipeline.run(&source, runtime))
        .await
        .map_err(|e| UploadError::Other(anyhow::anyhow!("upload pipeline panicked: {}", e)))??;

    print_summary(&summary, shutdown.is_triggered());
    Ok(summary)
}

fn print_summary(summary: &RunSummary, interrupted: bool) {
    println!();
    if interrupted {
        println!("{}", "Upload interrupted".yellow().bold());
    } else {
        println!("{}", "Upload finished".green().bold());
    }
    println!("  Queued:    {}", summary.enqueued);
    println!("  Batches:   {}", summary.batches);
    println!("  Completed: {}", summary.completed.to_string().green());
    if summary.failed > 0 {
        println!("  Failed:    {}", summary.failed.to_string().red());
        println!("Run 'docferry failures' to inspect, 'docferry reconcile' to retry.");
    } else {
        println!("  Failed:    0");
    }
    if summary.discarded > 0 {
        println!("  Discarded: {} (not attempted)", summary.discarded);
    }
}
