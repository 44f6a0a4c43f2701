//! `docferry reconcile` command implementation
//!
//! Runs the local and/or remote sweep and re-uploads what they requeue.

use crate::api::ApiClient;
use crate::config::UploadConfig;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::metadata::{MetadataColumns, MetadataSource};
use crate::reconcile::{ReconcileReport, Reconciler, Sweep};
use crate::shutdown::Shutdown;
use crate::upload::BatchUploader;
use colored::Colorize;
use std::sync::Arc;

/// Run the selected sweeps
pub async fn run(
    config: UploadConfig,
    api_url: String,
    sweep: Sweep,
    shutdown: Shutdown,
) -> Result<ReconcileReport> {
    config.validate()?;

    let client = Arc::new(ApiClient::from_env(Some(api_url))?);
    let columns = MetadataColumns::new(&config.id_column, &config.title_column);
    let source = MetadataSource::open(&config.metadata_path, &columns)?;
    let mut ledger = Ledger::initialize(&config.ledger_path)?;

    let uploader = BatchUploader::new(client.clone(), client, config.upload_settings());
    let reconciler = Reconciler::new(uploader, source, config.batch_size).with_shutdown(shutdown);

    let mut total = ReconcileReport::default();

    if sweep.includes_local() {
        println!("{} Checking failed identifiers against the remote index...", "→".cyan());
        let report = reconciler.local_sweep(&mut ledger).await?;
        print_report("Local sweep", &report);
        total.merge(&report);
    }

    if sweep.includes_remote() {
        println!("{} Looking for broken remote documents...", "→".cyan());
        let report = reconciler.remote_sweep(&mut ledger).await?;
        print_report("Remote sweep", &report);
        total.merge(&report);
    }

    Ok(total)
}

fn print_report(title: &str, report: &ReconcileReport) {
    println!("{}", title.cyan().bold());
    println!("  Examined:         {}", report.examined);
    println!("  Marked completed: {}", report.marked_completed);
    println!("  Requeued:         {}", report.requeued);
    println!("  Uploaded:         {}", report.uploaded.to_string().green());
    if report.failed > 0 {
        println!("  Failed:           {}", report.failed.to_string().red());
    } else {
        println!("  Failed:           0");
    }
    println!();
}
