//! docferry - Main entry point

use clap::Parser;
use docferry::{Cli, Commands, Shutdown};
use docferry_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // Credentials and defaults may come from a local .env file
    let _ = dotenvy::dotenv();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize logging based on verbose flag and environment
    let log_config = if cli.verbose {
        LogConfig::builder()
            .level(LogLevel::Debug)
            .output(LogOutput::Console)
            .build()
    } else {
        LogConfig::builder()
            .level(LogLevel::Warn)
            .output(LogOutput::Console)
            .build()
    };

    // Environment variables take precedence
    let log_config = LogConfig::from_env_over(log_config.clone()).unwrap_or(log_config);

    // The CLI works without logging, so a failure here is not fatal
    let _log_guard = init_logging(&log_config).ok();

    let shutdown = Shutdown::new();
    let _listener = shutdown.listen_for_ctrl_c();

    // Execute command
    let result = execute_command(&cli, shutdown).await;

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: &Cli, shutdown: Shutdown) -> docferry::Result<()> {
    match &cli.command {
        Commands::Upload {
            project,
            workers,
            max_items,
            no_progress,
        } => {
            let mut config = project.to_config(&cli.ledger);
            config.workers = *workers;
            config.max_items = *max_items;

            // Progress output would interleave with debug logging
            let show_progress = !*no_progress && !cli.verbose;

            docferry::commands::upload::run(config, cli.api_url.clone(), show_progress, shutdown)
                .await
                .map(|_| ())
        },

        Commands::Reconcile { project, sweep } => {
            let config = project.to_config(&cli.ledger);
            docferry::commands::reconcile::run(config, cli.api_url.clone(), *sweep, shutdown)
                .await
                .map(|_| ())
        },

        Commands::Status { json } => docferry::commands::status::run(&cli.ledger, *json),

        Commands::Failures { limit } => docferry::commands::failures::run(&cli.ledger, *limit),

        Commands::Dedupe { input, id_column } => {
            docferry::commands::dedupe::run(input, id_column, cli.api_url.clone(), shutdown)
                .await
                .map(|_| ())
        },

        Commands::Purge {
            project_id,
            batch_size,
            yes,
        } => docferry::commands::purge::run(
            *project_id,
            *batch_size,
            *yes,
            cli.api_url.clone(),
            shutdown,
        )
        .await
        .map(|_| ()),
    }
}
