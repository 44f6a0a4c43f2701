//! `docferry failures` command implementation

use crate::error::Result;
use crate::ledger::Ledger;
use colored::Colorize;
use std::path::Path;

/// Longest error message shown per row
const MAX_MESSAGE_WIDTH: usize = 100;

/// List failed identifiers, most errors first
pub fn run(ledger_path: &Path, limit: usize) -> Result<()> {
    if !ledger_path.exists() {
        println!("No ledger found at {}.", ledger_path.display());
        return Ok(());
    }

    let ledger = Ledger::open(ledger_path)?;
    let entries = ledger.failures(limit)?;

    if entries.is_empty() {
        println!("{} No failed items.", "✓".green());
        return Ok(());
    }

    println!("{}", "Failed items:".cyan().bold());
    println!();
    for entry in &entries {
        println!(
            "{}  {} error(s), last at {}",
            entry.identifier.red(),
            entry.error_count,
            entry.updated_at
        );
        println!("  {}", shorten(&entry.last_error, MAX_MESSAGE_WIDTH));
    }

    let failed = ledger.summary()?.failed;
    if failed > entries.len() as u64 {
        println!();
        println!("Showing {} of {}. Use --limit to see more.", entries.len(), failed);
    }

    Ok(())
}

fn shorten(message: &str, width: usize) -> String {
    if message.chars().count() <= width {
        return message.to_string();
    }
    let cut: String = message.chars().take(width).collect();
    format!("{}...", cut)
}
