//! `docferry status` command implementation
//!
//! Shows ledger totals.

use crate::error::Result;
use crate::ledger::Ledger;
use colored::Colorize;
use std::path::Path;

/// Show ledger totals
pub fn run(ledger_path: &Path, json: bool) -> Result<()> {
    if !ledger_path.exists() {
        println!("No ledger found at {}.", ledger_path.display());
        println!("Run 'docferry upload' to start.");
        return Ok(());
    }

    let summary = Ledger::open(ledger_path)?.summary()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{}", "Ledger:".cyan().bold());
    println!("  Path:         {}", ledger_path.display());
    println!("  Tracked:      {}", summary.total());
    println!("  Completed:    {}", summary.completed.to_string().green());
    if summary.failed > 0 {
        println!("  Failed:       {}", summary.failed.to_string().red());
    } else {
        println!("  Failed:       0");
    }
    println!("  Errors seen:  {}", summary.total_errors);

    Ok(())
}
