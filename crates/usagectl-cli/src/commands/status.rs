//! `usagectl status` command implementation
//!
//! Shows configured sources and the state of every export.

use crate::config::Config;
use crate::error::Result;
use crate::ledger::ActionResult;
use crate::progress::format_bytes;
use colored::Colorize;
use std::path::Path;

/// Show configured sources and export progress
pub async fn run(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;

    if config.sources.is_empty() {
        println!("No sources configured.");
        println!("Add sources to {} and run 'usagectl pull'.", config_path.display());
    } else {
        println!("{}", "Sources:".cyan().bold());
        for source in &config.sources {
            println!("  {} ({}) {}", source.name.green(), source.source_type, source.url);
        }
        println!();
    }

    if config.exports.is_empty() {
        println!("No exports yet. Run 'usagectl pull' to create one.");
        return Ok(());
    }

    for export in &config.exports {
        println!("{} {}", "Export:".cyan().bold(), export.source_cluster);
        if let Some(ref bundle) = export.file_name {
            println!("  Bundle: {}", bundle.display());
        }

        for record in &export.files {
            let state = if record.result == ActionResult::Error {
                "error".red()
            } else if record.pushed && record.committed {
                "delivered".green()
            } else if record.pushed {
                "pushed".green()
            } else if record.committed {
                "committed".yellow()
            } else {
                "pulled".normal()
            };

            println!(
                "  {} [{}] {} ({}, {})",
                record.name,
                state,
                record.source,
                record.source_type,
                format_bytes(record.size)
            );
            if !record.error.is_empty() {
                println!("    {} {}", "✗".red(), record.error);
            }
        }

        let (pushed, committed, errored) = export.progress();
        println!(
            "  {} {} file(s): {} pushed, {} committed, {} error(s)",
            "Summary:".cyan(),
            export.files.len(),
            pushed,
            committed,
            errored
        );
        println!();
    }

    Ok(())
}
