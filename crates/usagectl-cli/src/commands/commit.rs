//! `usagectl commit` command implementation
//!
//! Marks pulled data as consumed on every source that supports commit.

use crate::bundle;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::sources::{create_source, CommitOptions};
use colored::Colorize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Commit pulled records on every commit-capable source
pub async fn run(config_path: &Path, dry_run: bool) -> Result<()> {
    let mut config = Config::load(config_path)?;

    if config.sources.is_empty() {
        println!("No sources configured. Add one to {} first.", config_path.display());
        return Ok(());
    }

    let timeout = Duration::from_secs(config.api.timeout_secs);
    let mut export = config.detach_active_export();

    if export.files.is_empty() {
        println!("Nothing to commit. Run 'usagectl pull' first.");
        config.attach_export(export);
        return Ok(());
    }

    let opts = CommitOptions { dry_run };
    let mut total = 0usize;
    let mut errors = Vec::new();

    for source_config in &config.sources {
        let source = create_source(source_config, timeout)?;

        let Some(committable) = source.committable() else {
            println!(
                "{} {} ({}) does not support commit, skipping",
                "→".cyan(),
                source.name(),
                source.source_type()
            );
            continue;
        };

        println!("{} Committing {}...", "→".cyan(), source.name());
        let summary = committable.commit(&mut export, &opts).await?;
        println!(
            "{} {} record(s) on {}",
            "✓".green(),
            summary.committed,
            source.name()
        );

        total += summary.committed;
        errors.extend(summary.errors);
    }

    if dry_run {
        config.attach_export(export);
        println!("\n{} Dry run: would commit {} record(s)", "✓".green().bold(), total);
        return Ok(());
    }

    if let Some(bundle_path) = export.file_name.clone() {
        bundle::compact(&bundle_path, Some(&export.entry_names()))?;
    }

    info!(records = total, cluster = %export.source_cluster, "Commit finished");
    config.attach_export(export);
    config.save(config_path)?;

    println!("\n{} Committed {} record(s)", "✓".green().bold(), total);

    if !errors.is_empty() {
        for error in &errors {
            println!("{} {}", "✗".red(), error);
        }
        return Err(CliError::PartialFailure(errors.len()));
    }

    Ok(())
}
