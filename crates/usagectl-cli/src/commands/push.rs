//! `usagectl push` command implementation
//!
//! Walks the active export's bundle and uploads each entry to the
//! marketplace ingestion API, or pushes an arbitrary archive file in
//! override mode.

use crate::bundle;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::ledger::{Export, FileAction};
use crate::marketplace::{MarketplaceClient, UploadOutcome};
use crate::progress;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Tally of one push invocation
#[derive(Debug, Default)]
struct PushStats {
    pushed: usize,
    duplicates: usize,
    skipped: usize,
    would_push: usize,
    errors: Vec<String>,
}

/// Push bundle entries to the marketplace
///
/// With `file_override` every entry of that archive is pushed without
/// consulting the ledger, and neither the ledger nor the archive is touched
/// afterwards.
pub async fn run(
    config_path: &Path,
    file_override: Option<PathBuf>,
    dry_run: bool,
    force: bool,
) -> Result<()> {
    let mut config = Config::load(config_path)?;

    let client = MarketplaceClient::new(
        config.api.url.clone(),
        config.api.token.clone(),
        Duration::from_secs(config.api.timeout_secs),
    )?;

    if let Some(path) = file_override {
        if !path.exists() {
            return Err(CliError::FileNotFound(path.display().to_string()));
        }

        println!("{} Pushing entries of {}...", "→".cyan(), path.display());
        let stats = push_entries(&client, &path, None, dry_run, force).await?;
        return report(stats, dry_run);
    }

    let mut export = config.detach_active_export();
    let Some(bundle_path) = export.file_name.clone() else {
        println!("No active export bundle. Run 'usagectl pull' first.");
        config.attach_export(export);
        return Ok(());
    };

    println!("{} Pushing entries of {}...", "→".cyan(), bundle_path.display());
    let stats = push_entries(&client, &bundle_path, Some(&mut export), dry_run, force).await?;

    if !dry_run {
        bundle::compact(&bundle_path, Some(&export.entry_names()))?;
    }

    info!(
        pushed = stats.pushed,
        duplicates = stats.duplicates,
        cluster = %export.source_cluster,
        "Push finished"
    );
    config.attach_export(export);
    if !dry_run {
        config.save(config_path)?;
    }

    report(stats, dry_run)
}

/// Upload every archive entry, serially, continuing past per-entry failures
async fn push_entries(
    client: &MarketplaceClient,
    path: &Path,
    mut export: Option<&mut Export>,
    dry_run: bool,
    force: bool,
) -> Result<PushStats> {
    let entries = bundle::read_entries(path)?;
    let mut stats = PushStats::default();

    let pb = progress::create_progress_bar(entries.len() as u64, "Pushing bundle entries");

    for (entry, content) in entries {
        pb.inc(1);

        match export.as_deref_mut() {
            Some(export) => {
                let Some(record) = export.find_by_name_mut(&entry.name) else {
                    debug!(entry = %entry.name, "No ledger record for entry, skipping");
                    stats.skipped += 1;
                    continue;
                };

                if record.pushed && !force {
                    debug!(entry = %entry.name, "Already pushed, skipping");
                    stats.skipped += 1;
                    continue;
                }

                if dry_run {
                    record.record_dry_run(FileAction::Push);
                    stats.would_push += 1;
                    continue;
                }

                match client.upload(&entry.name, content).await {
                    Ok(UploadOutcome::Accepted(id)) => {
                        record.mark_pushed(id);
                        stats.pushed += 1;
                    },
                    Ok(UploadOutcome::Duplicate) => {
                        record.mark_pushed(String::new());
                        stats.duplicates += 1;
                    },
                    Err(e) => {
                        record.record_error(FileAction::Push, e.to_string());
                        stats.errors.push(format!("{}: {}", entry.name, e));
                    },
                }
            },
            None => {
                if dry_run {
                    stats.would_push += 1;
                    continue;
                }

                match client.upload(&entry.name, content).await {
                    Ok(UploadOutcome::Accepted(_)) => stats.pushed += 1,
                    Ok(UploadOutcome::Duplicate) => stats.duplicates += 1,
                    Err(e) => stats.errors.push(format!("{}: {}", entry.name, e)),
                }
            },
        }
    }

    pb.finish_and_clear();
    Ok(stats)
}

fn report(stats: PushStats, dry_run: bool) -> Result<()> {
    if dry_run {
        println!(
            "\n{} Dry run: would push {} entr{} ({} skipped)",
            "✓".green().bold(),
            stats.would_push,
            if stats.would_push == 1 { "y" } else { "ies" },
            stats.skipped
        );
        return Ok(());
    }

    println!(
        "\n{} Pushed {} entr{} ({} duplicate(s), {} skipped)",
        "✓".green().bold(),
        stats.pushed,
        if stats.pushed == 1 { "y" } else { "ies" },
        stats.duplicates,
        stats.skipped
    );

    if !stats.errors.is_empty() {
        for error in &stats.errors {
            println!("{} {}", "✗".red(), error);
        }
        return Err(CliError::PartialFailure(stats.errors.len()));
    }

    Ok(())
}
