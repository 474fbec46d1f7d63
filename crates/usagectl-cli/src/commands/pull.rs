//! `usagectl pull` command implementation
//!
//! Pulls metering files from every configured source into the active
//! export's bundle and persists the updated ledger.

use crate::bundle::{self, BundleFile};
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::sources::{create_source, PullOptions};
use chrono::NaiveDate;
use colored::Colorize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Pull from all configured sources into the active export
pub async fn run(
    config_path: &Path,
    dry_run: bool,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<()> {
    let mut config = Config::load(config_path)?;

    if config.sources.is_empty() {
        println!("No sources configured. Add one to {} first.", config_path.display());
        return Ok(());
    }

    let mut opts = PullOptions {
        dry_run,
        ..PullOptions::default()
    };
    if let Some(start) = start_date {
        opts.start_date = start;
    }
    if let Some(end) = end_date {
        opts.end_date = end;
    }

    let data_dir = config.data_dir();
    let timeout = Duration::from_secs(config.api.timeout_secs);

    let mut export = config.detach_active_export();
    let bundle_path = export.bundle_path(&data_dir);
    let bundle_existed = bundle_path.exists();
    let mut bundle = BundleFile::open(&bundle_path)?;

    let mut total = 0usize;
    let mut errors = Vec::new();

    for source_config in &config.sources {
        let source = create_source(source_config, timeout)?;
        println!(
            "{} Pulling from {} ({})...",
            "→".cyan(),
            source.name(),
            source.source_type()
        );

        let summary = source.pull(&mut export, &mut bundle, &opts).await?;
        println!(
            "{} {} file(s) from {}",
            "✓".green(),
            summary.pulled,
            source.name()
        );

        total += summary.pulled;
        errors.extend(summary.errors);
    }

    bundle.close()?;

    if dry_run {
        // Nothing was appended; drop the bundle if this invocation created it.
        if !bundle_existed {
            let _ = std::fs::remove_file(&bundle_path);
        }
        println!("\n{} Dry run: would pull {} file(s)", "✓".green().bold(), total);
        return Ok(());
    }

    // Dedup superseded entries; ledger names are the keep-set, so records
    // not yet pushed or committed always survive.
    bundle::compact(&bundle_path, Some(&export.entry_names()))?;

    info!(files = total, cluster = %export.source_cluster, "Pull finished");
    config.attach_export(export);
    config.save(config_path)?;

    println!("\n{} Pulled {} file(s)", "✓".green().bold(), total);
    println!("Bundle: {}", bundle_path.display());

    if !errors.is_empty() {
        for error in &errors {
            println!("{} {}", "✗".red(), error);
        }
        return Err(CliError::PartialFailure(errors.len()));
    }

    Ok(())
}
