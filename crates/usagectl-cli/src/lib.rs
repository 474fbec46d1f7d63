//! usagectl CLI Library
//!
//! Command-line tool for exporting metering data to a marketplace
//! ingestion API.
//!
//! # Overview
//!
//! usagectl moves metering data through a three-stage lifecycle:
//!
//! - **Pull**: download files from configured sources into an append-only
//!   bundle (`usagectl pull`)
//! - **Commit**: mark pulled data as consumed on sources that support it
//!   (`usagectl commit`)
//! - **Push**: upload bundle entries to the marketplace (`usagectl push`)
//! - **Status Checking**: inspect export progress (`usagectl status`)
//! - **Configuration**: manage CLI settings (`usagectl config`)

pub mod bundle;
pub mod commands;
pub mod config;
pub mod error;
pub mod ledger;
pub mod marketplace;
pub mod progress;
pub mod sources;

// Re-export commonly used types
pub use config::Config;
pub use error::{CliError, Result};
pub use ledger::{Export, FileRecord};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// usagectl - Metering Data Export Tool
#[derive(Parser, Debug)]
#[command(name = "usagectl")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(long, env = "USAGECTL_CONFIG", global = true)]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pull metering files from configured sources into the export bundle
    Pull {
        /// Report what would be pulled without downloading anything
        #[arg(long)]
        dry_run: bool,

        /// Start of the usage window (YYYY-MM-DD, date-ranged sources only)
        #[arg(long)]
        start_date: Option<NaiveDate>,

        /// End of the usage window (YYYY-MM-DD, date-ranged sources only)
        #[arg(long)]
        end_date: Option<NaiveDate>,
    },

    /// Mark pulled data as consumed on sources that support commit
    Commit {
        /// Report what would be committed without deleting upstream data
        #[arg(long)]
        dry_run: bool,
    },

    /// Upload bundle entries to the marketplace ingestion API
    Push {
        /// Push this archive file instead of the active export bundle
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Report what would be pushed without uploading anything
        #[arg(long)]
        dry_run: bool,

        /// Re-push entries already marked as pushed
        #[arg(long)]
        force: bool,
    },

    /// Show configured sources and export progress
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Get configuration value
    Get {
        /// Configuration key (e.g., "api.url")
        key: String,
    },

    /// Set configuration value
    Set {
        /// Configuration key (e.g., "api.url")
        key: String,

        /// Configuration value
        value: String,
    },

    /// Show all configuration
    Show,
}
