//! Upstream metering sources
//!
//! A source can always be pulled from; only some variants can also be
//! committed (marking the upstream data as consumed). Commit support is a
//! separate capability queried at the commit stage — a source without it is
//! skipped, not an error.

pub mod dataservice;
pub mod ilmt;

use crate::bundle::BundleFile;
use crate::error::{CliError, Result};
use crate::ledger::{Export, SourceType};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use dataservice::DataServiceSource;
pub use ilmt::IlmtSource;

/// Configured descriptor of one upstream source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    /// Name the ledger records reference this source by
    pub name: String,

    /// Type tag, validated by the factory
    #[serde(rename = "type")]
    pub source_type: String,

    /// Base URL of the source endpoint
    pub url: String,

    /// Bearer token, if the endpoint requires one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Options shared by every pull call
#[derive(Debug, Clone)]
pub struct PullOptions {
    /// Report what would be pulled without downloading or appending
    pub dry_run: bool,

    /// Start of the usage window for date-ranged sources
    pub start_date: NaiveDate,

    /// End of the usage window for date-ranged sources
    pub end_date: NaiveDate,
}

impl Default for PullOptions {
    fn default() -> Self {
        let end_date = Utc::now().date_naive();
        Self {
            dry_run: false,
            start_date: end_date - ChronoDuration::days(30),
            end_date,
        }
    }
}

/// Options shared by every commit call
#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    /// Report what would be committed without deleting upstream data
    pub dry_run: bool,
}

/// Aggregate result of one source's pull
#[derive(Debug, Default)]
pub struct PullSummary {
    /// Files newly found or refreshed by this pull
    pub pulled: usize,

    /// Per-file failures that did not abort the pull
    pub errors: Vec<String>,
}

/// Aggregate result of one source's commit
#[derive(Debug, Default)]
pub struct CommitSummary {
    /// Records acknowledged upstream by this commit
    pub committed: usize,

    /// Per-record failures that did not abort the commit
    pub errors: Vec<String>,
}

/// An upstream system metering files can be pulled from
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Configured name of this source
    fn name(&self) -> &str;

    /// Kind of this source
    fn source_type(&self) -> SourceType;

    /// Enumerate remote files and stream them into the bundle
    ///
    /// Merges one record per file into the export ledger. Individual file
    /// failures are recorded on their records and reported in the summary;
    /// only a failure to reach the source at all is returned as an error.
    async fn pull(
        &self,
        export: &mut Export,
        bundle: &mut BundleFile,
        opts: &PullOptions,
    ) -> Result<PullSummary>;

    /// Commit capability of this source, if it has one
    fn committable(&self) -> Option<&dyn Committable> {
        None
    }
}

/// Capability of marking pulled data as consumed upstream
#[async_trait]
pub trait Committable: Send + Sync {
    /// Acknowledge every uncommitted record of this source upstream
    ///
    /// Symmetric partial-failure semantics with pull: per-record failures
    /// are recorded and aggregated, the rest of the records proceed.
    async fn commit(&self, export: &mut Export, opts: &CommitOptions) -> Result<CommitSummary>;
}

/// Build the concrete source for a configured descriptor
///
/// Fails with [`CliError::UnsupportedSourceType`] before any I/O when the
/// type tag is unrecognized.
pub fn create_source(config: &SourceConfig, timeout: Duration) -> Result<Box<dyn Source>> {
    match config.source_type.parse::<SourceType>() {
        Ok(SourceType::DataService) => {
            Ok(Box::new(DataServiceSource::new(config.clone(), timeout)?))
        },
        Ok(SourceType::Ilmt) => Ok(Box::new(IlmtSource::new(config.clone(), timeout)?)),
        Err(tag) => Err(CliError::UnsupportedSourceType(tag)),
    }
}
