//! License-metering (ILMT) source (pull only)
//!
//! Issues the three usage queries (standalone products, bundle members,
//! parent bundles) for a date range and bundles the concatenated raw
//! responses as a single exported file. ILMT has no notion of consuming
//! data, so this source carries no commit capability.

use crate::bundle::BundleFile;
use crate::error::Result;
use crate::ledger::{Export, FileAction, FileRecord, SourceType};
use crate::sources::{PullOptions, PullSummary, Source, SourceConfig};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

/// The three usage scopes queried per pull.
const USAGE_SCOPES: [&str; 3] = ["standalone", "member", "bundle"];

/// Decoded shape of a usage query response, used only for row counting
#[derive(Debug, Default, Deserialize)]
struct UsageReport {
    #[serde(default)]
    rows: Vec<serde_json::Value>,

    #[serde(default, rename = "totalRows")]
    total_rows: Option<u64>,
}

impl UsageReport {
    fn row_count(&self) -> u64 {
        self.total_rows.unwrap_or(self.rows.len() as u64)
    }
}

/// Client for a license-metering usage endpoint
#[derive(Debug)]
pub struct IlmtSource {
    name: String,
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl IlmtSource {
    /// Create a new ILMT source from its configured descriptor
    pub fn new(config: SourceConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            name: config.name,
            client,
            base_url: config.url,
            token: config.token,
        })
    }

    fn usage_url(&self, scope: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{}/api/sam/v2/license_usage?startdate={}&enddate={}&scope={}",
            self.base_url,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d"),
            scope
        )
    }

    /// Run one usage query, returning its raw body and decoded row count
    async fn query_usage(&self, scope: &str, opts: &PullOptions) -> Result<(String, u64)> {
        let url = self.usage_url(scope, opts.start_date, opts.end_date);
        let mut request = self.client.get(&url);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?.error_for_status()?;
        let body = response.text().await?;
        let report: UsageReport = serde_json::from_str(&body).unwrap_or_default();
        Ok((body, report.row_count()))
    }

    fn file_name(&self, opts: &PullOptions) -> String {
        format!(
            "ilmt-{}-{}-{}.json",
            self.name,
            opts.start_date.format("%Y%m%d"),
            opts.end_date.format("%Y%m%d")
        )
    }
}

#[async_trait]
impl Source for IlmtSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> SourceType {
        SourceType::Ilmt
    }

    async fn pull(
        &self,
        export: &mut Export,
        bundle: &mut BundleFile,
        opts: &PullOptions,
    ) -> Result<PullSummary> {
        let mut summary = PullSummary::default();
        let name = self.file_name(opts);

        if opts.dry_run {
            info!(file = %name, start = %opts.start_date, end = %opts.end_date, "Would query usage");
            summary.pulled += 1;
            return Ok(summary);
        }

        let mut bodies = Vec::new();
        let mut rows = 0u64;

        // One scope failing must not discard the other responses.
        for scope in USAGE_SCOPES {
            match self.query_usage(scope, opts).await {
                Ok((body, count)) => {
                    rows += count;
                    bodies.push(body);
                },
                Err(e) => {
                    warn!(scope, error = %e, "Usage query failed");
                    summary.errors.push(format!("{} ({}): {}", name, scope, e));
                },
            }
        }

        let mut record = FileRecord::new(name.clone(), self.name.clone(), SourceType::Ilmt);

        if bodies.is_empty() {
            record.record_error(FileAction::Pull, "all usage queries failed");
            export.merge(record);
            return Ok(summary);
        }

        let content = bodies.join("\n");
        bundle.append_entry(&name, content.as_bytes())?;

        record.size = content.len() as u64;
        record.checksum = usagectl_common::checksum::compute_checksum(
            content.as_bytes(),
            usagectl_common::types::ChecksumAlgorithm::Sha256,
        );
        export.merge(record);

        info!(file = %name, rows, "Bundled usage report");
        summary.pulled += 1;
        Ok(summary)
    }
}
