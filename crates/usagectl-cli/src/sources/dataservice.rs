//! Dataservice source (pull + commit)
//!
//! Pulls metering files from a paginated dataservice endpoint and can commit
//! them back (delete-by-id) once they are safely bundled.

use crate::bundle::BundleFile;
use crate::error::{CliError, Result};
use crate::ledger::{Export, FileAction, FileKey, FileRecord, SourceType};
use crate::sources::{
    CommitOptions, CommitSummary, Committable, PullOptions, PullSummary, Source, SourceConfig,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Files requested per listing page.
const PAGE_SIZE: u32 = 100;

/// One page of the remote file listing
#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteFile>,

    #[serde(default, rename = "nextPageToken")]
    next_page_token: String,
}

/// One file as enumerated by the dataservice
#[derive(Debug, Deserialize)]
struct RemoteFile {
    id: String,
    name: String,

    #[serde(default)]
    size: u64,

    /// SHA-256 the dataservice computed at ingest time, when available
    #[serde(default)]
    checksum: String,
}

/// Client for a dataservice endpoint
#[derive(Debug)]
pub struct DataServiceSource {
    name: String,
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl DataServiceSource {
    /// Create a new dataservice source from its configured descriptor
    pub fn new(config: SourceConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            name: config.name,
            client,
            base_url: config.url,
            token: config.token,
        })
    }

    fn list_url(&self, page_token: &str) -> String {
        let mut url = format!(
            "{}/v1/files?pageSize={}&includeDeleted=false",
            self.base_url, PAGE_SIZE
        );
        if !page_token.is_empty() {
            url.push_str(&format!("&pageToken={}", page_token));
        }
        url
    }

    async fn list_page(&self, page_token: &str) -> Result<FileList> {
        let mut request = self.client.get(self.list_url(page_token));
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn download(&self, id: &str) -> Result<Vec<u8>> {
        let url = format!("{}/v1/files/{}/download", self.base_url, id);
        let mut request = self.client.get(&url);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let url = format!("{}/v1/files/{}", self.base_url, id);
        let mut request = self.client.delete(&url);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        request.send().await?.error_for_status()?;
        Ok(())
    }

    /// Download one remote file, verify it, and append it to the bundle
    async fn pull_file(
        &self,
        remote: &RemoteFile,
        bundle: &mut BundleFile,
    ) -> Result<FileRecord> {
        let bytes = self.download(&remote.id).await?;

        let checksum = usagectl_common::checksum::compute_checksum(
            &bytes,
            usagectl_common::types::ChecksumAlgorithm::Sha256,
        );
        if !remote.checksum.is_empty() && checksum != remote.checksum {
            return Err(CliError::checksum_mismatch(
                &remote.name,
                &remote.checksum,
                checksum,
            ));
        }

        bundle.append_entry(&remote.name, &bytes)?;

        let mut record =
            FileRecord::new(remote.name.clone(), self.name.clone(), SourceType::DataService);
        record.id = remote.id.clone();
        record.size = bytes.len() as u64;
        record.checksum = checksum;
        Ok(record)
    }
}

#[async_trait]
impl Source for DataServiceSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> SourceType {
        SourceType::DataService
    }

    async fn pull(
        &self,
        export: &mut Export,
        bundle: &mut BundleFile,
        opts: &PullOptions,
    ) -> Result<PullSummary> {
        let mut summary = PullSummary::default();
        let mut page_token = String::new();

        loop {
            let page = self.list_page(&page_token).await?;
            debug!(source = %self.name, files = page.files.len(), "Fetched listing page");

            for remote in &page.files {
                let key = FileKey {
                    name: remote.name.clone(),
                    source: self.name.clone(),
                    source_type: SourceType::DataService,
                };

                // Files already delivered and acknowledged stay untouched.
                if export.find(&key).map_or(false, |r| r.committed && r.pushed) {
                    debug!(file = %remote.name, "Skipping delivered file");
                    continue;
                }

                if opts.dry_run {
                    info!(file = %remote.name, size = remote.size, "Would pull");
                    summary.pulled += 1;
                    continue;
                }

                match self.pull_file(remote, bundle).await {
                    Ok(record) => {
                        export.merge(record);
                        summary.pulled += 1;
                    },
                    Err(e) => {
                        warn!(file = %remote.name, error = %e, "Failed to pull file");
                        let mut failed = FileRecord::new(
                            remote.name.clone(),
                            self.name.clone(),
                            SourceType::DataService,
                        );
                        failed.id = remote.id.clone();
                        failed.record_error(FileAction::Pull, e.to_string());
                        export.merge(failed);
                        summary.errors.push(format!("{}: {}", remote.name, e));
                    },
                }
            }

            if page.next_page_token.is_empty() {
                break;
            }
            page_token = page.next_page_token;
        }

        Ok(summary)
    }

    fn committable(&self) -> Option<&dyn Committable> {
        Some(self)
    }
}

#[async_trait]
impl Committable for DataServiceSource {
    async fn commit(&self, export: &mut Export, opts: &CommitOptions) -> Result<CommitSummary> {
        let mut summary = CommitSummary::default();

        for idx in 0..export.files.len() {
            {
                let record = &export.files[idx];
                if record.source != self.name
                    || record.source_type != SourceType::DataService
                    || record.committed
                {
                    continue;
                }
                if record.id.is_empty() {
                    debug!(file = %record.name, "Record has no remote id, nothing to commit");
                    continue;
                }
            }

            if opts.dry_run {
                let record = &mut export.files[idx];
                info!(file = %record.name, id = %record.id, "Would commit");
                record.record_dry_run(FileAction::Commit);
                summary.committed += 1;
                continue;
            }

            let id = export.files[idx].id.clone();
            match self.delete(&id).await {
                Ok(()) => {
                    export.files[idx].mark_committed();
                    summary.committed += 1;
                },
                Err(e) => {
                    let record = &mut export.files[idx];
                    warn!(file = %record.name, error = %e, "Failed to commit file");
                    record.record_error(FileAction::Commit, e.to_string());
                    summary.errors.push(format!("{}: {}", record.name, e));
                },
            }
        }

        Ok(summary)
    }
}
