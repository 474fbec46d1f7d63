//! Export ledger types
//!
//! An [`Export`] is one batch of metering data moving through
//! pull -> commit -> push. Each file it tracks is a [`FileRecord`], keyed by
//! the `(name, source, source_type)` tuple so repeated pulls update records
//! in place instead of duplicating them. Records are never removed; the
//! ledger is the authority for which bundle entries must survive compaction.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Kind of upstream system a file was pulled from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Paginated file dataservice
    DataService,
    /// License-metering usage endpoint
    Ilmt,
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dataservice" | "data-service" => Ok(SourceType::DataService),
            "ilmt" => Ok(SourceType::Ilmt),
            other => Err(other.to_string()),
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::DataService => write!(f, "dataservice"),
            SourceType::Ilmt => write!(f, "ilmt"),
        }
    }
}

/// Last lifecycle action attempted on a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    #[default]
    Pull,
    Commit,
    Push,
}

/// Outcome of the last attempted action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActionResult {
    #[default]
    Ok,
    Error,
    DryRun,
}

/// Composite identity of a file within an export
///
/// Two records with the same key describe the same logical file; merging by
/// key is what keeps repeated pulls from duplicating ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileKey {
    pub name: String,
    pub source: String,
    pub source_type: SourceType,
}

/// Lifecycle tracker for one exported file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Identifier assigned by the upstream source (empty for sources
    /// without per-file ids)
    #[serde(default)]
    pub id: String,

    /// Bundle entry name
    pub name: String,

    /// Name of the configured source this file came from
    pub source: String,

    /// Kind of the configured source
    pub source_type: SourceType,

    /// Payload size in bytes
    #[serde(default)]
    pub size: u64,

    /// SHA-256 checksum of the payload
    #[serde(default)]
    pub checksum: String,

    /// Last action attempted on this record
    #[serde(default)]
    pub action: FileAction,

    /// Outcome of the last attempted action
    #[serde(default)]
    pub result: ActionResult,

    /// Whether the upstream source acknowledged consumption
    #[serde(default)]
    pub committed: bool,

    /// Whether the marketplace accepted the upload
    #[serde(default)]
    pub pushed: bool,

    /// Error message from the last failed action
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,

    /// Request id returned by the marketplace on upload
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub upload_id: String,
}

impl FileRecord {
    /// Create a freshly pulled record
    pub fn new(name: String, source: String, source_type: SourceType) -> Self {
        Self {
            id: String::new(),
            name,
            source,
            source_type,
            size: 0,
            checksum: String::new(),
            action: FileAction::Pull,
            result: ActionResult::Ok,
            committed: false,
            pushed: false,
            error: String::new(),
            upload_id: String::new(),
        }
    }

    /// Composite identity of this record
    pub fn key(&self) -> FileKey {
        FileKey {
            name: self.name.clone(),
            source: self.source.clone(),
            source_type: self.source_type,
        }
    }

    /// Record a successful push
    ///
    /// An empty `upload_id` means the marketplace reported the submission as
    /// a duplicate; any previously stored id is kept in that case.
    pub fn mark_pushed(&mut self, upload_id: String) {
        if !upload_id.is_empty() {
            self.upload_id = upload_id;
        }
        self.pushed = true;
        self.action = FileAction::Push;
        self.result = ActionResult::Ok;
        self.error.clear();
    }

    /// Record a successful upstream commit
    pub fn mark_committed(&mut self) {
        self.committed = true;
        self.action = FileAction::Commit;
        self.result = ActionResult::Ok;
        self.error.clear();
    }

    /// Record a failed action without aborting the surrounding stage
    pub fn record_error(&mut self, action: FileAction, message: impl Into<String>) {
        self.action = action;
        self.result = ActionResult::Error;
        self.error = message.into();
    }

    /// Record an action that was skipped because of dry-run mode
    pub fn record_dry_run(&mut self, action: FileAction) {
        self.action = action;
        self.result = ActionResult::DryRun;
    }
}

/// One batch of metering data awaiting delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Export {
    /// Path of the backing bundle file, assigned lazily on first pull
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<PathBuf>,

    /// Identifier of the origin environment
    pub source_cluster: String,

    /// Every file tracked by this export, merged by composite key
    #[serde(default)]
    pub files: Vec<FileRecord>,
}

impl Export {
    /// Create an empty export for a cluster
    pub fn new(source_cluster: String) -> Self {
        Self {
            file_name: None,
            source_cluster,
            files: Vec::new(),
        }
    }

    /// Path of the backing bundle, generated under `dir` on first use
    ///
    /// The generated name carries a UTC timestamp; once assigned it is kept
    /// for the lifetime of the export.
    pub fn bundle_path(&mut self, dir: &Path) -> PathBuf {
        if self.file_name.is_none() {
            let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
            self.file_name = Some(dir.join(format!("upload-{}.tar", stamp)));
        }
        self.file_name
            .clone()
            .unwrap_or_else(|| dir.join("upload.tar"))
    }

    /// Find a record by composite key
    pub fn find(&self, key: &FileKey) -> Option<&FileRecord> {
        self.files.iter().find(|r| &r.key() == key)
    }

    /// Find a record by bundle entry name
    pub fn find_by_name_mut(&mut self, name: &str) -> Option<&mut FileRecord> {
        self.files.iter_mut().find(|r| r.name == name)
    }

    /// Insert or replace a record by composite key
    ///
    /// Callers are expected to skip records that are already committed and
    /// pushed before merging a replacement for them.
    pub fn merge(&mut self, record: FileRecord) {
        let key = record.key();
        match self.files.iter_mut().find(|r| r.key() == key) {
            Some(existing) => *existing = record,
            None => self.files.push(record),
        }
    }

    /// Names of every bundle entry the ledger still references
    ///
    /// Used as the compaction keep-set: because records are never deleted,
    /// unpushed and uncommitted entries can never be compacted away.
    pub fn entry_names(&self) -> HashSet<String> {
        self.files.iter().map(|r| r.name.clone()).collect()
    }

    /// Counts of (pushed, committed, errored) records
    pub fn progress(&self) -> (usize, usize, usize) {
        let pushed = self.files.iter().filter(|r| r.pushed).count();
        let committed = self.files.iter().filter(|r| r.committed).count();
        let errored = self
            .files
            .iter()
            .filter(|r| r.result == ActionResult::Error)
            .count();
        (pushed, committed, errored)
    }
}
