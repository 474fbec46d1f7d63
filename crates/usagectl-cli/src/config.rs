//! Persisted configuration (usagectl.yaml)
//!
//! The configuration document carries the marketplace endpoint settings, the
//! configured sources, and the export ledger. It is the single durable store
//! the pull/commit/push stages read and persist between invocations.

use crate::error::{CliError, Result};
use crate::ledger::Export;
use crate::sources::SourceConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default marketplace API base URL when not configured.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Default overall timeout for a single upload, in seconds.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 60;

/// Default source-cluster identifier for exports.
pub const DEFAULT_CLUSTER: &str = "default";

/// Marketplace ingestion endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    /// Base URL of the ingestion API
    pub url: String,

    /// Bearer token, if the endpoint requires one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Overall per-upload timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_API_TIMEOUT_SECS
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_API_URL.to_string(),
            token: None,
            timeout_secs: DEFAULT_API_TIMEOUT_SECS,
        }
    }
}

/// Root configuration document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    /// Marketplace ingestion endpoint
    #[serde(default)]
    pub api: ApiConfig,

    /// Identifier of the environment exports originate from
    #[serde(default)]
    pub cluster: String,

    /// Directory holding export bundle files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Configured upstream sources
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// Export ledger, one entry per source-cluster
    #[serde(default)]
    pub exports: Vec<Export>,
}

impl Config {
    /// Default path of the configuration document
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("USAGECTL_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let dir = dirs::config_dir()
            .ok_or_else(|| CliError::invalid_config("Could not determine config directory"))?;
        Ok(dir.join("usagectl").join("usagectl.yaml"))
    }

    /// Load the configuration, returning defaults when the file is absent
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| CliError::invalid_config(format!("Failed to parse YAML: {}", e)))?;
        Ok(config)
    }

    /// Save the configuration, creating parent directories as needed
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Source-cluster identifier for new exports
    pub fn cluster(&self) -> &str {
        if self.cluster.is_empty() {
            DEFAULT_CLUSTER
        } else {
            &self.cluster
        }
    }

    /// Directory holding export bundles
    pub fn data_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.data_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|d| d.join("usagectl"))
            .unwrap_or_else(|| PathBuf::from(".usagectl"))
    }

    /// Detach the active export for this cluster, creating one if missing
    ///
    /// The export is removed from the document so callers can mutate it and
    /// the configured sources independently; reattach it with
    /// [`Config::attach_export`] before saving.
    pub fn detach_active_export(&mut self) -> Export {
        let cluster = self.cluster().to_string();
        match self.exports.iter().position(|e| e.source_cluster == cluster) {
            Some(idx) => self.exports.remove(idx),
            None => Export::new(cluster),
        }
    }

    /// Reattach an export detached with [`Config::detach_active_export`]
    pub fn attach_export(&mut self, export: Export) {
        self.exports.push(export);
    }

    /// Look up a configuration value by dotted key
    pub fn get(&self, key: &str) -> Result<String> {
        match key {
            "api.url" => Ok(self.api.url.clone()),
            "api.token" => Ok(self.api.token.clone().unwrap_or_default()),
            "api.timeout_secs" => Ok(self.api.timeout_secs.to_string()),
            "cluster" => Ok(self.cluster().to_string()),
            "data_dir" => Ok(self.data_dir().display().to_string()),
            _ => Err(CliError::invalid_config(format!("Unknown key: '{}'", key))),
        }
    }

    /// Set a configuration value by dotted key
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "api.url" => self.api.url = value.to_string(),
            "api.token" => {
                self.api.token = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            },
            "api.timeout_secs" => {
                self.api.timeout_secs = value.parse().map_err(|_| {
                    CliError::invalid_config(format!("Invalid timeout: '{}'", value))
                })?;
            },
            "cluster" => self.cluster = value.to_string(),
            "data_dir" => self.data_dir = Some(PathBuf::from(value)),
            _ => return Err(CliError::invalid_config(format!("Unknown key: '{}'", key))),
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::ledger::{FileRecord, SourceType};
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_returns_default() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path().join("usagectl.yaml")).unwrap();
        assert_eq!(config.api.url, DEFAULT_API_URL);
        assert!(config.exports.is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("usagectl.yaml");

        let mut config = Config::default();
        config.cluster = "cluster-a".to_string();
        config.sources.push(SourceConfig {
            name: "prod".to_string(),
            source_type: "dataservice".to_string(),
            url: "http://dataservice.local".to_string(),
            token: None,
        });

        let mut export = Export::new("cluster-a".to_string());
        export.merge(FileRecord::new(
            "usage.json".to_string(),
            "prod".to_string(),
            SourceType::DataService,
        ));
        config.attach_export(export);

        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_detach_active_export_creates_when_missing() {
        let mut config = Config::default();
        config.cluster = "cluster-a".to_string();

        let export = config.detach_active_export();
        assert_eq!(export.source_cluster, "cluster-a");
        assert!(config.exports.is_empty());

        config.attach_export(export);
        let again = config.detach_active_export();
        assert_eq!(again.source_cluster, "cluster-a");
    }

    #[test]
    fn test_get_set_round_trip() {
        let mut config = Config::default();

        config.set("api.url", "https://ingest.example.com").unwrap();
        assert_eq!(config.get("api.url").unwrap(), "https://ingest.example.com");

        config.set("api.timeout_secs", "120").unwrap();
        assert_eq!(config.get("api.timeout_secs").unwrap(), "120");

        assert!(config.set("api.timeout_secs", "soon").is_err());
        assert!(config.get("nope").is_err());
        assert!(config.set("nope", "x").is_err());
    }
}
