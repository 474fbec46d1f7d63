//! Error types for the usagectl CLI
//!
//! This module provides user-friendly error types with clear, actionable messages
//! that help users understand what went wrong and how to fix it.

use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Comprehensive error type for CLI operations
///
/// All errors are designed to be user-facing with clear messages and suggestions.
#[derive(Error, Debug)]
pub enum CliError {
    /// Remote API communication failed
    #[error("API error: {0}. Check the endpoint URL and access token in your configuration.")]
    Api(String),

    /// Required file is missing
    #[error("File not found: '{0}'. Verify the file path exists and you have read permissions.")]
    FileNotFound(String),

    /// Configuration file has invalid format or content
    #[error("Invalid configuration: {0}. Run 'usagectl config show' to inspect the current settings.")]
    InvalidConfig(String),

    /// Source type tag in the configuration is not recognized
    #[error("Unsupported source type: '{0}'. Supported types are 'dataservice' and 'ilmt'.")]
    UnsupportedSourceType(String),

    /// Archive container operation failed
    #[error("Bundle error: {0}. The export archive may be corrupted; re-run 'usagectl pull' to rebuild it.")]
    Bundle(String),

    /// Downloaded file checksum verification failed
    #[error("Checksum verification failed for '{file}': expected '{expected}', got '{actual}'. The file may be corrupted. Re-run 'usagectl pull' to re-download.")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    /// Marketplace rejected an upload with a non-retryable response
    #[error("Upload rejected for '{file}' (HTTP {status}): {message}")]
    UploadRejected {
        file: String,
        status: u16,
        message: String,
    },

    /// Upload did not complete within the configured deadline
    #[error("Upload of '{file}' timed out after {secs}s. Increase api.timeout_secs or retry later.")]
    UploadTimeout { file: String, secs: u64 },

    /// One or more per-file operations failed during a stage
    #[error("{0} file(s) failed; see output above for details.")]
    PartialFailure(usize),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("Network request failed: {0}. Check your internet connection and endpoint URLs.")]
    Http(#[from] reqwest::Error),

    /// YAML parsing failed
    #[error("Failed to parse YAML: {0}. Check the file syntax at the indicated line/column.")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing failed
    #[error("Failed to parse JSON: {0}. Check the response or file syntax.")]
    JsonParse(#[from] serde_json::Error),

    /// Shared library error
    #[error(transparent)]
    Common(#[from] usagectl_common::UsagectlError),

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Create an API error
    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a bundle error
    pub fn bundle(msg: impl Into<String>) -> Self {
        Self::Bundle(msg.into())
    }

    /// Create a checksum mismatch error
    pub fn checksum_mismatch(
        file: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ChecksumMismatch {
            file: file.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
