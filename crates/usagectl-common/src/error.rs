//! Error types for usagectl

use thiserror::Error;

/// Result type alias for usagectl operations
pub type Result<T> = std::result::Result<T, UsagectlError>;

/// Main error type for usagectl
#[derive(Error, Debug)]
pub enum UsagectlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Export not found: {0}")]
    ExportNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
