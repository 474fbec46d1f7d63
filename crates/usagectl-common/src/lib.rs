//! usagectl Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the usagectl project.
//!
//! # Overview
//!
//! This crate provides common functionality used across all usagectl
//! workspace members:
//!
//! - **Error Handling**: Custom error types and result types
//! - **Checksums**: File integrity verification utilities
//! - **Logging**: Centralized tracing configuration
//!
//! # Example
//!
//! ```no_run
//! use usagectl_common::{Result, UsagectlError};
//! use usagectl_common::checksum;
//! use usagectl_common::types::ChecksumAlgorithm;
//!
//! fn fingerprint(data: &[u8]) -> Result<()> {
//!     let digest = checksum::compute_checksum(data, ChecksumAlgorithm::Sha256);
//!     println!("Payload checksum: {}", digest);
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, UsagectlError};
