//! Marketplace ingestion API client
//!
//! Delivers one bundle entry per call to the `/metrics` endpoint with bounded
//! retry. Responses the remote marks retryable (and transient transport
//! failures) are retried with capped exponential backoff; HTTP 409 means the
//! marketplace already holds the submission and is reported as a duplicate
//! outcome rather than an error.

use crate::error::{CliError, Result};
use rand::Rng;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

// ============================================================================
// Upload Retry Constants
// ============================================================================

/// Maximum upload attempts per file, including the first.
const RETRY_ATTEMPTS: u32 = 4;

/// Delay before the second attempt.
const RETRY_INITIAL_DELAY: Duration = Duration::from_millis(50);

/// Multiplier applied to the delay after every failed attempt.
const RETRY_FACTOR: u32 = 5;

/// Fraction of the delay randomized to spread concurrent retries.
const RETRY_JITTER: f64 = 0.1;

/// Response body of the ingestion endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadResponse {
    #[serde(default, rename = "requestId")]
    pub request_id: String,

    /// One of `success`, `inProgress`, `failed`
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub message: String,

    #[serde(default, rename = "errorCode")]
    pub error_code: String,

    #[serde(default)]
    pub details: UploadDetails,
}

/// Structured failure details of an upload response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadDetails {
    #[serde(default)]
    pub retryable: bool,
}

/// Result of a completed upload call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The marketplace accepted the submission under this request id
    Accepted(String),
    /// The marketplace already holds this submission; nothing to do
    Duplicate,
}

/// Outcome of one upload attempt, before retry classification
enum Attempt {
    Done(UploadOutcome),
    Retry(String),
}

/// Client for the marketplace ingestion API
pub struct MarketplaceClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl MarketplaceClient {
    /// Create a new client
    ///
    /// `timeout` bounds the whole upload of a single file, retries included.
    pub fn new(base_url: String, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            token,
            timeout,
        })
    }

    /// Base URL of the ingestion API
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Upload one file's content to the ingestion endpoint
    ///
    /// Retries attempts the remote marks retryable with capped exponential
    /// backoff. Exceeding the overall deadline yields a timeout error, kept
    /// distinct from a remote rejection.
    pub async fn upload(&self, file_name: &str, content: Vec<u8>) -> Result<UploadOutcome> {
        match tokio::time::timeout(self.timeout, self.upload_with_retry(file_name, content)).await
        {
            Ok(result) => result,
            Err(_) => Err(CliError::UploadTimeout {
                file: file_name.to_string(),
                secs: self.timeout.as_secs(),
            }),
        }
    }

    async fn upload_with_retry(&self, file_name: &str, content: Vec<u8>) -> Result<UploadOutcome> {
        let mut delay = RETRY_INITIAL_DELAY;
        let mut last_reason = String::new();

        for attempt in 1..=RETRY_ATTEMPTS {
            if attempt > 1 {
                tokio::time::sleep(with_jitter(delay)).await;
                delay *= RETRY_FACTOR;
            }

            match self.try_upload(file_name, content.clone()).await? {
                Attempt::Done(outcome) => {
                    debug!(file = file_name, attempt, "Upload finished");
                    return Ok(outcome);
                },
                Attempt::Retry(reason) => {
                    warn!(file = file_name, attempt, reason = %reason, "Upload attempt failed, will retry");
                    last_reason = reason;
                },
            }
        }

        Err(CliError::api(format!(
            "upload of '{}' failed after {} attempts: {}",
            file_name, RETRY_ATTEMPTS, last_reason
        )))
    }

    /// Perform a single upload attempt
    async fn try_upload(&self, file_name: &str, content: Vec<u8>) -> Result<Attempt> {
        let part = Part::bytes(content)
            .file_name(file_name.to_string())
            .mime_str("application/gzip")?;
        let form = Form::new().part(part_name(file_name), part);

        let mut request = self
            .client
            .post(format!("{}/metrics", self.base_url))
            .multipart(form);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            // Transport failures are transient by classification.
            Err(e) => return Ok(Attempt::Retry(format!("request failed: {}", e))),
        };

        let status = response.status();
        if status == StatusCode::CONFLICT {
            return Ok(Attempt::Done(UploadOutcome::Duplicate));
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return Ok(Attempt::Retry(format!("failed to read response: {}", e))),
        };
        let body: UploadResponse = serde_json::from_str(&text).unwrap_or_default();

        if status.is_success() {
            if body.status == "failed" {
                if body.details.retryable {
                    return Ok(Attempt::Retry(describe(&body)));
                }
                return Err(CliError::UploadRejected {
                    file: file_name.to_string(),
                    status: status.as_u16(),
                    message: describe(&body),
                });
            }
            return Ok(Attempt::Done(UploadOutcome::Accepted(body.request_id)));
        }

        if retryable_status(status) || body.details.retryable {
            return Ok(Attempt::Retry(format!("HTTP {}: {}", status, describe(&body))));
        }

        Err(CliError::UploadRejected {
            file: file_name.to_string(),
            status: status.as_u16(),
            message: describe(&body),
        })
    }
}

/// Multipart part name: the file's base name without extension
fn part_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string())
}

/// Whether an HTTP status is worth retrying on its own
fn retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Apply bounded random jitter to a backoff delay
fn with_jitter(delay: Duration) -> Duration {
    let factor = 1.0 + rand::thread_rng().gen_range(-RETRY_JITTER..=RETRY_JITTER);
    delay.mul_f64(factor)
}

fn describe(body: &UploadResponse) -> String {
    if body.message.is_empty() && body.error_code.is_empty() {
        return "no error details in response".to_string();
    }
    if body.error_code.is_empty() {
        return body.message.clone();
    }
    format!("{} ({})", body.message, body.error_code)
}
