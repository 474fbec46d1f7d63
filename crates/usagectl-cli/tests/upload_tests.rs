//! Integration tests for the marketplace upload client
//!
//! These tests validate the upload retry/backoff behavior against a mock
//! ingestion endpoint:
//! - Duplicate (409) handling
//! - Retry on retryable responses, bounded attempts
//! - Terminal rejection without retry
//! - Overall upload timeout

use std::time::{Duration, Instant};
use usagectl_cli::error::CliError;
use usagectl_cli::marketplace::{MarketplaceClient, UploadOutcome};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, timeout: Duration) -> MarketplaceClient {
    MarketplaceClient::new(server.uri(), None, timeout).expect("client")
}

fn success_body(request_id: &str) -> serde_json::Value {
    serde_json::json!({
        "requestId": request_id,
        "status": "success",
        "message": "",
        "errorCode": "",
        "details": { "retryable": false }
    })
}

fn retryable_body() -> serde_json::Value {
    serde_json::json!({
        "requestId": "",
        "status": "failed",
        "message": "try again shortly",
        "errorCode": "E_BUSY",
        "details": { "retryable": true }
    })
}

#[tokio::test]
async fn test_upload_success_returns_request_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body("req-100")))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client(&server, Duration::from_secs(30))
        .upload("usage.tar", b"payload".to_vec())
        .await
        .expect("upload");

    assert_eq!(outcome, UploadOutcome::Accepted("req-100".to_string()));
}

#[tokio::test]
async fn test_upload_conflict_is_duplicate_not_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/metrics"))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client(&server, Duration::from_secs(30))
        .upload("usage.tar", b"payload".to_vec())
        .await
        .expect("duplicate is not an error");

    assert_eq!(outcome, UploadOutcome::Duplicate);
}

#[tokio::test]
async fn test_upload_retries_then_succeeds() {
    let server = MockServer::start().await;

    // Three retryable responses, then success on the fourth attempt.
    Mock::given(method("POST"))
        .and(path("/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(retryable_body()))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body("req-4")))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client(&server, Duration::from_secs(30))
        .upload("usage.tar", b"payload".to_vec())
        .await
        .expect("fourth attempt succeeds");

    assert_eq!(outcome, UploadOutcome::Accepted("req-4".to_string()));
}

#[tokio::test]
async fn test_upload_exhausts_retries() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/metrics"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&server)
        .await;

    let start = Instant::now();
    let result = client(&server, Duration::from_secs(30))
        .upload("usage.tar", b"payload".to_vec())
        .await;

    assert!(matches!(result.unwrap_err(), CliError::Api(_)));
    // Backoff is 50ms + 250ms + 1250ms plus jitter; well under the deadline.
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_upload_rejection_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/metrics"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "requestId": "",
            "status": "failed",
            "message": "malformed report",
            "errorCode": "E_BAD",
            "details": { "retryable": false }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server, Duration::from_secs(30))
        .upload("usage.tar", b"payload".to_vec())
        .await;

    match result.unwrap_err() {
        CliError::UploadRejected { status, message, .. } => {
            assert_eq!(status, 400);
            assert!(message.contains("malformed report"));
        },
        other => panic!("expected UploadRejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_upload_timeout_is_distinct_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/metrics"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(success_body("req-slow"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let result = client(&server, Duration::from_millis(250))
        .upload("usage.tar", b"payload".to_vec())
        .await;

    assert!(matches!(result.unwrap_err(), CliError::UploadTimeout { .. }));
}
