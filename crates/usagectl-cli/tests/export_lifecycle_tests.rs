//! End-to-end tests for the pull/commit/push lifecycle
//!
//! These tests drive the command implementations against mock dataservice
//! and marketplace endpoints, validating:
//! - Paginated pull with ledger dedup
//! - Partial pull failure semantics
//! - Commit flag updates and dry-run behavior
//! - Push status bookkeeping, duplicate handling, and dry-run no-op

use std::path::PathBuf;
use tempfile::TempDir;
use usagectl_cli::bundle;
use usagectl_cli::config::Config;
use usagectl_cli::error::CliError;
use usagectl_cli::ledger::SourceType;
use usagectl_cli::sources::SourceConfig;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Write a config pointing at the mock servers, return its path
fn write_config(dir: &TempDir, source_url: &str, api_url: &str) -> PathBuf {
    let config_path = dir.path().join("usagectl.yaml");

    let mut config = Config::default();
    config.cluster = "test-cluster".to_string();
    config.data_dir = Some(dir.path().join("data"));
    config.api.url = api_url.to_string();
    config.api.timeout_secs = 30;
    config.sources.push(SourceConfig {
        name: "ds".to_string(),
        source_type: "dataservice".to_string(),
        url: source_url.to_string(),
        token: None,
    });

    config.save(&config_path).expect("write config");
    config_path
}

fn file_listing(files: serde_json::Value, next: &str) -> serde_json::Value {
    serde_json::json!({ "files": files, "nextPageToken": next })
}

async fn mount_download(server: &MockServer, id: &str, content: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/files/{}/download", id)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.as_bytes()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_pull_paginates_and_records_files() {
    let source = MockServer::start().await;
    let dir = TempDir::new().expect("tempdir");
    let config_path = write_config(&dir, &source.uri(), "http://localhost:1");

    Mock::given(method("GET"))
        .and(path("/v1/files"))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_listing(
            serde_json::json!([
                { "id": "f1", "name": "usage-1.json", "size": 6 },
                { "id": "f2", "name": "usage-2.json", "size": 6 }
            ]),
            "page-2",
        )))
        .mount(&source)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/files"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_listing(
            serde_json::json!([
                { "id": "f3", "name": "usage-3.json", "size": 6 }
            ]),
            "",
        )))
        .mount(&source)
        .await;

    mount_download(&source, "f1", "first!").await;
    mount_download(&source, "f2", "second").await;
    mount_download(&source, "f3", "third!").await;

    usagectl_cli::commands::pull::run(&config_path, false, None, None)
        .await
        .expect("pull");

    let config = Config::load(&config_path).expect("reload config");
    assert_eq!(config.exports.len(), 1);

    let export = &config.exports[0];
    assert_eq!(export.source_cluster, "test-cluster");
    assert_eq!(export.files.len(), 3);
    assert!(export.files.iter().all(|r| !r.pushed && !r.committed));
    assert!(export
        .files
        .iter()
        .all(|r| r.source_type == SourceType::DataService && !r.checksum.is_empty()));

    // The bundle holds one entry per pulled file.
    let bundle_path = export.file_name.clone().expect("bundle path");
    let entries = bundle::read_entries(&bundle_path).expect("read bundle");
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].1, b"first!");
}

#[tokio::test]
async fn test_pull_twice_dedups_ledger() {
    let source = MockServer::start().await;
    let dir = TempDir::new().expect("tempdir");
    let config_path = write_config(&dir, &source.uri(), "http://localhost:1");

    Mock::given(method("GET"))
        .and(path("/v1/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_listing(
            serde_json::json!([{ "id": "f1", "name": "usage-1.json", "size": 6 }]),
            "",
        )))
        .mount(&source)
        .await;
    mount_download(&source, "f1", "first!").await;

    usagectl_cli::commands::pull::run(&config_path, false, None, None)
        .await
        .expect("first pull");
    usagectl_cli::commands::pull::run(&config_path, false, None, None)
        .await
        .expect("second pull");

    let config = Config::load(&config_path).expect("reload config");
    assert_eq!(config.exports.len(), 1);
    assert_eq!(config.exports[0].files.len(), 1);

    // Re-pulled duplicates are superseded in the bundle by compaction.
    let bundle_path = config.exports[0].file_name.clone().expect("bundle path");
    let entries = bundle::read_entries(&bundle_path).expect("read bundle");
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_pull_partial_failure_keeps_other_files() {
    let source = MockServer::start().await;
    let dir = TempDir::new().expect("tempdir");
    let config_path = write_config(&dir, &source.uri(), "http://localhost:1");

    Mock::given(method("GET"))
        .and(path("/v1/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_listing(
            serde_json::json!([
                { "id": "f1", "name": "usage-1.json", "size": 6 },
                { "id": "f2", "name": "usage-2.json", "size": 6 },
                { "id": "f3", "name": "usage-3.json", "size": 6 }
            ]),
            "",
        )))
        .mount(&source)
        .await;

    mount_download(&source, "f1", "first!").await;
    // f2's download fails outright.
    Mock::given(method("GET"))
        .and(path("/v1/files/f2/download"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&source)
        .await;
    mount_download(&source, "f3", "third!").await;

    let result = usagectl_cli::commands::pull::run(&config_path, false, None, None).await;
    assert!(matches!(result.unwrap_err(), CliError::PartialFailure(1)));

    let config = Config::load(&config_path).expect("reload config");
    let export = &config.exports[0];
    assert_eq!(export.files.len(), 3);

    let ok: Vec<_> = export.files.iter().filter(|r| r.error.is_empty()).collect();
    assert_eq!(ok.len(), 2);

    let failed = export
        .files
        .iter()
        .find(|r| r.name == "usage-2.json")
        .expect("failed record");
    assert!(!failed.error.is_empty());
}

#[tokio::test]
async fn test_commit_flips_flags_and_deletes_upstream() {
    let source = MockServer::start().await;
    let dir = TempDir::new().expect("tempdir");
    let config_path = write_config(&dir, &source.uri(), "http://localhost:1");

    Mock::given(method("GET"))
        .and(path("/v1/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_listing(
            serde_json::json!([{ "id": "f1", "name": "usage-1.json", "size": 6 }]),
            "",
        )))
        .mount(&source)
        .await;
    mount_download(&source, "f1", "first!").await;

    Mock::given(method("DELETE"))
        .and(path("/v1/files/f1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&source)
        .await;

    usagectl_cli::commands::pull::run(&config_path, false, None, None)
        .await
        .expect("pull");
    usagectl_cli::commands::commit::run(&config_path, false)
        .await
        .expect("commit");

    let config = Config::load(&config_path).expect("reload config");
    let record = &config.exports[0].files[0];
    assert!(record.committed);
    assert!(!record.pushed);

    // The committed entry is still unpushed and must survive compaction.
    let bundle_path = config.exports[0].file_name.clone().expect("bundle path");
    let entries = bundle::read_entries(&bundle_path).expect("read bundle");
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_commit_dry_run_deletes_nothing() {
    let source = MockServer::start().await;
    let dir = TempDir::new().expect("tempdir");
    let config_path = write_config(&dir, &source.uri(), "http://localhost:1");

    Mock::given(method("GET"))
        .and(path("/v1/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_listing(
            serde_json::json!([{ "id": "f1", "name": "usage-1.json", "size": 6 }]),
            "",
        )))
        .mount(&source)
        .await;
    mount_download(&source, "f1", "first!").await;

    Mock::given(method("DELETE"))
        .and(path("/v1/files/f1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&source)
        .await;

    usagectl_cli::commands::pull::run(&config_path, false, None, None)
        .await
        .expect("pull");
    usagectl_cli::commands::commit::run(&config_path, true)
        .await
        .expect("dry-run commit");

    let config = Config::load(&config_path).expect("reload config");
    assert!(!config.exports[0].files[0].committed);
}

#[tokio::test]
async fn test_push_marks_records_and_handles_duplicates() {
    let source = MockServer::start().await;
    let marketplace = MockServer::start().await;
    let dir = TempDir::new().expect("tempdir");
    let config_path = write_config(&dir, &source.uri(), &marketplace.uri());

    Mock::given(method("GET"))
        .and(path("/v1/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_listing(
            serde_json::json!([
                { "id": "f1", "name": "usage-1.json", "size": 6 },
                { "id": "f2", "name": "usage-2.json", "size": 6 }
            ]),
            "",
        )))
        .mount(&source)
        .await;
    mount_download(&source, "f1", "first!").await;
    mount_download(&source, "f2", "second").await;

    // First entry accepted, second already known to the marketplace.
    Mock::given(method("POST"))
        .and(path("/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "requestId": "req-1", "status": "success"
        })))
        .up_to_n_times(1)
        .mount(&marketplace)
        .await;
    Mock::given(method("POST"))
        .and(path("/metrics"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&marketplace)
        .await;

    usagectl_cli::commands::pull::run(&config_path, false, None, None)
        .await
        .expect("pull");
    usagectl_cli::commands::push::run(&config_path, None, false, false)
        .await
        .expect("push");

    let config = Config::load(&config_path).expect("reload config");
    let export = &config.exports[0];
    assert!(export.files.iter().all(|r| r.pushed));

    let accepted = export
        .files
        .iter()
        .find(|r| r.name == "usage-1.json")
        .expect("record");
    assert_eq!(accepted.upload_id, "req-1");

    // Pushing again skips both records without calling the marketplace.
    usagectl_cli::commands::push::run(&config_path, None, false, false)
        .await
        .expect("idempotent push");
    assert_eq!(marketplace.received_requests().await.map_or(0, |r| r.len()), 2);
}

#[tokio::test]
async fn test_push_dry_run_never_uploads() {
    let source = MockServer::start().await;
    let marketplace = MockServer::start().await;
    let dir = TempDir::new().expect("tempdir");
    let config_path = write_config(&dir, &source.uri(), &marketplace.uri());

    Mock::given(method("GET"))
        .and(path("/v1/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_listing(
            serde_json::json!([{ "id": "f1", "name": "usage-1.json", "size": 6 }]),
            "",
        )))
        .mount(&source)
        .await;
    mount_download(&source, "f1", "first!").await;

    Mock::given(method("POST"))
        .and(path("/metrics"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&marketplace)
        .await;

    usagectl_cli::commands::pull::run(&config_path, false, None, None)
        .await
        .expect("pull");
    usagectl_cli::commands::push::run(&config_path, None, true, false)
        .await
        .expect("dry-run push");

    let config = Config::load(&config_path).expect("reload config");
    assert!(!config.exports[0].files[0].pushed);
}

#[tokio::test]
async fn test_push_override_file_bypasses_ledger() {
    let marketplace = MockServer::start().await;
    let dir = TempDir::new().expect("tempdir");
    let config_path = write_config(&dir, "http://localhost:1", &marketplace.uri());

    // Build a standalone archive that no ledger knows about.
    let archive_path = dir.path().join("standalone.tar");
    let mut bundle_file = usagectl_cli::bundle::BundleFile::open(&archive_path).expect("open");
    bundle_file.append_entry("orphan.json", b"{}").expect("append");
    bundle_file.close().expect("close");

    Mock::given(method("POST"))
        .and(path("/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "requestId": "req-o", "status": "success"
        })))
        .expect(1)
        .mount(&marketplace)
        .await;

    usagectl_cli::commands::push::run(&config_path, Some(archive_path.clone()), false, false)
        .await
        .expect("override push");

    // Override mode does not compact: the archive is left untouched.
    let entries = bundle::read_entries(&archive_path).expect("read archive");
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_push_override_missing_file_is_validation_error() {
    let dir = TempDir::new().expect("tempdir");
    let config_path = write_config(&dir, "http://localhost:1", "http://localhost:1");

    let result = usagectl_cli::commands::push::run(
        &config_path,
        Some(dir.path().join("absent.tar")),
        false,
        false,
    )
    .await;

    assert!(matches!(result.unwrap_err(), CliError::FileNotFound(_)));
}
