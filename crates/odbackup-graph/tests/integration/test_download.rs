//! Integration tests for content download

use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use odbackup_core::domain::{BackupError, RemoteFile};
use odbackup_core::ports::IRemoteDrive;
use odbackup_graph::download::{download_to_path, partial_path};
use odbackup_graph::provider::GraphDrive;

use crate::common;

#[tokio::test]
async fn test_download_creates_parents_and_writes_content() {
    let (server, client) = common::setup_graph_mock().await;
    common::mount_download(&server, "F1", b"hello backup").await;

    let dir = tempfile::TempDir::new().unwrap();
    let target = dir.path().join("nested/deeper/a.txt");

    let written = download_to_path(&client, "F1", &target).await.unwrap();

    assert_eq!(written, 12);
    assert_eq!(std::fs::read(&target).unwrap(), b"hello backup");
    assert!(!partial_path(&target).exists());
}

#[tokio::test]
async fn test_download_overwrites_existing_file() {
    let (server, client) = common::setup_graph_mock().await;
    common::mount_download(&server, "F1", b"new").await;

    let dir = tempfile::TempDir::new().unwrap();
    let target = dir.path().join("a.txt");
    std::fs::write(&target, b"old content").unwrap();

    download_to_path(&client, "F1", &target).await.unwrap();
    assert_eq!(std::fs::read(&target).unwrap(), b"new");
}

#[tokio::test]
async fn test_failed_download_leaves_local_file_untouched() {
    let (server, _client) = common::setup_graph_mock().await;
    Mock::given(method("GET"))
        .and(path("/me/drive/items/F1/content"))
        .respond_with(ResponseTemplate::new(404).set_body_string("itemNotFound"))
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let target = dir.path().join("a.txt");
    std::fs::write(&target, b"previous").unwrap();

    let drive = GraphDrive::with_base_url(reqwest::Client::new(), server.uri());
    let file = RemoteFile::new("F1", "/a.txt");
    let err = drive
        .download_file("test-access-token", &file, &target)
        .await
        .unwrap_err();

    match err {
        BackupError::Download { path, reason } => {
            assert_eq!(path, "/a.txt");
            assert!(reason.contains("404"), "reason: {reason}");
        }
        other => panic!("expected download error, got {other:?}"),
    }
    assert_eq!(std::fs::read(&target).unwrap(), b"previous");
    assert!(!partial_path(&target).exists());
}
