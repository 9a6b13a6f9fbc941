//! Integration tests for delta rounds

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use odbackup_core::domain::{BackupError, DeltaChange};
use odbackup_core::ports::IRemoteDrive;
use odbackup_graph::delta;
use odbackup_graph::provider::GraphDrive;
use odbackup_graph::GraphError;

use crate::common;

#[tokio::test]
async fn test_delta_bootstrap_scoped_to_root() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("GET"))
        .and(path("/me/drive/root:/Docs:/delta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                common::folder_item("DOCS", "Docs", ""),
                common::file_item("F1", "a.txt", "/Docs", "E1"),
            ],
            "@odata.deltaLink": format!("{}/me/drive/root/delta?token=t1", server.uri())
        })))
        .mount(&server)
        .await;

    let round = delta::get_delta(&client, "/Docs", None).await.unwrap();

    assert_eq!(round.changes.len(), 2);
    assert!(matches!(&round.changes[0], DeltaChange::Folder(f) if f.path == "/Docs"));
    assert!(matches!(&round.changes[1], DeltaChange::File(f) if f.path == "/Docs/a.txt"));
    assert_eq!(round.cursor, format!("{}/me/drive/root/delta?token=t1", server.uri()));
}

#[tokio::test]
async fn test_delta_resumes_from_stored_cursor_across_pages() {
    let (server, client) = common::setup_graph_mock().await;
    let cursor = format!("{}/me/drive/root/delta?token=old", server.uri());

    Mock::given(method("GET"))
        .and(path("/me/drive/root/delta"))
        .and(query_param("token", "old"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [common::file_item("F1", "a.txt", "", "E2")],
            "@odata.nextLink": format!("{}/me/drive/root/delta?$skiptoken=p2", server.uri())
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root/delta"))
        .and(query_param("$skiptoken", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [common::deleted_item("F9")],
            "@odata.deltaLink": format!("{}/me/drive/root/delta?token=new", server.uri())
        })))
        .mount(&server)
        .await;

    let round = delta::get_delta(&client, "", Some(&cursor)).await.unwrap();

    assert_eq!(round.changes.len(), 2);
    assert_eq!(round.changes[1], DeltaChange::Deleted { id: "F9".into() });
    assert!(round.cursor.ends_with("token=new"));
}

#[tokio::test]
async fn test_empty_round_still_returns_cursor() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("GET"))
        .and(path("/me/drive/root/delta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [],
            "@odata.deltaLink": format!("{}/me/drive/root/delta?token=same", server.uri())
        })))
        .mount(&server)
        .await;

    let round = delta::get_delta(&client, "", None).await.unwrap();
    assert!(round.changes.is_empty());
    assert!(round.cursor.ends_with("token=same"));
}

#[tokio::test]
async fn test_round_without_delta_link_is_invalid() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("GET"))
        .and(path("/me/drive/root/delta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .mount(&server)
        .await;

    let err = delta::get_delta(&client, "", None).await.unwrap_err();
    assert!(matches!(err, GraphError::InvalidResponse(_)), "got {err:?}");
}

#[tokio::test]
async fn test_expired_cursor_maps_to_cursor_expired() {
    let (server, _client) = common::setup_graph_mock().await;
    let cursor = format!("{}/me/drive/root/delta?token=stale", server.uri());

    Mock::given(method("GET"))
        .and(path("/me/drive/root/delta"))
        .and(query_param("token", "stale"))
        .respond_with(ResponseTemplate::new(410).set_body_json(json!({
            "error": { "code": "resyncRequired", "message": "Resync required" }
        })))
        .mount(&server)
        .await;

    let drive = GraphDrive::with_base_url(reqwest::Client::new(), server.uri());
    let err = drive
        .get_delta("test-access-token", "", Some(&cursor))
        .await
        .unwrap_err();
    assert_eq!(err, BackupError::CursorExpired);
}
