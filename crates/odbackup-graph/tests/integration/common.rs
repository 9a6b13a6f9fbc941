//! Shared test helpers for Graph API integration tests
//!
//! Each helper mounts mock endpoints on a wiremock server; item builders
//! produce driveItem JSON in the shape Graph returns.

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use odbackup_graph::client::GraphClient;

/// Starts a mock server and returns a client pointing at it
pub async fn setup_graph_mock() -> (MockServer, GraphClient) {
    let server = MockServer::start().await;
    let client = GraphClient::with_base_url("test-access-token", server.uri());
    (server, client)
}

/// A file driveItem below `parent` (`""` for the drive root)
pub fn file_item(id: &str, name: &str, parent: &str, e_tag: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "size": 1024,
        "lastModifiedDateTime": "2026-01-15T10:00:00Z",
        "eTag": e_tag,
        "cTag": format!("c-{e_tag}"),
        "parentReference": { "path": format!("/drive/root:{parent}") },
        "file": { "mimeType": "text/plain" }
    })
}

/// A folder driveItem below `parent`
pub fn folder_item(id: &str, name: &str, parent: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "parentReference": { "path": format!("/drive/root:{parent}") },
        "folder": { "childCount": 0 }
    })
}

/// A tombstone driveItem
pub fn deleted_item(id: &str) -> Value {
    json!({ "id": id, "name": "", "deleted": { "state": "deleted" } })
}

/// Mounts a single-page children collection for `folder_id`
pub async fn mount_children(server: &MockServer, folder_id: &str, items: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/me/drive/items/{folder_id}/children")))
        .and(query_param("$top", "999"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": items })))
        .mount(server)
        .await;
}

/// Mounts a content endpoint for `item_id`
pub async fn mount_download(server: &MockServer, item_id: &str, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/me/drive/items/{item_id}/content")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(content.to_vec())
                .append_header("Content-Type", "application/octet-stream"),
        )
        .mount(server)
        .await;
}
