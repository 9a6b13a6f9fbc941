//! Integration tests for HTTP 429 handling

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use odbackup_graph::GraphError;

use crate::common;

#[tokio::test]
async fn test_retries_after_429() {
    let (server, client) = common::setup_graph_mock().await;

    Mock::given(method("GET"))
        .and(path("/me/drive/root"))
        .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "0"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "ROOT" })))
        .expect(1)
        .mount(&server)
        .await;

    let value: serde_json::Value = client
        .get_json(&client.url_for("/me/drive/root"))
        .await
        .unwrap();
    assert_eq!(value["id"], "ROOT");
}

#[tokio::test]
async fn test_gives_up_after_max_retries() {
    let (server, client) = common::setup_graph_mock().await;
    let client = client.with_max_retries(2);

    Mock::given(method("GET"))
        .and(path("/me/drive/root"))
        .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "0"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client
        .get(&client.url_for("/me/drive/root"))
        .await
        .unwrap_err();
    match err {
        GraphError::TooManyRequests { retry_after } => {
            assert_eq!(retry_after, Duration::from_secs(0))
        }
        other => panic!("expected throttling error, got {other:?}"),
    }
}
