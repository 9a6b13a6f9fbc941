//! Integration tests for the refresh-token grant

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use odbackup_core::domain::BackupError;
use odbackup_core::ports::{ClientCredentials, IAuthProvider};
use odbackup_graph::auth::GraphAuth;

fn credentials(secret: &str) -> ClientCredentials {
    ClientCredentials {
        client_id: "app-1".into(),
        client_secret: secret.into(),
        refresh_token: "refresh-old".into(),
    }
}

fn auth_for(server: &MockServer) -> GraphAuth {
    GraphAuth::with_endpoints(
        reqwest::Client::new(),
        format!("{}/oauth20_token.srf", server.uri()),
        "https://login.microsoftonline.com/common/oauth2/nativeclient",
    )
}

#[tokio::test]
async fn test_refresh_returns_access_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth20_token.srf"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-old"))
        .and(body_string_contains("client_id=app-1"))
        .and(body_string_contains("client_secret=s3cret"))
        .and(body_string_contains("redirect_uri="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-new",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-old"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = auth_for(&server).refresh(&credentials("s3cret")).await.unwrap();

    assert_eq!(tokens.access_token, "access-new");
    assert!(tokens.refresh_token.is_none());
    assert!(!tokens.is_expired());
}

#[tokio::test]
async fn test_refresh_reports_rotated_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth20_token.srf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-new",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-rotated"
        })))
        .mount(&server)
        .await;

    let tokens = auth_for(&server).refresh(&credentials("")).await.unwrap();
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-rotated"));
}

#[tokio::test]
async fn test_rejected_refresh_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth20_token.srf"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "The refresh token has expired."
        })))
        .mount(&server)
        .await;

    let err = auth_for(&server).refresh(&credentials("")).await.unwrap_err();
    match err {
        BackupError::Auth(reason) => assert!(reason.contains("invalid_grant"), "{reason}"),
        other => panic!("expected auth error, got {other:?}"),
    }
    assert!(BackupError::Auth(String::new()).is_fatal());
}
