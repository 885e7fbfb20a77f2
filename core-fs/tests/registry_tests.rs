//! Warm-session checkout by basic-auth credentials.

mod common;

use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use common::*;
use core_auth::{AccountCredentials, AuthState, ClientProfile};
use core_fs::{FsError, SessionRegistry};
use std::sync::Arc;
use std::time::Duration;

fn profile() -> ClientProfile {
    ClientProfile {
        client_id: "cid".to_string(),
        client_version: "1.21.0".to_string(),
        package_name: "mypikpak.com".to_string(),
        timestamp: "1".to_string(),
        algorithms: vec![],
    }
}

fn is_sign_in(request: &HttpRequest, password: &str) -> bool {
    let body: serde_json::Value = request
        .body
        .as_deref()
        .and_then(|b| serde_json::from_slice(b).ok())
        .unwrap_or_default();
    request.url.ends_with("/v1/auth/signin") && body["password"] == password
}

fn tokens() -> HttpResponse {
    HttpResponse::new(200, r#"{"access_token":"a.b.c","refresh_token":"r"}"#)
}

fn registry(transport: MockHttpClient) -> SessionRegistry {
    let transport: Arc<dyn HttpClient> = Arc::new(transport);
    SessionRegistry::new(config(2), profile(), transport)
}

#[tokio::test]
async fn test_cached_drive_is_reused() {
    let mut transport = MockHttpClient::new();
    transport
        .expect_execute()
        .withf(|req| is_sign_in(req, "pw"))
        .times(1)
        .returning(|_| Ok(tokens()));
    let registry = registry(transport);
    let creds = AccountCredentials::new("me@example.com", "pw");

    let first = registry.checkout(&creds).await.unwrap();
    let second = registry.checkout(&creds).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_password_mismatch_forces_sign_in() {
    let mut transport = MockHttpClient::new();
    transport
        .expect_execute()
        .withf(|req| is_sign_in(req, "old"))
        .times(1)
        .returning(|_| Ok(tokens()));
    transport
        .expect_execute()
        .withf(|req| is_sign_in(req, "new"))
        .times(1)
        .returning(|_| Ok(tokens()));
    let registry = registry(transport);

    let first = registry
        .checkout(&AccountCredentials::new("me@example.com", "old"))
        .await
        .unwrap();
    let second = registry
        .checkout(&AccountCredentials::new("me@example.com", "new"))
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(second.session().password_matches("new").await);
}

#[tokio::test]
async fn test_failed_sign_in_caches_nothing() {
    let mut transport = MockHttpClient::new();
    transport
        .expect_execute()
        .times(2)
        .returning(|_| Ok(HttpResponse::new(400, r#"{"error":"invalid_grant"}"#)));
    let registry = registry(transport);
    let creds = AccountCredentials::new("me@example.com", "bad");

    for _ in 0..2 {
        let err = registry.checkout(&creds).await.err().unwrap();
        assert!(matches!(err, FsError::AuthenticationFailed(_)));
        assert_eq!(err.status_code(), 401);
    }
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_failed_re_sign_in_evicts_drive() {
    let mut transport = MockHttpClient::new();
    transport
        .expect_execute()
        .withf(|req| is_sign_in(req, "pw"))
        .times(1)
        .returning(|_| Ok(tokens()));
    transport
        .expect_execute()
        .withf(|req| is_sign_in(req, "wrong"))
        .times(1)
        .returning(|_| Ok(HttpResponse::new(401, "denied")));
    let registry = registry(transport);

    let drive = registry
        .checkout(&AccountCredentials::new("me@example.com", "pw"))
        .await
        .unwrap();
    let err = registry
        .checkout(&AccountCredentials::new("me@example.com", "wrong"))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, FsError::AuthenticationFailed(_)));
    assert!(registry.is_empty());
    assert_eq!(drive.session().auth_state().await, AuthState::Unauthenticated);
}

#[tokio::test(start_paused = true)]
async fn test_expired_session_signs_in_again() {
    let mut transport = MockHttpClient::new();
    transport
        .expect_execute()
        .withf(|req| is_sign_in(req, "pw"))
        .times(2)
        .returning(|_| Ok(tokens()));
    let registry = registry(transport);
    let creds = AccountCredentials::new("me@example.com", "pw");

    let first = registry.checkout(&creds).await.unwrap();
    tokio::time::advance(Duration::from_secs(3601)).await;
    let second = registry.checkout(&creds).await.unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_authenticate_rejects_missing_header() {
    let registry = registry(MockHttpClient::new());

    let err = registry.authenticate(None).await.err().unwrap();
    match err {
        FsError::Unauthorized { challenge, .. } => {
            assert_eq!(challenge, core_fs::BASIC_CHALLENGE)
        }
        other => panic!("expected Unauthorized, got {:?}", other),
    }
}
