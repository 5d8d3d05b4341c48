// Integration tests for the token manager
//
// The accounts service and Web API are both served by one mockito server;
// session storage, clock and navigation are test doubles.

mod common;

use mockito::Matcher;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::HashMap;

use common::{Harness, REDIRECT_URI, T0};
use spotify_pkce::auth::{pkce, SessionStore, TOKEN_KEY, VERIFIER_KEY};
use spotify_pkce::http_client::RequestOptions;
use spotify_pkce::AuthError;

const TOKEN_BODY: &str =
    r#"{"access_token":"fresh-access","token_type":"Bearer","scope":"user-read-private","expires_in":3600,"refresh_token":"fresh-refresh"}"#;

fn valid_token() -> Value {
    json!({
        "access_token": "stored-access",
        "refresh_token": "stored-refresh",
        "expires_in": 3600,
        "obtained_at": T0
    })
}

// ==================================================================================================
// Login
// ==================================================================================================

#[tokio::test]
async fn test_begin_login_stores_verifier_and_navigates() {
    let server = mockito::Server::new_async().await;
    let h = Harness::new(&server.url());

    h.manager.begin_login().await.unwrap();

    let verifier = h.store.get(VERIFIER_KEY).expect("verifier stored");
    let url = h.navigator.last_navigated().expect("navigated");
    assert_eq!(url.path(), "/authorize");

    let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
    assert_eq!(params["response_type"], "code");
    assert_eq!(params["client_id"], "test-client");
    assert_eq!(params["redirect_uri"], REDIRECT_URI);
    assert_eq!(params["code_challenge_method"], "S256");
    assert_eq!(params["code_challenge"], pkce::challenge_for(&verifier));
    assert!(params["scope"].contains("playlist-read-private"));
}

#[tokio::test]
async fn test_retried_login_supersedes_verifier() {
    let server = mockito::Server::new_async().await;
    let h = Harness::new(&server.url());

    h.manager.begin_login().await.unwrap();
    let first = h.store.get(VERIFIER_KEY).unwrap();
    h.manager.begin_login().await.unwrap();
    let second = h.store.get(VERIFIER_KEY).unwrap();

    assert_ne!(first, second);
    assert_eq!(h.navigator.navigated.lock().unwrap().len(), 2);
}

// ==================================================================================================
// Code exchange
// ==================================================================================================

#[tokio::test]
async fn test_exchange_code_writes_record() {
    let mut server = mockito::Server::new_async().await;
    let h = Harness::new(&server.url());

    h.manager.begin_login().await.unwrap();
    let verifier = h.store.get(VERIFIER_KEY).unwrap();

    let mock = server
        .mock("POST", "/api/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
            Matcher::UrlEncoded("code".into(), "auth-code".into()),
            Matcher::UrlEncoded("code_verifier".into(), verifier),
            Matcher::UrlEncoded("client_id".into(), "test-client".into()),
            Matcher::UrlEncoded("redirect_uri".into(), REDIRECT_URI.into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(TOKEN_BODY)
        .expect(1)
        .create_async()
        .await;

    h.clock.advance_secs(5);
    let token = h.manager.exchange_code("auth-code").await.unwrap();

    mock.assert_async().await;
    assert_eq!(token.access_token, "fresh-access");
    assert_eq!(token.refresh_token.as_deref(), Some("fresh-refresh"));
    assert_eq!(token.obtained_at, T0 + 5000);

    let stored = h.stored_token().unwrap();
    assert_eq!(stored["access_token"], "fresh-access");
    assert_eq!(stored["obtained_at"], T0 + 5000);

    // verifier is single-use
    assert!(h.store.get(VERIFIER_KEY).is_none());
}

#[tokio::test]
async fn test_exchange_code_failure_leaves_prior_record() {
    let mut server = mockito::Server::new_async().await;
    let h = Harness::new(&server.url());
    h.seed_token(valid_token());
    h.seed_verifier("some-verifier");
    let before = h.raw_token();

    let _mock = server
        .mock("POST", "/api/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant","error_description":"Invalid authorization code"}"#)
        .create_async()
        .await;

    let err = h.manager.exchange_code("bad-code").await.unwrap_err();
    match err {
        AuthError::TokenExchangeFailed { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("Invalid authorization code"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(h.raw_token(), before);
}

#[tokio::test]
async fn test_exchange_code_without_verifier() {
    let mut server = mockito::Server::new_async().await;
    let h = Harness::new(&server.url());

    let mock = server
        .mock("POST", "/api/token")
        .expect(0)
        .create_async()
        .await;

    let err = h.manager.exchange_code("auth-code").await.unwrap_err();
    assert!(matches!(err, AuthError::MissingVerifier));
    mock.assert_async().await;
}

// ==================================================================================================
// Refresh
// ==================================================================================================

#[tokio::test]
async fn test_refresh_without_refresh_token_makes_no_call() {
    let mut server = mockito::Server::new_async().await;
    let h = Harness::new(&server.url());
    h.seed_token(json!({
        "access_token": "stored-access",
        "expires_in": 3600,
        "obtained_at": T0
    }));

    let mock = server
        .mock("POST", "/api/token")
        .expect(0)
        .create_async()
        .await;

    let err = h.manager.refresh().await.unwrap_err();
    assert!(matches!(err, AuthError::NoRefreshToken));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_refresh_without_record() {
    let server = mockito::Server::new_async().await;
    let h = Harness::new(&server.url());

    let err = h.manager.refresh().await.unwrap_err();
    assert!(matches!(err, AuthError::NoRefreshToken));
}

#[tokio::test]
async fn test_refresh_failure_is_token_exchange_failed() {
    let mut server = mockito::Server::new_async().await;
    let h = Harness::new(&server.url());
    h.seed_token(valid_token());

    let _mock = server
        .mock("POST", "/api/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant"}"#)
        .create_async()
        .await;

    let err = h.manager.refresh().await.unwrap_err();
    assert!(matches!(err, AuthError::TokenExchangeFailed { status: 400, .. }));
    assert!(err.requires_login());
}

// ==================================================================================================
// ensure_valid
// ==================================================================================================

#[tokio::test]
async fn test_ensure_valid_returns_valid_record_without_network() {
    let mut server = mockito::Server::new_async().await;
    let h = Harness::new(&server.url());
    h.seed_token(valid_token());

    let mock = server
        .mock("POST", "/api/token")
        .expect(0)
        .create_async()
        .await;

    h.clock.set(T0 + 3500 * 1000);
    let token = h.manager.ensure_valid().await.unwrap();

    assert_eq!(token.access_token, "stored-access");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_ensure_valid_refreshes_expired_record() {
    let mut server = mockito::Server::new_async().await;
    let h = Harness::new(&server.url());
    h.seed_token(valid_token());

    let mock = server
        .mock("POST", "/api/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "stored-refresh".into()),
            Matcher::UrlEncoded("client_id".into(), "test-client".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        // refresh_token omitted on purpose
        .with_body(r#"{"access_token":"refreshed-access","token_type":"Bearer","expires_in":3600}"#)
        .expect(1)
        .create_async()
        .await;

    h.clock.set(T0 + 3541 * 1000);
    let token = h.manager.ensure_valid().await.unwrap();

    mock.assert_async().await;
    assert_eq!(token.access_token, "refreshed-access");
    assert_eq!(token.refresh_token.as_deref(), Some("stored-refresh"));
    assert_eq!(token.obtained_at, T0 + 3541 * 1000);

    let stored = h.stored_token().unwrap();
    assert_eq!(stored["refresh_token"], "stored-refresh");
    assert_eq!(stored["obtained_at"], T0 + 3541 * 1000);
}

#[tokio::test]
async fn test_ensure_valid_soft_fails_on_refresh_error() {
    let mut server = mockito::Server::new_async().await;
    let h = Harness::new(&server.url());
    h.seed_token(valid_token());
    let before = h.raw_token();

    let mock = server
        .mock("POST", "/api/token")
        .with_status(500)
        .with_body("upstream unavailable")
        .expect(1)
        .create_async()
        .await;

    h.clock.advance_secs(7200);
    assert!(h.manager.ensure_valid().await.is_none());

    // exactly one refresh attempt, record untouched
    mock.assert_async().await;
    assert_eq!(h.raw_token(), before);
}

#[tokio::test]
async fn test_ensure_valid_without_record() {
    let server = mockito::Server::new_async().await;
    let h = Harness::new(&server.url());

    assert!(h.manager.ensure_valid().await.is_none());
    assert!(!h.manager.is_authenticated());
}

#[tokio::test]
async fn test_unreadable_record_treated_as_absent() {
    let server = mockito::Server::new_async().await;
    let h = Harness::new(&server.url());
    h.store.set(TOKEN_KEY, "{not json".to_string());

    assert!(h.manager.current_token().is_none());
    assert!(h.manager.ensure_valid().await.is_none());
}

// ==================================================================================================
// authorized_fetch
// ==================================================================================================

#[tokio::test]
async fn test_authorized_fetch_without_token_makes_no_call() {
    let mut server = mockito::Server::new_async().await;
    let h = Harness::new(&server.url());

    let mock = server.mock("GET", "/v1/me").expect(0).create_async().await;

    let err = h
        .manager
        .authorized_fetch("/me", RequestOptions::get())
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::NotAuthenticated));
    assert!(err.requires_login());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_authorized_fetch_bearer_overrides_caller_authorization() {
    let mut server = mockito::Server::new_async().await;
    let h = Harness::new(&server.url());
    h.seed_token(valid_token());

    let mock = server
        .mock("PUT", "/v1/me/player/play")
        .match_header("authorization", "Bearer stored-access")
        .match_header("accept", "application/json")
        .match_body(Matcher::Json(json!({"position_ms": 0})))
        .with_status(200)
        .with_body(r#"{"ok":true}"#)
        .create_async()
        .await;

    let options = RequestOptions::get()
        .with_method(Method::PUT)
        .with_header(AUTHORIZATION, HeaderValue::from_static("Bearer caller-supplied"))
        .with_header(ACCEPT, HeaderValue::from_static("application/json"))
        .with_json(json!({"position_ms": 0}));

    let value = h
        .manager
        .authorized_fetch("/me/player/play", options)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(value, json!({"ok": true}));
}

#[tokio::test]
async fn test_authorized_fetch_error_carries_body() {
    let mut server = mockito::Server::new_async().await;
    let h = Harness::new(&server.url());
    h.seed_token(valid_token());

    let _mock = server
        .mock("GET", "/v1/playlists/missing/tracks")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"error":{"status":404,"message":"Not found."}}"#)
        .create_async()
        .await;

    let err = h
        .manager
        .authorized_fetch("/playlists/missing/tracks?limit=100", RequestOptions::get())
        .await
        .unwrap_err();

    match err {
        AuthError::ApiRequestFailed { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("Not found."));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_authorized_fetch_empty_body_is_null() {
    let mut server = mockito::Server::new_async().await;
    let h = Harness::new(&server.url());
    h.seed_token(valid_token());

    let _mock = server
        .mock("PUT", "/v1/me/player/pause")
        .with_status(204)
        .create_async()
        .await;

    let value = h
        .manager
        .authorized_fetch(
            "/me/player/pause",
            RequestOptions::get().with_method(Method::PUT),
        )
        .await
        .unwrap();

    assert_eq!(value, Value::Null);
}

#[tokio::test]
async fn test_authorized_fetch_refreshes_before_calling() {
    let mut server = mockito::Server::new_async().await;
    let h = Harness::new(&server.url());
    h.seed_token(valid_token());

    let refresh = server
        .mock("POST", "/api/token")
        .with_status(200)
        .with_body(r#"{"access_token":"refreshed-access","expires_in":3600}"#)
        .expect(1)
        .create_async()
        .await;
    let me = server
        .mock("GET", "/v1/me")
        .match_header("authorization", "Bearer refreshed-access")
        .with_status(200)
        .with_body(r#"{"id":"user-1"}"#)
        .expect(1)
        .create_async()
        .await;

    h.clock.advance_secs(3600);
    let value = h
        .manager
        .authorized_fetch("/me", RequestOptions::get())
        .await
        .unwrap();

    refresh.assert_async().await;
    me.assert_async().await;
    assert_eq!(value["id"], "user-1");
}

// ==================================================================================================
// Redirect handling
// ==================================================================================================

#[tokio::test]
async fn test_handle_redirect_exchanges_and_strips_code() {
    let mut server = mockito::Server::new_async().await;
    let h = Harness::new(&server.url());
    h.seed_verifier("some-verifier");

    let _mock = server
        .mock("POST", "/api/token")
        .match_body(Matcher::UrlEncoded("code".into(), "auth-code".into()))
        .with_status(200)
        .with_body(TOKEN_BODY)
        .create_async()
        .await;

    let location = format!("{}?code=auth-code", REDIRECT_URI).parse().unwrap();
    assert!(h.manager.handle_redirect(&location).await.unwrap());

    assert!(h.manager.is_authenticated());
    let replaced = h.navigator.last_replaced().unwrap();
    assert_eq!(replaced.as_str(), REDIRECT_URI);
}

#[tokio::test]
async fn test_handle_redirect_strips_code_after_failed_exchange() {
    let mut server = mockito::Server::new_async().await;
    let h = Harness::new(&server.url());
    h.seed_verifier("some-verifier");

    let _mock = server
        .mock("POST", "/api/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant"}"#)
        .create_async()
        .await;

    let location = format!("{}?code=used-code", REDIRECT_URI).parse().unwrap();
    let err = h.manager.handle_redirect(&location).await.unwrap_err();

    assert!(matches!(err, AuthError::TokenExchangeFailed { .. }));
    assert_eq!(h.navigator.last_replaced().unwrap().as_str(), REDIRECT_URI);
    assert!(!h.manager.is_authenticated());
}

#[tokio::test]
async fn test_handle_redirect_denied() {
    let server = mockito::Server::new_async().await;
    let h = Harness::new(&server.url());

    let location = format!("{}?error=access_denied&state=xyz&tab=1", REDIRECT_URI)
        .parse()
        .unwrap();
    let err = h.manager.handle_redirect(&location).await.unwrap_err();

    match err {
        AuthError::AuthorizationDenied(reason) => assert_eq!(reason, "access_denied"),
        other => panic!("unexpected error: {other:?}"),
    }

    let cleaned = h.navigator.last_replaced().expect("location should be cleaned");
    assert_eq!(cleaned.query(), Some("tab=1"));
    assert!(cleaned.query_pairs().all(|(k, _)| k != "error" && k != "state"));
}

#[tokio::test]
async fn test_handle_redirect_without_code() {
    let server = mockito::Server::new_async().await;
    let h = Harness::new(&server.url());

    let location = REDIRECT_URI.parse().unwrap();
    assert!(!h.manager.handle_redirect(&location).await.unwrap());
    assert!(h.navigator.last_replaced().is_none());
}
