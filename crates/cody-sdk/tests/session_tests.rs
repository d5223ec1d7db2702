//! Integration tests for the session facade
//!
//! REST calls go to a local wiremock server; streaming uses the mock transport.

use cody_sdk::prelude::*;
use cody_ws::{MockFrame, MockTransport};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer, dir: &TempDir) -> SdkConfig {
    let credentials = Credentials::new("abc", "s3cr3t").unwrap();
    SdkConfig::new(credentials)
        .with_base_url(server.uri())
        .with_token_file(token_file(dir))
        .with_throttle_interval(Duration::ZERO)
        .with_reconnect(ReconnectConfig::new().with_jitter(0.0))
}

fn token_file(dir: &TempDir) -> PathBuf {
    dir.path().join("api_settings.json")
}

fn save_token(dir: &TempDir, token: &str) {
    std::fs::write(token_file(dir), json!({ "jwtToken": token }).to_string()).unwrap();
}

fn saved_token(dir: &TempDir) -> String {
    let raw = std::fs::read_to_string(token_file(dir)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    value["jwtToken"].as_str().unwrap_or_default().to_string()
}

async fn mount_login(server: &MockServer, jwt: &str) {
    Mock::given(method("POST"))
        .and(path("/Identity/SendOtp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "token": "challenge-1" }
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/Identity/Login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "jwtToken": jwt }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_start_without_saved_token() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let session = Session::start(config(&server, &dir)).await.unwrap();
    assert_eq!(session.restore_status(), SessionRestore::NoSavedToken);
    assert!(!session.is_authenticated());
    assert!(server.received_requests().await.unwrap().is_empty());

    session.shutdown(Duration::from_secs(1)).await.unwrap();
    assert!(session.is_shut_down());
}

#[tokio::test]
async fn test_start_restores_saved_token() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    save_token(&dir, "saved-jwt");

    Mock::given(method("POST"))
        .and(path("/Portfolio/SubAccounts"))
        .and(header("Authorization", "Bearer saved-jwt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let session = Session::start(config(&server, &dir)).await.unwrap();
    assert_eq!(session.restore_status(), SessionRestore::Restored);
    assert_eq!(session.token().get().as_deref(), Some("saved-jwt"));

    session.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn test_start_discards_rejected_token() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    save_token(&dir, "stale-jwt");

    Mock::given(method("POST"))
        .and(path("/Portfolio/SubAccounts"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let session = Session::start(config(&server, &dir)).await.unwrap();
    assert_eq!(
        session.restore_status(),
        SessionRestore::Invalidated { status: Some(401) }
    );
    assert!(!session.is_authenticated());
    assert!(!token_file(&dir).exists() || saved_token(&dir).is_empty());

    session.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn test_login_then_logout() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_login(&server, "jwt-login").await;

    let session = Session::start(config(&server, &dir)).await.unwrap();
    let challenge = session.send_otp("user", "pw").await.unwrap();
    assert_eq!(challenge.token, "challenge-1");

    session.login(&challenge, "123456").await.unwrap();
    assert!(session.is_authenticated());
    assert_eq!(saved_token(&dir), "jwt-login");

    session.logout();
    assert!(!session.is_authenticated());

    session.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn test_login_failure_surfaces_rest_error() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/Identity/SendOtp"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let session = Session::start(config(&server, &dir)).await.unwrap();
    let err = session.send_otp("user", "wrong").await.unwrap_err();
    assert!(err.requires_login());
    assert!(matches!(err, SdkError::Rest(ref e) if e.status() == Some(403)));

    session.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn test_streaming_shares_login_token() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_login(&server, "jwt-stream").await;

    let session = Session::start(config(&server, &dir)).await.unwrap();
    let challenge = session.send_otp("user", "pw").await.unwrap();
    session.login(&challenge, "123456").await.unwrap();

    let transport = MockTransport::new("ws://mock/ws");
    let mock = transport.handle();
    mock.push_connection([MockFrame::Text("tick".into())]);

    let mut stream = session.streaming_with_transport(transport).unwrap();
    assert_eq!(
        stream.config().url,
        format!("{}/ws", server.uri().replacen("http://", "ws://", 1))
    );
    let mut events = stream.take_event_receiver().unwrap();
    let running = stream.spawn();

    let handle = running.handle();
    handle.subscribe(Feed::D, ["GARAN"]).await.unwrap();

    let handshakes = mock.handshakes();
    assert_eq!(handshakes.len(), 1);
    assert_eq!(handshakes[0].client_key, "abc");
    assert_eq!(handshakes[0].token, "jwt-stream");
    assert_eq!(
        mock.sent_messages(),
        vec![StreamMessage::subscribe("jwt-stream", Feed::D, ["GARAN"])]
    );

    let mut saw_tick = false;
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(2), events.recv()).await {
        if event == StreamEvent::Message("tick".into()) {
            saw_tick = true;
            break;
        }
    }
    assert!(saw_tick);

    // session shutdown cancels the stream too
    session.shutdown(Duration::from_secs(1)).await.unwrap();
    running.join().await.unwrap();
    assert_eq!(mock.close_count(), 1);
}

#[tokio::test]
async fn test_streaming_without_login_fails_fast() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let session = Session::start(config(&server, &dir)).await.unwrap();
    let transport = MockTransport::new("ws://mock/ws");
    let mock = transport.handle();

    let stream = session.streaming_with_transport(transport).unwrap();
    let result = stream.run().await;
    assert!(matches!(result, Err(CodyError::TokenMissing)));
    assert_eq!(mock.connect_attempts(), 0);

    session.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn test_keep_alive_runs_until_shutdown() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    save_token(&dir, "live-jwt");

    Mock::given(method("POST"))
        .and(path("/Portfolio/SubAccounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;

    let config = config(&server, &dir).with_keep_alive_interval(Duration::from_millis(100));
    let session = Session::start(config).await.unwrap();

    tokio::time::sleep(Duration::from_millis(350)).await;
    session.shutdown(Duration::from_secs(1)).await.unwrap();

    // one validation call plus at least two refreshes
    let calls = server.received_requests().await.unwrap().len();
    assert!(calls >= 3, "expected keep-alive calls, got {calls}");

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), calls);

    // second shutdown is a no-op
    session.shutdown(Duration::from_secs(1)).await.unwrap();
}
