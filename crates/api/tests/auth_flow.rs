use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;

use warden_api::app::{build_app, SharedStore};
use warden_api::config::AppConfig;
use warden_auth::{Role, TokenKind, UserIdentity};
use warden_infra::cache::InMemoryRevocationCache;
use warden_infra::store::InMemoryStore;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Build the prod router over an in-memory store and bind it to an
    /// ephemeral port.
    async fn spawn(config: AppConfig, store: Arc<InMemoryStore>) -> Self {
        let shared: SharedStore = store;
        let app = build_app(config, shared, Some(Arc::new(InMemoryRevocationCache::new())));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn test_config(kind: TokenKind) -> AppConfig {
    AppConfig {
        token_kind: kind,
        signed_secret: "integration-secret".to_string(),
        ..AppConfig::default()
    }
}

fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    store
        .create_user(UserIdentity::new(
            "rijalul.ghad",
            "rijalul.ghad@example.com",
            "supersecret",
            vec![Role::new("administrator")],
        ))
        .unwrap();
    store
}

async fn login(client: &reqwest::Client, server: &TestServer) -> serde_json::Value {
    let resp = client
        .post(server.url("/v1/auth"))
        .json(&json!({ "username": "rijalul.ghad", "password": "supersecret" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn login_verify_revoke_roundtrip() {
    for kind in TokenKind::ALL {
        let server = TestServer::spawn(test_config(kind), seeded_store()).await;
        let client = reqwest::Client::new();

        let bundle = login(&client, &server).await;
        assert_eq!(bundle["token_type"], "Bearer");
        let access = bundle["access_token"].as_str().unwrap();

        // verify echoes the token back
        let resp = client
            .post(server.url("/v1/auth/verify"))
            .header("Authorization", format!("Bearer {access}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["access_token"], access);

        // revoke reports reset-content
        let resp = client
            .delete(server.url("/v1/auth"))
            .header("Authorization", format!("Bearer {access}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::RESET_CONTENT);

        // the revoked token no longer verifies
        let resp = client
            .post(server.url("/v1/auth/verify"))
            .header("Authorization", format!("Bearer {access}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "token_revoked");

        // a second revoke is an auth failure, not a success
        let resp = client
            .delete(server.url("/v1/auth"))
            .header("Authorization", format!("Bearer {access}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn short_password_is_unprocessable() {
    let server = TestServer::spawn(test_config(TokenKind::Signed), seeded_store()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(server.url("/v1/auth"))
        .json(&json!({ "username": "rijalul.ghad", "password": "short" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "credentials_malformed");
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let server = TestServer::spawn(test_config(TokenKind::Signed), seeded_store()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(server.url("/v1/auth"))
        .json(&json!({ "username": "rijalul.ghad", "password": "supersecreX" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "credentials_invalid");
}

#[tokio::test]
async fn form_encoded_login_works() {
    let server = TestServer::spawn(test_config(TokenKind::Opaque), seeded_store()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(server.url("/v1/auth"))
        .form(&[("username", "rijalul.ghad"), ("password", "supersecret")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["access_token"].as_str().unwrap().len() >= 30);
}

#[tokio::test]
async fn basic_header_login_works() {
    let server = TestServer::spawn(test_config(TokenKind::Signed), seeded_store()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(server.url("/v1/auth"))
        .basic_auth("rijalul.ghad", Some("supersecret"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn refresh_rotates_and_retires_the_old_pair() {
    for kind in TokenKind::ALL {
        let server = TestServer::spawn(test_config(kind), seeded_store()).await;
        let client = reqwest::Client::new();

        let bundle = login(&client, &server).await;
        let access = bundle["access_token"].as_str().unwrap();
        let refresh = bundle["refresh_token"].as_str().unwrap();

        let resp = client
            .post(server.url("/v1/auth/refresh"))
            .json(&json!({ "access_token": access, "refresh_token": refresh }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let fresh: serde_json::Value = resp.json().await.unwrap();
        assert_ne!(fresh["access_token"], access);

        // the superseded access token is dead
        let resp = client
            .post(server.url("/v1/auth/verify"))
            .header("Authorization", format!("Bearer {access}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        // replaying the consumed pair fails
        let resp = client
            .post(server.url("/v1/auth/refresh"))
            .json(&json!({ "access_token": access, "refresh_token": refresh }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn refresh_without_tokens_is_bad_request() {
    let server = TestServer::spawn(test_config(TokenKind::Signed), seeded_store()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(server.url("/v1/auth/refresh"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ping_needs_no_authentication() {
    let server = TestServer::spawn(test_config(TokenKind::Signed), seeded_store()).await;
    let resp = reqwest::get(server.url("/v1/ping")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn whoami_reports_identity_and_roles() {
    let server = TestServer::spawn(test_config(TokenKind::Signed), seeded_store()).await;
    let client = reqwest::Client::new();
    let bundle = login(&client, &server).await;
    let access = bundle["access_token"].as_str().unwrap();

    let resp = client
        .get(server.url("/v1/whoami"))
        .header("Authorization", format!("Bearer {access}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["username"], "rijalul.ghad");
    assert_eq!(body["roles"][0], "administrator");
}

#[tokio::test]
async fn whoami_without_a_token_is_unauthorized() {
    let server = TestServer::spawn(test_config(TokenKind::Signed), seeded_store()).await;
    let resp = reqwest::get(server.url("/v1/whoami")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_header_prefix_is_unauthorized() {
    let server = TestServer::spawn(test_config(TokenKind::Signed), seeded_store()).await;
    let client = reqwest::Client::new();
    let bundle = login(&client, &server).await;
    let access = bundle["access_token"].as_str().unwrap();

    let resp = client
        .get(server.url("/v1/whoami"))
        .header("Authorization", format!("Token {access}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn role_outside_policy_is_forbidden() {
    let store = seeded_store();
    store
        .create_user(UserIdentity::new(
            "visiting.writer",
            "visiting.writer@example.com",
            "supersecret",
            vec![Role::new("contributor")],
        ))
        .unwrap();

    // whoami restricted to the manager responsibility for this server
    let mut config = test_config(TokenKind::Signed);
    config.policy = warden_auth::PolicyConfig::default()
        .with_roles(["administrator", "contributor"])
        .with_responsibility("manager", ["administrator"])
        .with_route("/v1/whoami", "GET", ["manager"])
        .with_route("/v1/ping", "GET", ["@passthrough"]);

    let server = TestServer::spawn(config, store).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(server.url("/v1/auth"))
        .json(&json!({ "username": "visiting.writer", "password": "supersecret" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bundle: serde_json::Value = resp.json().await.unwrap();
    let access = bundle["access_token"].as_str().unwrap();

    let resp = client
        .get(server.url("/v1/whoami"))
        .header("Authorization", format!("Bearer {access}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn tampered_signed_token_is_unauthorized() {
    let server = TestServer::spawn(test_config(TokenKind::Signed), seeded_store()).await;
    let client = reqwest::Client::new();
    let bundle = login(&client, &server).await;
    let access = bundle["access_token"].as_str().unwrap();

    let mut tampered = access.to_string();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'B' } else { 'A' });

    let resp = client
        .post(server.url("/v1/auth/verify"))
        .header("Authorization", format!("Bearer {tampered}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn get_auth_advertises_the_scheme() {
    let server = TestServer::spawn(test_config(TokenKind::Signed), seeded_store()).await;
    let resp = reqwest::get(server.url("/v1/auth")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("www-authenticate").unwrap(),
        "Bearer"
    );
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["WWW-Authenticate"], "Bearer");
}
