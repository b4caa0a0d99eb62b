/*
[INPUT]:  Mock auth provider and mock API responses
[OUTPUT]: Test results for the auth session flow
[POS]:    Integration tests - auth provider, token bridge and session controller
[UPDATE]: When auth flow or token persistence changes
*/

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{mock_jwt_token, setup_mock_server};
use sagespace_client::auth::{SIGNUP_CONFIRMATION_MESSAGE, decode_claims};
use sagespace_client::{
    AuthError, AuthSession, ClientConfig, FileStorage, GoTrueConfig, GoTrueProvider,
    MockAuthProvider, SageClient, SessionConfig, TokenBridge, TokenStore,
};
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

fn quick_config() -> SessionConfig {
    SessionConfig {
        restore_timeout: Duration::from_millis(100),
        profile_timeout: Duration::from_millis(100),
        ..SessionConfig::default()
    }
}

/// Session wired the way the CLI wires it: the API client reads its
/// bearer token through the bridge.
fn wire(
    provider: Arc<MockAuthProvider>,
    api_config: ClientConfig,
    store: TokenStore,
) -> (AuthSession, Arc<TokenBridge>) {
    let bridge = Arc::new(TokenBridge::new(provider.clone(), store));
    let api = SageClient::with_config(api_config)
        .expect("client init")
        .with_token_source(bridge.clone());
    let session = AuthSession::new(provider, Arc::new(api), bridge.clone(), quick_config());
    (session, bridge)
}

#[test]
fn test_mock_jwt_decodes() {
    let claims = assert_ok!(decode_claims(&mock_jwt_token()));
    assert_eq!(claims.email.as_deref(), Some("ada@example.com"));
    assert!(claims.expires_at().is_some());
}

#[tokio::test]
async fn test_sign_in_hydrates_profile_with_bearer_token() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .and(header("authorization", "Bearer token-ada@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "id": "user-1", "name": "Ada Lovelace", "email": "ada@example.com" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Arc::new(MockAuthProvider::new("secret"));
    let (session, bridge) = wire(
        provider,
        ClientConfig::with_base_url(server.uri()),
        TokenStore::in_memory(),
    );

    let user = assert_ok!(session.sign_in("ada@example.com", "secret").await);
    assert_eq!(user.name, "Ada Lovelace");
    assert!(!session.state().loading);
    assert_eq!(bridge.store().load().as_deref(), Some("token-ada@example.com"));
}

#[tokio::test]
async fn test_slow_profile_falls_back_to_claims() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "id": "user-1", "name": "Too Late" }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let provider = Arc::new(MockAuthProvider::new("secret"));
    let (session, _) = wire(
        provider,
        ClientConfig::with_base_url(server.uri()),
        TokenStore::in_memory(),
    );

    let user = assert_ok!(session.sign_in("grace@example.com", "secret").await);
    assert_eq!(user.name, "grace");
}

#[tokio::test]
async fn test_restore_never_blocks_past_timeout() {
    let provider = Arc::new(
        MockAuthProvider::new("secret")
            .with_session(MockAuthProvider::session_for("ada@example.com", "t"))
            .with_session_delay(Duration::from_secs(10)),
    );
    let (session, _) = wire(provider, ClientConfig::default(), TokenStore::in_memory());

    let state = tokio::time::timeout(Duration::from_secs(1), session.initialize())
        .await
        .expect("initialize must settle within the restore timeout");
    assert!(!state.loading);
    assert!(state.user.is_none());
}

#[tokio::test]
async fn test_restored_session_is_authenticated() {
    let provider = Arc::new(
        MockAuthProvider::new("secret")
            .with_session(MockAuthProvider::session_for("ada@example.com", "restored")),
    );
    let (session, bridge) = wire(provider, ClientConfig::default(), TokenStore::in_memory());

    let state = session.initialize().await;
    assert!(state.is_authenticated());
    assert_eq!(bridge.store().load().as_deref(), Some("restored"));
}

#[tokio::test]
async fn test_sign_up_confirmation_message() {
    let provider = Arc::new(MockAuthProvider::new("secret").requiring_email_confirmation());
    let (session, _) = wire(provider, ClientConfig::default(), TokenStore::in_memory());

    let err = assert_err!(session.sign_up("new@example.com", "secret", None).await);
    assert_eq!(err, AuthError::ConfirmationRequired);
    assert_eq!(err.to_string(), SIGNUP_CONFIRMATION_MESSAGE);
}

#[tokio::test]
async fn test_token_file_written_on_sign_in_and_removed_on_sign_out() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("storage.json");
    let store = TokenStore::new(Arc::new(FileStorage::open(&path)));

    let provider = Arc::new(MockAuthProvider::new("secret"));
    let (session, _) = wire(provider, ClientConfig::default(), store);

    assert_ok!(session.sign_in("ada@example.com", "secret").await);
    let reopened = TokenStore::new(Arc::new(FileStorage::open(&path)));
    assert_eq!(reopened.load().as_deref(), Some("token-ada@example.com"));

    assert_ok!(session.sign_out().await);
    let reopened = TokenStore::new(Arc::new(FileStorage::open(&path)));
    assert!(reopened.load().is_none());
}

#[tokio::test]
async fn test_gotrue_sign_out_clears_even_when_server_fails() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": mock_jwt_token(),
            "refresh_token": "refresh-1",
            "user": { "id": "user-1", "email": "ada@example.com" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let provider = Arc::new(assert_ok!(GoTrueProvider::new(GoTrueConfig::new(
        server.uri(),
        "anon-key"
    ))));
    let bridge = Arc::new(TokenBridge::new(provider.clone(), TokenStore::in_memory()));
    let api = Arc::new(assert_ok!(SageClient::new()));
    let session = AuthSession::new(provider, api, bridge.clone(), quick_config());

    let user = assert_ok!(session.sign_in("ada@example.com", "pw").await);
    assert_eq!(user.name, "ada");

    assert_ok!(session.sign_out().await);
    assert!(session.user().is_none());
    assert!(bridge.store().load().is_none());
}

#[tokio::test]
async fn test_sign_in_with_watcher_fetches_profile_once() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({
                    "data": { "id": "user-ada@example.com", "name": "Ada Lovelace" }
                }))
                .set_delay(Duration::from_millis(40)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = Arc::new(MockAuthProvider::new("secret"));
    let (session, _) = wire(
        provider,
        ClientConfig::with_base_url(server.uri()),
        TokenStore::in_memory(),
    );
    let session = Arc::new(session);
    let watcher = session.watch_auth_changes();
    session.initialize().await;

    let user = assert_ok!(session.sign_in("ada@example.com", "secret").await);
    assert_eq!(user.name, "Ada Lovelace");

    // Let the watcher drain the SignedIn event.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(session.user().map(|user| user.name), Some("Ada Lovelace".to_string()));

    server.verify().await;
    session.shutdown();
    watcher.abort();
}
