/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for sagespace-client tests

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sagespace_client::{ClientConfig, SageClient, StaticToken};
use wiremock::MockServer;

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// API client pointed at the mock server, authenticated with a static token
#[allow(dead_code)]
pub fn client_for(server: &MockServer) -> SageClient {
    SageClient::with_config(ClientConfig::with_base_url(server.uri()))
        .expect("client init")
        .with_token_source(Arc::new(StaticToken(mock_jwt_token())))
}

/// Unsigned JWT carrying a subject, email and an expiry one hour out
pub fn mock_jwt_token() -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let exp = chrono::Utc::now().timestamp() + 3600;
    let claims = serde_json::json!({ "sub": "user-1", "email": "ada@example.com", "exp": exp });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}
