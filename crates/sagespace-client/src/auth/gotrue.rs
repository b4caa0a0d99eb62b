/*
[INPUT]:  Auth service URL, anon key, credentials and refresh tokens
[OUTPUT]: Provider sessions over the GoTrue REST API, plus auth-state events
[POS]:    Auth layer - concrete auth provider used by the CLI and apps
[UPDATE]: When GoTrue endpoints, payloads or session persistence change
*/

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::auth::jwt::decode_claims;
use crate::auth::provider::{
    AuthChange, AuthProvider, ProviderSession, ProviderUser, SignUpOutcome, UserAttributes,
};
use crate::auth::token_store::LocalStorage;
use crate::auth::{AuthError, Result};
use crate::types::OAuthProvider;

/// Storage key for the serialized provider session.
pub const SESSION_KEY: &str = "sagespace.auth.session";

const API_KEY_HEADER: &str = "apikey";
const REFRESH_LEEWAY: Duration = Duration::from_secs(60);
const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct GoTrueConfig {
    /// Project URL; `/auth/v1` is appended.
    pub url: String,
    pub anon_key: String,
    pub timeout: Duration,
}

impl GoTrueConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Token grant / session payload.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: ProviderUser,
}

impl TokenResponse {
    fn into_session(self) -> ProviderSession {
        let expires_at = session_expiry(&self.access_token, self.expires_at, self.expires_in);
        ProviderSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// GoTrue-compatible auth provider.
#[derive(Debug)]
pub struct GoTrueProvider {
    http_client: Client,
    auth_url: Url,
    anon_key: String,
    session: Arc<RwLock<Option<ProviderSession>>>,
    storage: Option<Arc<dyn LocalStorage>>,
    events: broadcast::Sender<AuthChange>,
}

impl GoTrueProvider {
    pub fn new(config: GoTrueConfig) -> Result<Self> {
        let base = config.url.trim().trim_end_matches('/');
        if base.is_empty() || config.anon_key.trim().is_empty() {
            return Err(AuthError::NotConfigured);
        }
        let auth_url = Url::parse(&format!("{base}/auth/v1/"))
            .map_err(|e| AuthError::InvalidResponse(format!("invalid auth URL: {e}")))?;

        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            http_client,
            auth_url,
            anon_key: config.anon_key,
            session: Arc::new(RwLock::new(None)),
            storage: None,
            events,
        })
    }

    /// Persist the session in `storage` and restore any session saved there.
    pub fn with_storage(mut self, storage: Arc<dyn LocalStorage>) -> Self {
        let restored = storage
            .get_item(SESSION_KEY)
            .and_then(|raw| match serde_json::from_str::<ProviderSession>(&raw) {
                Ok(session) => Some(session),
                Err(err) => {
                    warn!(error = %err, "discarding unreadable stored session");
                    None
                }
            });
        if let Some(session) = restored {
            debug!(user_id = %session.user.id, "restored stored session");
            self.write_session(Some(session));
        }
        self.storage = Some(storage);
        self
    }

    fn current(&self) -> Option<ProviderSession> {
        self.session.read().ok().and_then(|guard| guard.clone())
    }

    fn write_session(&self, session: Option<ProviderSession>) {
        if let Ok(mut guard) = self.session.write() {
            *guard = session;
        }
    }

    /// Replace the session, persist it and notify subscribers.
    fn commit(&self, session: Option<ProviderSession>, change: AuthChange) {
        self.write_session(session.clone());
        if let Some(storage) = &self.storage {
            let persisted = match &session {
                Some(session) => serde_json::to_string(session)
                    .map_err(|e| e.to_string())
                    .and_then(|raw| storage.set_item(SESSION_KEY, &raw).map_err(|e| e.to_string())),
                None => storage.remove_item(SESSION_KEY).map_err(|e| e.to_string()),
            };
            if let Err(err) = persisted {
                warn!(error = %err, "failed to persist auth session");
            }
        }
        // No subscribers is fine.
        let _ = self.events.send(change);
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.auth_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| AuthError::InvalidResponse(format!("invalid auth endpoint: {e}")))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .header(API_KEY_HEADER, &self.anon_key)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|body| provider_error_message(&body))
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Authentication request failed")
                        .to_string()
                });
            debug!(status = status.as_u16(), %message, "auth request rejected");
            return Err(AuthError::from_provider_message(&message));
        }

        let body = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(body).map_err(|e| AuthError::InvalidResponse(e.to_string()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<ProviderSession> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", "refresh_token");
        let builder = self
            .request(Method::POST, url)
            .json(&json!({ "refresh_token": refresh_token }));
        let session = self.send::<TokenResponse>(builder).await?.into_session();
        info!(user_id = %session.user.id, "session refreshed");
        self.commit(Some(session.clone()), AuthChange::TokenRefreshed(session.clone()));
        Ok(session)
    }

    async fn fetch_user(&self, access_token: &str) -> Result<ProviderUser> {
        let builder = self
            .request(Method::GET, self.endpoint("user")?)
            .bearer_auth(access_token);
        self.send(builder).await
    }
}

#[async_trait]
impl AuthProvider for GoTrueProvider {
    async fn get_session(&self) -> Result<Option<ProviderSession>> {
        let Some(session) = self.current() else {
            return Ok(None);
        };
        if !session.expires_within(REFRESH_LEEWAY) {
            return Ok(Some(session));
        }

        match self.refresh(&session.refresh_token).await {
            Ok(session) => Ok(Some(session)),
            Err(err @ AuthError::Rejected(_)) => {
                warn!(error = %err, "refresh token rejected, signing out");
                self.commit(None, AuthChange::SignedOut);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<ProviderSession> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let builder = self
            .request(Method::POST, url)
            .json(&json!({ "email": email, "password": password }));

        let session = self.send::<TokenResponse>(builder).await?.into_session();
        info!(user_id = %session.user.id, "signed in with password");
        self.commit(Some(session.clone()), AuthChange::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<SignUpOutcome> {
        let builder = self.request(Method::POST, self.endpoint("signup")?).json(&json!({
            "email": email,
            "password": password,
            "data": metadata,
        }));
        let body: Value = self.send(builder).await?;

        // Auto-confirmed projects answer with a session, others with the bare user.
        if body.get("access_token").is_some() {
            let session = serde_json::from_value::<TokenResponse>(body)
                .map_err(|e| AuthError::InvalidResponse(e.to_string()))?
                .into_session();
            self.commit(Some(session.clone()), AuthChange::SignedIn(session.clone()));
            return Ok(SignUpOutcome {
                user: Some(session.user.clone()),
                session: Some(session),
            });
        }

        let user_value = body.get("user").cloned().unwrap_or(body);
        let user = serde_json::from_value::<ProviderUser>(user_value).ok();
        info!(email, "sign-up pending email confirmation");
        Ok(SignUpOutcome { user, session: None })
    }

    async fn sign_out(&self) -> Result<()> {
        let session = self.current();
        // Local state goes regardless of what the server says.
        self.commit(None, AuthChange::SignedOut);

        let Some(session) = session else {
            return Ok(());
        };
        let builder = self
            .request(Method::POST, self.endpoint("logout")?)
            .bearer_auth(&session.access_token);
        self.send::<Value>(builder).await.map(|_| ())
    }

    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: Option<&str>,
    ) -> Result<Url> {
        let mut url = self.endpoint("authorize")?;
        url.query_pairs_mut().append_pair("provider", provider.as_str());
        if let Some(redirect_to) = redirect_to {
            url.query_pairs_mut().append_pair("redirect_to", redirect_to);
        }
        Ok(url)
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: Option<&str>) -> Result<()> {
        let mut url = self.endpoint("recover")?;
        if let Some(redirect_to) = redirect_to {
            url.query_pairs_mut().append_pair("redirect_to", redirect_to);
        }
        let builder = self.request(Method::POST, url).json(&json!({ "email": email }));
        self.send::<Value>(builder).await.map(|_| ())
    }

    async fn update_user(&self, attributes: &UserAttributes) -> Result<ProviderUser> {
        let session = self.get_session().await?.ok_or(AuthError::NoSession)?;
        let builder = self
            .request(Method::PUT, self.endpoint("user")?)
            .bearer_auth(&session.access_token)
            .json(attributes);
        let user: ProviderUser = self.send(builder).await?;

        let updated = ProviderSession {
            user: user.clone(),
            ..session
        };
        self.commit(Some(updated), AuthChange::UserUpdated(user.clone()));
        Ok(user)
    }

    async fn set_session(&self, access_token: &str, refresh_token: &str) -> Result<ProviderSession> {
        let user = self.fetch_user(access_token).await?;
        let session = ProviderSession {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_at: session_expiry(access_token, None, None),
            user,
        };
        info!(user_id = %session.user.id, "session adopted from OAuth callback");
        self.commit(Some(session.clone()), AuthChange::SignedIn(session.clone()));
        Ok(session)
    }
}

/// Expiry from the explicit timestamp, then `expires_in`, then the JWT `exp`.
fn session_expiry(
    access_token: &str,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
) -> Option<DateTime<Utc>> {
    expires_at
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .or_else(|| expires_in.map(|secs| Utc::now() + chrono::Duration::seconds(secs)))
        .or_else(|| decode_claims(access_token).ok().and_then(|c| c.expires_at()))
}

/// GoTrue error bodies vary by endpoint and version.
fn provider_error_message(body: &Value) -> Option<String> {
    ["error_description", "msg", "message", "error"]
        .iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|message| !message.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::make_test_jwt;
    use crate::auth::messages::AuthFailure;
    use crate::auth::token_store::MemoryStorage;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> GoTrueProvider {
        GoTrueProvider::new(GoTrueConfig::new(server.uri(), "anon-key")).unwrap()
    }

    fn token_body(access_token: &str) -> Value {
        json!({
            "access_token": access_token,
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-1",
            "user": { "id": "user-1", "email": "ada@example.com", "user_metadata": { "full_name": "Ada" } }
        })
    }

    #[test]
    fn test_error_message_priority() {
        let body = json!({ "error": "invalid_grant", "error_description": "Invalid login credentials" });
        assert_eq!(provider_error_message(&body).as_deref(), Some("Invalid login credentials"));

        let body = json!({ "code": 422, "msg": "User already registered" });
        assert_eq!(provider_error_message(&body).as_deref(), Some("User already registered"));

        assert!(provider_error_message(&json!({})).is_none());
    }

    #[test]
    fn test_expiry_falls_back_to_jwt_claim() {
        let token = make_test_jwt(json!({ "sub": "u", "exp": 1_900_000_000 }));
        let expiry = session_expiry(&token, None, None).unwrap();
        assert_eq!(expiry.timestamp(), 1_900_000_000);
    }

    #[test]
    fn test_missing_config_is_not_configured() {
        let err = GoTrueProvider::new(GoTrueConfig::new("", "")).unwrap_err();
        assert_eq!(err, AuthError::NotConfigured);
    }

    #[tokio::test]
    async fn test_password_sign_in_stores_session_and_emits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon-key"))
            .and(body_json(json!({ "email": "ada@example.com", "password": "pw" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-1")))
            .expect(1)
            .mount(&server)
            .await;

        let storage = Arc::new(MemoryStorage::new());
        let provider = provider_for(&server).with_storage(storage.clone());
        let mut events = provider.subscribe();

        let session = provider.sign_in_with_password("ada@example.com", "pw").await.unwrap();
        assert_eq!(session.access_token, "access-1");
        assert!(session.expires_at.is_some());
        assert!(matches!(events.recv().await.unwrap(), AuthChange::SignedIn(_)));
        assert!(storage.get_item(SESSION_KEY).is_some());

        assert_eq!(provider.get_session().await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn test_rejected_sign_in_is_enriched() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .sign_in_with_password("ada@example.com", "bad")
            .await
            .unwrap_err();
        assert_eq!(err.failure(), Some(&AuthFailure::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_sign_up_without_session_needs_confirmation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "user-2",
                "email": "new@example.com",
                "user_metadata": {}
            })))
            .mount(&server)
            .await;

        let outcome = provider_for(&server)
            .sign_up("new@example.com", "secret", json!({ "full_name": "New" }))
            .await
            .unwrap();
        assert!(outcome.session.is_none());
        assert_eq!(outcome.user.unwrap().id, "user-2");
    }

    #[tokio::test]
    async fn test_expired_session_is_refreshed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(body_json(json!({ "refresh_token": "stale-refresh" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-2")))
            .expect(1)
            .mount(&server)
            .await;

        let storage = Arc::new(MemoryStorage::new());
        let stale = ProviderSession {
            access_token: "access-old".to_string(),
            refresh_token: "stale-refresh".to_string(),
            expires_at: Some(Utc::now() - chrono::Duration::minutes(5)),
            user: serde_json::from_value(json!({ "id": "user-1" })).unwrap(),
        };
        storage
            .set_item(SESSION_KEY, &serde_json::to_string(&stale).unwrap())
            .unwrap();

        let provider = provider_for(&server).with_storage(storage);
        let session = provider.get_session().await.unwrap().unwrap();
        assert_eq!(session.access_token, "access-2");
    }

    #[tokio::test]
    async fn test_oauth_url_is_built_locally() {
        let provider = GoTrueProvider::new(GoTrueConfig::new("https://proj.example.co", "k")).unwrap();
        let url = provider
            .sign_in_with_oauth(OAuthProvider::Google, Some("http://localhost:5173/auth/callback"))
            .await
            .unwrap();
        assert_eq!(url.path(), "/auth/v1/authorize");
        assert!(url.query().unwrap().contains("provider=google"));
        assert!(url.query().unwrap().contains("redirect_to="));
    }
}
