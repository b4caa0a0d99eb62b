/*
[INPUT]:  Credentials, OAuth redirects and session tokens
[OUTPUT]: Provider sessions, users and auth-state change events
[POS]:    Auth layer - external auth provider abstraction
[UPDATE]: When adding provider operations or changing session shape
*/

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use url::Url;

use crate::auth::{AuthError, Result};
use crate::types::OAuthProvider;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// User record as the auth provider sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ProviderUser {
    /// Non-empty string claim from `user_metadata`.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Session owned by the auth provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: ProviderUser,
}

impl ProviderSession {
    /// Expired, or expiring within `leeway`. Sessions without expiry never expire.
    pub fn expires_within(&self, leeway: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let leeway = chrono::Duration::from_std(leeway).unwrap_or_else(|_| chrono::Duration::zero());
                Utc::now() + leeway >= expires_at
            }
            None => false,
        }
    }
}

/// Outcome of a sign-up: `session` is `None` when email confirmation is required.
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpOutcome {
    pub user: Option<ProviderUser>,
    pub session: Option<ProviderSession>,
}

/// Auth-state change notifications (`onAuthStateChange`).
#[derive(Debug, Clone, PartialEq)]
pub enum AuthChange {
    SignedIn(ProviderSession),
    SignedOut,
    TokenRefreshed(ProviderSession),
    UserUpdated(ProviderUser),
    PasswordRecovery,
}

/// Attributes accepted by [`AuthProvider::update_user`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// External auth provider.
///
/// Implementations own the session and broadcast every change to subscribers.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Current session, refreshed first when it has expired.
    async fn get_session(&self) -> Result<Option<ProviderSession>>;

    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<ProviderSession>;

    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<SignUpOutcome>;

    async fn sign_out(&self) -> Result<()>;

    /// URL the user agent must visit to start the OAuth flow.
    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: Option<&str>,
    ) -> Result<Url>;

    async fn reset_password_for_email(&self, email: &str, redirect_to: Option<&str>) -> Result<()>;

    async fn update_user(&self, attributes: &UserAttributes) -> Result<ProviderUser>;

    /// Adopt tokens obtained out of band (OAuth callback).
    async fn set_session(&self, access_token: &str, refresh_token: &str) -> Result<ProviderSession>;
}

/// Provider used when no auth URL/key is configured: there is never a
/// session and every sign-in attempt fails with `NotConfigured`.
#[derive(Debug)]
pub struct DisabledAuthProvider {
    events: broadcast::Sender<AuthChange>,
}

impl DisabledAuthProvider {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(1);
        Self { events }
    }
}

impl Default for DisabledAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthProvider for DisabledAuthProvider {
    async fn get_session(&self) -> Result<Option<ProviderSession>> {
        Ok(None)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(&self, _email: &str, _password: &str) -> Result<ProviderSession> {
        Err(AuthError::NotConfigured)
    }

    async fn sign_up(&self, _email: &str, _password: &str, _metadata: Value) -> Result<SignUpOutcome> {
        Err(AuthError::NotConfigured)
    }

    async fn sign_out(&self) -> Result<()> {
        Ok(())
    }

    async fn sign_in_with_oauth(
        &self,
        _provider: OAuthProvider,
        _redirect_to: Option<&str>,
    ) -> Result<Url> {
        Err(AuthError::NotConfigured)
    }

    async fn reset_password_for_email(&self, _email: &str, _redirect_to: Option<&str>) -> Result<()> {
        Err(AuthError::NotConfigured)
    }

    async fn update_user(&self, _attributes: &UserAttributes) -> Result<ProviderUser> {
        Err(AuthError::NotConfigured)
    }

    async fn set_session(&self, _access_token: &str, _refresh_token: &str) -> Result<ProviderSession> {
        Err(AuthError::NotConfigured)
    }
}

/// In-memory provider for testing.
///
/// Accepts one password, optionally delays `get_session`, and counts calls.
#[derive(Debug)]
pub struct MockAuthProvider {
    session: RwLock<Option<ProviderSession>>,
    password: String,
    session_delay: Duration,
    confirm_email: bool,
    events: broadcast::Sender<AuthChange>,
    get_session_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
}

impl MockAuthProvider {
    /// Provider accepting `password` for any email.
    pub fn new(password: &str) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            session: RwLock::new(None),
            password: password.to_string(),
            session_delay: Duration::ZERO,
            confirm_email: false,
            events,
            get_session_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
        }
    }

    /// Start with an existing session.
    pub fn with_session(self, session: ProviderSession) -> Self {
        if let Ok(mut guard) = self.session.write() {
            *guard = Some(session);
        }
        self
    }

    /// Delay every `get_session` call.
    pub fn with_session_delay(mut self, delay: Duration) -> Self {
        self.session_delay = delay;
        self
    }

    /// Sign-ups return no session until the email is confirmed.
    pub fn requiring_email_confirmation(mut self) -> Self {
        self.confirm_email = true;
        self
    }

    /// Build a session for `email` with a fixed access token.
    pub fn session_for(email: &str, access_token: &str) -> ProviderSession {
        ProviderSession {
            access_token: access_token.to_string(),
            refresh_token: format!("refresh-{access_token}"),
            expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
            user: ProviderUser {
                id: format!("user-{email}"),
                email: Some(email.to_string()),
                user_metadata: Value::Object(Default::default()),
                created_at: Some(Utc::now()),
            },
        }
    }

    /// Emit a change as if it happened on the provider side.
    pub fn emit(&self, change: AuthChange) {
        if let AuthChange::SignedIn(session) | AuthChange::TokenRefreshed(session) = &change {
            self.store(Some(session.clone()));
        }
        if matches!(change, AuthChange::SignedOut) {
            self.store(None);
        }
        let _ = self.events.send(change);
    }

    pub fn get_session_calls(&self) -> usize {
        self.get_session_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    fn store(&self, session: Option<ProviderSession>) {
        if let Ok(mut guard) = self.session.write() {
            *guard = session;
        }
    }

    fn current(&self) -> Option<ProviderSession> {
        self.session.read().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    async fn get_session(&self) -> Result<Option<ProviderSession>> {
        self.get_session_calls.fetch_add(1, Ordering::SeqCst);
        if !self.session_delay.is_zero() {
            tokio::time::sleep(self.session_delay).await;
        }
        Ok(self.current())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<ProviderSession> {
        if password != self.password {
            return Err(AuthError::from_provider_message("Invalid login credentials"));
        }
        let session = Self::session_for(email, &format!("token-{email}"));
        self.emit(AuthChange::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, _password: &str, metadata: Value) -> Result<SignUpOutcome> {
        let mut session = Self::session_for(email, &format!("token-{email}"));
        session.user.user_metadata = metadata;
        if self.confirm_email {
            return Ok(SignUpOutcome {
                user: Some(session.user),
                session: None,
            });
        }
        self.emit(AuthChange::SignedIn(session.clone()));
        Ok(SignUpOutcome {
            user: Some(session.user.clone()),
            session: Some(session),
        })
    }

    async fn sign_out(&self) -> Result<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.emit(AuthChange::SignedOut);
        Ok(())
    }

    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: Option<&str>,
    ) -> Result<Url> {
        let mut url = Url::parse("https://auth.mock/authorize")
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        url.query_pairs_mut().append_pair("provider", provider.as_str());
        if let Some(redirect_to) = redirect_to {
            url.query_pairs_mut().append_pair("redirect_to", redirect_to);
        }
        Ok(url)
    }

    async fn reset_password_for_email(&self, _email: &str, _redirect_to: Option<&str>) -> Result<()> {
        Ok(())
    }

    async fn update_user(&self, attributes: &UserAttributes) -> Result<ProviderUser> {
        let mut session = self.current().ok_or(AuthError::NoSession)?;
        if let Some(email) = &attributes.email {
            session.user.email = Some(email.clone());
        }
        if let Some(data) = &attributes.data {
            session.user.user_metadata = data.clone();
        }
        self.store(Some(session.clone()));
        let _ = self.events.send(AuthChange::UserUpdated(session.user.clone()));
        Ok(session.user)
    }

    async fn set_session(&self, access_token: &str, refresh_token: &str) -> Result<ProviderSession> {
        let mut session = Self::session_for("oauth@example.com", access_token);
        session.refresh_token = refresh_token.to_string();
        self.emit(AuthChange::SignedIn(session.clone()));
        Ok(session)
    }
}

/// Shared handle type used throughout the crate.
pub type SharedAuthProvider = Arc<dyn AuthProvider>;
