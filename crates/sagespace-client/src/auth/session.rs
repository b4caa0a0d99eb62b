/*
[INPUT]:  Auth provider, API client, token bridge and session timeouts
[OUTPUT]: Observable auth state ({loading, user}) and sign-in/up/out operations
[POS]:    Auth layer - session controller the application views are built on
[UPDATE]: When auth transitions, timeouts or profile hydration change
*/

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::bridge::TokenBridge;
use crate::auth::provider::{AuthChange, AuthProvider, ProviderSession, ProviderUser, UserAttributes};
use crate::auth::{AuthError, Result};
use crate::http::SageClient;
use crate::types::{OAuthProvider, User, UserRole};

/// Timeouts and redirect targets for the session controller.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on restoring the provider session at startup.
    pub restore_timeout: Duration,
    /// Upper bound on fetching the backend profile after sign-in.
    pub profile_timeout: Duration,
    pub oauth_redirect_url: Option<String>,
    pub password_reset_redirect_url: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            restore_timeout: Duration::from_secs(2),
            profile_timeout: Duration::from_secs(3),
            oauth_redirect_url: None,
            password_reset_redirect_url: None,
        }
    }
}

/// Snapshot published to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub loading: bool,
    pub user: Option<User>,
}

impl AuthState {
    fn initializing() -> Self {
        Self {
            loading: true,
            user: None,
        }
    }

    fn settled(user: Option<User>) -> Self {
        Self {
            loading: false,
            user,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// Auth session controller.
///
/// Starts in `{loading: true, user: None}`; [`AuthSession::initialize`]
/// settles it into guest or authenticated mode. Once shut down (or
/// dropped) no further state is published.
pub struct AuthSession {
    provider: Arc<dyn AuthProvider>,
    api: Arc<SageClient>,
    bridge: Arc<TokenBridge>,
    config: SessionConfig,
    state: watch::Sender<AuthState>,
    alive: CancellationToken,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("config", &self.config)
            .field("state", &*self.state.borrow())
            .field("alive", &!self.alive.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl AuthSession {
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        api: Arc<SageClient>,
        bridge: Arc<TokenBridge>,
        config: SessionConfig,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::initializing());
        Self {
            provider,
            api,
            bridge,
            config,
            state,
            alive: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Token cancelled when the controller shuts down.
    pub fn alive_token(&self) -> CancellationToken {
        self.alive.clone()
    }

    pub fn shutdown(&self) {
        self.alive.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.alive.is_cancelled()
    }

    /// Restore the provider session, bounded by `restore_timeout`.
    ///
    /// Never fails: timeouts, provider errors and missing sessions all end
    /// in guest mode.
    pub async fn initialize(&self) -> AuthState {
        self.publish(AuthState::initializing());

        let session = match timeout(self.config.restore_timeout, self.provider.get_session()).await {
            Ok(Ok(session)) => session,
            Ok(Err(err)) => {
                warn!(error = %err, "session restore failed, continuing as guest");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.restore_timeout.as_millis() as u64,
                    "session restore timed out, continuing as guest"
                );
                None
            }
        };

        match session {
            Some(session) => {
                self.establish(&session).await;
            }
            None => {
                debug!("no stored session");
                self.publish(AuthState::settled(None));
            }
        }
        self.state()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        self.set_loading();
        match self.provider.sign_in_with_password(email, password).await {
            Ok(session) => Ok(self.establish(&session).await),
            Err(err) => {
                self.settle_unchanged();
                Err(err)
            }
        }
    }

    /// Create an account. Returns [`AuthError::ConfirmationRequired`] when
    /// the provider wants the email confirmed before issuing a session.
    pub async fn sign_up(&self, email: &str, password: &str, name: Option<&str>) -> Result<User> {
        self.set_loading();
        let metadata = match name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => json!({ "full_name": name }),
            None => json!({}),
        };

        match self.provider.sign_up(email, password, metadata).await {
            Ok(outcome) => match outcome.session {
                Some(session) => Ok(self.establish(&session).await),
                None => {
                    info!(email, "account created, awaiting email confirmation");
                    self.publish(AuthState::settled(None));
                    Err(AuthError::ConfirmationRequired)
                }
            },
            Err(err) => {
                self.settle_unchanged();
                Err(err)
            }
        }
    }

    /// Sign out locally even when the provider call fails.
    pub async fn sign_out(&self) -> Result<()> {
        self.set_loading();
        if let Err(err) = self.provider.sign_out().await {
            warn!(error = %err, "provider sign-out failed, clearing local session anyway");
        }
        self.bridge.sync(None);
        self.publish(AuthState::settled(None));
        info!("signed out");
        Ok(())
    }

    /// Start the Google OAuth flow; the caller sends the user agent to the
    /// returned URL and later calls [`AuthSession::complete_oauth`].
    pub async fn sign_in_with_google(&self) -> Result<Url> {
        self.set_loading();
        let result = self
            .provider
            .sign_in_with_oauth(OAuthProvider::Google, self.config.oauth_redirect_url.as_deref())
            .await;
        self.settle_unchanged();
        result
    }

    /// Adopt the tokens delivered to the OAuth callback.
    pub async fn complete_oauth(&self, access_token: &str, refresh_token: &str) -> Result<User> {
        self.set_loading();
        match self.provider.set_session(access_token, refresh_token).await {
            Ok(session) => Ok(self.establish(&session).await),
            Err(err) => {
                self.settle_unchanged();
                Err(err)
            }
        }
    }

    /// [`AuthSession::complete_oauth`] for a raw callback URL carrying the
    /// tokens in its fragment (or query).
    pub async fn complete_oauth_redirect(&self, callback: &Url) -> Result<User> {
        let (access_token, refresh_token) = oauth_tokens_from_callback(callback)?;
        self.complete_oauth(&access_token, &refresh_token).await
    }

    pub async fn reset_password(&self, email: &str) -> Result<()> {
        self.provider
            .reset_password_for_email(email, self.config.password_reset_redirect_url.as_deref())
            .await
    }

    pub async fn update_password(&self, new_password: &str) -> Result<()> {
        let attributes = UserAttributes {
            password: Some(new_password.to_string()),
            ..UserAttributes::default()
        };
        self.provider.update_user(&attributes).await.map(|_| ())
    }

    /// Re-read the session and profile.
    pub async fn refresh_user(&self) -> Result<Option<User>> {
        match self.provider.get_session().await? {
            Some(session) => Ok(Some(self.establish(&session).await)),
            None => {
                self.bridge.sync(None);
                self.publish(AuthState::settled(None));
                Ok(None)
            }
        }
    }

    /// React to provider events until the controller is shut down or dropped.
    pub fn watch_auth_changes(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let alive = self.alive.clone();
        let mut events = self.provider.subscribe();

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = alive.cancelled() => break,
                    event = events.recv() => event,
                };
                let Some(session) = weak.upgrade() else {
                    break;
                };
                match event {
                    Ok(change) => session.handle_change(change).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "auth event stream lagged, refreshing user");
                        if let Err(err) = session.refresh_user().await {
                            warn!(error = %err, "refresh after lag failed");
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("auth change watcher stopped");
        })
    }

    async fn handle_change(&self, change: AuthChange) {
        match change {
            AuthChange::SignedOut => {
                self.bridge.sync(None);
                self.publish(AuthState::settled(None));
            }
            AuthChange::TokenRefreshed(session) => self.bridge.sync(Some(&session)),
            AuthChange::SignedIn(session) => {
                // A transition in flight publishes its own user.
                let in_flight = self.state().loading;
                let mirrored = self
                    .bridge
                    .store()
                    .load()
                    .is_some_and(|token| token == session.access_token);
                let known = self
                    .user()
                    .is_some_and(|user| user.id == session.user.id);
                if in_flight || mirrored || known {
                    self.bridge.sync(Some(&session));
                } else {
                    self.establish(&session).await;
                }
            }
            AuthChange::UserUpdated(_) => {
                if let Err(err) = self.refresh_user().await {
                    warn!(error = %err, "profile refresh after user update failed");
                }
            }
            AuthChange::PasswordRecovery => debug!("password recovery session started"),
        }
    }

    /// Mirror the token, hydrate the profile and publish the user.
    async fn establish(&self, session: &ProviderSession) -> User {
        self.bridge.sync(Some(session));
        let user = self.hydrate_user(session).await;
        info!(user_id = %user.id, "signed in");
        self.publish(AuthState::settled(Some(user.clone())));
        user
    }

    async fn hydrate_user(&self, session: &ProviderSession) -> User {
        match timeout(self.config.profile_timeout, self.api.fetch_current_user()).await {
            Ok(Ok(user)) => user,
            Ok(Err(err)) => {
                debug!(error = %err, "profile fetch failed, using session claims");
                user_from_claims(&session.user)
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.profile_timeout.as_millis() as u64,
                    "profile fetch timed out, using session claims"
                );
                user_from_claims(&session.user)
            }
        }
    }

    fn set_loading(&self) {
        let user = self.user();
        self.publish(AuthState {
            loading: true,
            user,
        });
    }

    fn settle_unchanged(&self) {
        let user = self.user();
        self.publish(AuthState::settled(user));
    }

    fn publish(&self, state: AuthState) {
        if self.alive.is_cancelled() {
            debug!("auth session shut down, dropping state update");
            return;
        }
        self.state.send_replace(state);
    }
}

impl Drop for AuthSession {
    fn drop(&mut self) {
        self.alive.cancel();
    }
}

/// Profile built from the provider's user record when the backend profile
/// is unavailable.
pub fn user_from_claims(user: &ProviderUser) -> User {
    let email_name = user
        .email
        .as_deref()
        .and_then(|email| email.split('@').next())
        .filter(|local| !local.is_empty());

    let name = user
        .metadata_str("full_name")
        .or_else(|| user.metadata_str("name"))
        .or(email_name)
        .unwrap_or("User")
        .to_string();

    let avatar_url = user
        .metadata_str("avatar_url")
        .or_else(|| user.metadata_str("picture"))
        .map(str::to_string);

    User {
        id: user.id.clone(),
        name,
        email: user.email.clone(),
        avatar_url,
        bio: None,
        role: UserRole::default(),
        created_at: user.created_at,
        updated_at: None,
    }
}

fn oauth_tokens_from_callback(callback: &Url) -> Result<(String, String)> {
    let pairs: Vec<(String, String)> = match callback.fragment() {
        Some(fragment) if !fragment.is_empty() => url::form_urlencoded::parse(fragment.as_bytes())
            .into_owned()
            .collect(),
        _ => callback.query_pairs().into_owned().collect(),
    };
    let lookup = |key: &str| {
        pairs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.clone())
    };

    if let Some(description) = lookup("error_description").or_else(|| lookup("error")) {
        return Err(AuthError::from_provider_message(&description));
    }
    match (lookup("access_token"), lookup("refresh_token")) {
        (Some(access), Some(refresh)) => Ok((access, refresh)),
        _ => Err(AuthError::InvalidResponse(
            "OAuth callback did not include session tokens".to_string(),
        )),
    }
}

impl From<&ProviderUser> for User {
    fn from(user: &ProviderUser) -> Self {
        user_from_claims(user)
    }
}
