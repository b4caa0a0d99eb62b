/*
[INPUT]:  Auth provider session/events and the persisted token store
[OUTPUT]: Bearer token for API requests, kept in step with the provider session
[POS]:    Auth layer - bridge between the auth provider and the API client
[UPDATE]: When token resolution order or sync rules change
*/

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::auth::provider::{AuthChange, AuthProvider, ProviderSession};
use crate::auth::token_store::TokenStore;
use crate::http::TokenSource;

/// Keeps the stored bearer token eventually consistent with the provider
/// session and hands it to the API client.
#[derive(Clone)]
pub struct TokenBridge {
    provider: Arc<dyn AuthProvider>,
    store: TokenStore,
}

impl std::fmt::Debug for TokenBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBridge")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl TokenBridge {
    pub fn new(provider: Arc<dyn AuthProvider>, store: TokenStore) -> Self {
        Self { provider, store }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Token for the next request: the stored token first, then the
    /// provider session (cached back into the store).
    pub async fn resolve_token(&self) -> Option<String> {
        if let Some(token) = self.store.load() {
            return Some(token);
        }

        match self.provider.get_session().await {
            Ok(Some(session)) => {
                self.save(&session.access_token);
                Some(session.access_token)
            }
            Ok(None) => None,
            Err(err) => {
                debug!(error = %err, "no provider session for request");
                None
            }
        }
    }

    /// Mirror `session` into the store, or clear it.
    pub fn sync(&self, session: Option<&ProviderSession>) {
        match session {
            Some(session) => self.save(&session.access_token),
            None => self.clear(),
        }
    }

    /// Apply one provider event to the stored token.
    pub fn apply(&self, change: &AuthChange) {
        match change {
            AuthChange::SignedIn(session) | AuthChange::TokenRefreshed(session) => {
                self.sync(Some(session))
            }
            AuthChange::SignedOut => self.sync(None),
            AuthChange::UserUpdated(_) | AuthChange::PasswordRecovery => {}
        }
    }

    /// Follow provider events until `shutdown` is cancelled.
    pub fn spawn_listener(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let bridge = self.clone();
        let mut events = self.provider.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(change) => bridge.apply(&change),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "token bridge lagged behind auth events, resyncing");
                            let session = bridge.provider.get_session().await.ok().flatten();
                            bridge.sync(session.as_ref());
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            debug!("token bridge listener stopped");
        })
    }

    fn save(&self, token: &str) {
        if let Err(err) = self.store.save(token) {
            warn!(error = %err, "failed to persist bearer token");
        }
    }

    fn clear(&self) {
        if let Err(err) = self.store.clear() {
            warn!(error = %err, "failed to clear bearer token");
        }
    }
}

#[async_trait]
impl TokenSource for TokenBridge {
    async fn bearer_token(&self) -> Option<String> {
        self.resolve_token().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provider::MockAuthProvider;
    use std::time::Duration;

    #[tokio::test]
    async fn test_store_wins_over_provider() {
        let provider = Arc::new(MockAuthProvider::new("pw").with_session(
            MockAuthProvider::session_for("ada@example.com", "provider-token"),
        ));
        let store = TokenStore::in_memory();
        store.save("stored-token").unwrap();

        let bridge = TokenBridge::new(provider.clone(), store);
        assert_eq!(bridge.resolve_token().await.as_deref(), Some("stored-token"));
        assert_eq!(provider.get_session_calls(), 0);
    }

    #[tokio::test]
    async fn test_provider_token_is_cached_back() {
        let provider = Arc::new(MockAuthProvider::new("pw").with_session(
            MockAuthProvider::session_for("ada@example.com", "provider-token"),
        ));
        let bridge = TokenBridge::new(provider.clone(), TokenStore::in_memory());

        assert_eq!(bridge.resolve_token().await.as_deref(), Some("provider-token"));
        assert_eq!(bridge.store().load().as_deref(), Some("provider-token"));

        bridge.resolve_token().await;
        assert_eq!(provider.get_session_calls(), 1);
    }

    #[tokio::test]
    async fn test_no_session_means_no_token() {
        let bridge = TokenBridge::new(Arc::new(MockAuthProvider::new("pw")), TokenStore::in_memory());
        assert!(bridge.bearer_token().await.is_none());
    }

    #[tokio::test]
    async fn test_listener_follows_sign_in_and_out() {
        let provider = Arc::new(MockAuthProvider::new("pw"));
        let bridge = TokenBridge::new(provider.clone(), TokenStore::in_memory());
        let shutdown = CancellationToken::new();
        let handle = bridge.spawn_listener(shutdown.clone());

        provider.emit(AuthChange::SignedIn(MockAuthProvider::session_for("a@b.c", "t-1")));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(bridge.store().load().as_deref(), Some("t-1"));

        provider.emit(AuthChange::SignedOut);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(bridge.store().load().is_none());

        shutdown.cancel();
        handle.await.unwrap();
    }
}
