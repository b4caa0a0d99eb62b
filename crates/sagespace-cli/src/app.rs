/*
[INPUT]:  Application configuration
[OUTPUT]: Wired API client, auth provider, token bridge, session and queries
[POS]:    Composition root - builds the client stack once per process
[UPDATE]: When library components or their wiring change
*/

use std::sync::Arc;

use anyhow::{Context, Result};
use sagespace_client::auth::{LocalStorage, SharedAuthProvider};
use sagespace_client::{
    AuthSession, DisabledAuthProvider, FeedQueries, FileStorage, GoTrueProvider, SageClient,
    TokenBridge, TokenStore,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AppConfig;

/// Every long-lived component of the client, wired together.
pub struct App {
    pub config: AppConfig,
    pub client: Arc<SageClient>,
    pub bridge: Arc<TokenBridge>,
    pub session: Arc<AuthSession>,
    pub queries: FeedQueries,
    shutdown: CancellationToken,
}

impl App {
    pub fn build(config: AppConfig) -> Result<Self> {
        let token_path = config.token_path();
        let storage: Arc<dyn LocalStorage> = Arc::new(FileStorage::open(&token_path));

        let provider: SharedAuthProvider = match config.gotrue_config() {
            Some(gotrue) => {
                let provider = GoTrueProvider::new(gotrue).context("configure auth provider")?;
                Arc::new(provider.with_storage(storage.clone()))
            }
            None => {
                warn!("auth provider not configured, running as guest");
                Arc::new(DisabledAuthProvider::new())
            }
        };

        let bridge = Arc::new(TokenBridge::new(provider.clone(), TokenStore::new(storage)));
        let client = SageClient::with_config(config.client_config())
            .context("configure API client")?
            .with_token_source(bridge.clone());
        let client = Arc::new(client);

        if client.is_demo_mode() {
            warn!("API URL not configured, running in demo mode");
        }

        let session = Arc::new(AuthSession::new(
            provider,
            client.clone(),
            bridge.clone(),
            config.session_config(),
        ));
        let queries = FeedQueries::new(client.clone());

        info!(
            token_file = %token_path.display(),
            demo_mode = client.is_demo_mode(),
            "client stack ready"
        );

        Ok(Self {
            config,
            client,
            bridge,
            session,
            queries,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Restore the stored session and start following provider events.
    pub async fn start(&self) {
        self.bridge.spawn_listener(self.shutdown.child_token());
        self.session.watch_auth_changes();
        self.queries
            .clear_on_account_change(self.session.subscribe(), self.shutdown.child_token());
        self.session.initialize().await;
    }

    pub fn stop(&self) {
        self.session.shutdown();
        self.shutdown.cancel();
    }
}
