/*
[INPUT]:  VITE_SUPABASE_URL / VITE_SUPABASE_ANON_KEY and test credentials
[OUTPUT]: Signed-in user profile and persisted bearer token
[POS]:    Examples - auth session flow demonstration
[UPDATE]: When auth flow changes
*/

use std::sync::Arc;

use sagespace_client::*;

/// Example: Authentication flow
///
/// 1. Build the auth provider (guest mode when not configured)
/// 2. Wire token bridge, API client and session controller
/// 3. Restore any stored session
/// 4. Sign in with email/password if credentials are given
#[tokio::main]
async fn main() {
    println!("=== SageSpace Authentication Example ===\n");

    let auth_url = std::env::var("VITE_SUPABASE_URL").unwrap_or_default();
    let anon_key = std::env::var("VITE_SUPABASE_ANON_KEY").unwrap_or_default();
    let storage: Arc<dyn auth::LocalStorage> = Arc::new(FileStorage::open(".sagespace-example.json"));

    // Step 1: Auth provider
    let provider: Arc<dyn AuthProvider> =
        match GoTrueProvider::new(GoTrueConfig::new(auth_url, anon_key)) {
            Ok(provider) => Arc::new(provider.with_storage(storage.clone())),
            Err(e) => {
                println!("Auth provider unavailable ({e}), running as guest");
                Arc::new(DisabledAuthProvider::new())
            }
        };

    // Step 2: Bridge, client and session
    let bridge = Arc::new(TokenBridge::new(provider.clone(), TokenStore::new(storage)));
    let api_url = std::env::var("VITE_API_URL").ok();
    let client = match SageClient::with_config(ClientConfig {
        base_url: api_url,
        ..ClientConfig::default()
    }) {
        Ok(c) => c.with_token_source(bridge.clone()),
        Err(e) => {
            eprintln!("Failed to create client: {}", e);
            return;
        }
    };
    println!("✓ API client created (demo mode: {})", client.is_demo_mode());

    let session = AuthSession::new(provider, Arc::new(client), bridge, SessionConfig::default());

    // Step 3: Restore
    let state = session.initialize().await;
    match &state.user {
        Some(user) => println!("✓ Restored session for {}", user.name),
        None => println!("✓ No stored session, guest mode"),
    }

    // Step 4: Sign in
    let (Ok(email), Ok(password)) = (
        std::env::var("SAGESPACE_EMAIL"),
        std::env::var("SAGESPACE_PASSWORD"),
    ) else {
        println!("\nSet SAGESPACE_EMAIL and SAGESPACE_PASSWORD to try a sign-in.");
        return;
    };

    match session.sign_in(&email, &password).await {
        Ok(user) => println!("✓ Signed in as {} ({})", user.name, user.id),
        Err(e) => eprintln!("✗ Sign-in failed: {}", e),
    }
}
