/*
[INPUT]:  Auth provider configuration, credentials and persisted client state
[OUTPUT]: Auth session controller, token bridge, provider implementations and auth errors
[POS]:    Auth layer - everything between the auth provider and the API client
[UPDATE]: When auth flow, providers or token persistence change
*/

pub mod bridge;
pub mod error;
pub mod gotrue;
pub mod jwt;
pub mod messages;
pub mod provider;
pub mod session;
pub mod token_store;

pub use bridge::TokenBridge;
pub use error::{AuthError, Result, SIGNUP_CONFIRMATION_MESSAGE};
pub use gotrue::{GoTrueConfig, GoTrueProvider};
pub use jwt::{JwtClaims, decode_claims};
pub use messages::AuthFailure;
pub use provider::{
    AuthChange, AuthProvider, DisabledAuthProvider, MockAuthProvider, ProviderSession,
    ProviderUser, SharedAuthProvider, SignUpOutcome, UserAttributes,
};
pub use session::{AuthSession, AuthState, SessionConfig, user_from_claims};
pub use token_store::{FileStorage, LocalStorage, MemoryStorage, StorageError, TOKEN_KEY, TokenStore};
