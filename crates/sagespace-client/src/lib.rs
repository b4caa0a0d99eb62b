/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public SageSpace client crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod http;
pub mod query;
pub mod retry;
pub mod types;

// Re-export commonly used types from auth
pub use auth::{
    AuthChange,
    AuthError,
    AuthProvider,
    AuthSession,
    AuthState,
    DisabledAuthProvider,
    FileStorage,
    GoTrueConfig,
    GoTrueProvider,
    MemoryStorage,
    MockAuthProvider,
    SessionConfig,
    TokenBridge,
    TokenStore,
};

// Re-export commonly used types from http
pub use http::{
    ApiError,
    ClientConfig,
    DEMO_MODE_MESSAGE,
    RequestOptions,
    Result,
    SageClient,
    StaticToken,
    TokenSource,
};

pub use query::{FeedQueries, Paginator, QueryCache};
pub use retry::{RetryOptions, Retryable, retry, retry_with};

// Re-export all types
pub use types::*;
