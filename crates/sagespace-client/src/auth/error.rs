/*
[INPUT]:  Auth provider responses, storage failures, timeouts
[OUTPUT]: Auth error type whose Display is always a readable message
[POS]:    Auth layer - error taxonomy for sign-in/up/out flows
[UPDATE]: When adding auth failure sources
*/

use thiserror::Error;

use super::messages::AuthFailure;

/// Shown when sign-up succeeds but the account needs email confirmation
/// before a session is issued.
pub const SIGNUP_CONFIRMATION_MESSAGE: &str = "Account created successfully! Please check your email to confirm your account before signing in. If you don't see the email within a few minutes, check your spam folder.";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    /// The provider rejected the request; message enriched via the failure table.
    #[error("{0}")]
    Rejected(AuthFailure),

    /// Sign-up succeeded without a session (email confirmation pending).
    #[error("{}", SIGNUP_CONFIRMATION_MESSAGE)]
    ConfirmationRequired,

    /// No provider URL/key configured; the app runs in guest mode.
    #[error(
        "Authentication is not configured. Set VITE_SUPABASE_URL and VITE_SUPABASE_ANON_KEY to enable sign-in."
    )]
    NotConfigured,

    #[error("You are not signed in.")]
    NoSession,

    #[error("The authentication service did not respond within {0} ms. Please try again.")]
    Timeout(u64),

    #[error("Unable to reach the authentication service ({0}). Please check your connection.")]
    Network(String),

    #[error("Invalid response from the authentication service: {0}")]
    InvalidResponse(String),

    #[error("Could not persist the session: {0}")]
    Storage(String),
}

impl AuthError {
    /// Classify a raw provider error message.
    pub fn from_provider_message(message: &str) -> Self {
        AuthError::Rejected(AuthFailure::classify(message))
    }

    pub fn failure(&self) -> Option<&AuthFailure> {
        match self {
            AuthError::Rejected(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AuthError::InvalidResponse(err.to_string())
        } else {
            AuthError::Network(err.to_string())
        }
    }
}

/// Result type alias for auth operations
pub type Result<T> = std::result::Result<T, AuthError>;
