/*
[INPUT]:  Raw error strings returned by the auth provider
[OUTPUT]: Classified auth failures with user-facing guidance
[POS]:    Auth layer - error message enrichment table
[UPDATE]: When the provider changes its error wording or new guidance is needed
*/

use std::fmt;

/// Auth provider failure, classified from the provider's message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    InvalidCredentials,
    EmailNotConfirmed,
    AlreadyRegistered,
    WeakPassword,
    RateLimited,
    InvalidEmail,
    SignupsDisabled,
    SessionExpired,
    /// Unrecognized message, shown as the provider sent it.
    Other(String),
}

/// Ordered (substring, failure) rules; the first match wins. Patterns are
/// lowercase and matched against the lowercased provider message.
static RULES: &[(&str, AuthFailure)] = &[
    ("invalid login credentials", AuthFailure::InvalidCredentials),
    ("email not confirmed", AuthFailure::EmailNotConfirmed),
    ("already registered", AuthFailure::AlreadyRegistered),
    ("user already exists", AuthFailure::AlreadyRegistered),
    ("password should be", AuthFailure::WeakPassword),
    ("weak password", AuthFailure::WeakPassword),
    ("rate limit", AuthFailure::RateLimited),
    ("too many requests", AuthFailure::RateLimited),
    ("unable to validate email", AuthFailure::InvalidEmail),
    ("invalid email", AuthFailure::InvalidEmail),
    ("signups not allowed", AuthFailure::SignupsDisabled),
    ("refresh token not found", AuthFailure::SessionExpired),
    ("jwt expired", AuthFailure::SessionExpired),
];

impl AuthFailure {
    pub fn classify(message: &str) -> Self {
        let lowered = message.to_lowercase();
        RULES
            .iter()
            .find(|(pattern, _)| lowered.contains(pattern))
            .map(|(_, failure)| failure.clone())
            .unwrap_or_else(|| AuthFailure::Other(message.to_string()))
    }

    pub fn user_message(&self) -> &str {
        match self {
            AuthFailure::InvalidCredentials => {
                "Invalid email or password. Please check your credentials and try again. If you signed up recently, make sure you have confirmed your email address first."
            }
            AuthFailure::EmailNotConfirmed => {
                "Your email address has not been confirmed yet. Please click the confirmation link we sent to your inbox, then sign in again."
            }
            AuthFailure::AlreadyRegistered => {
                "An account with this email already exists. Please sign in instead, or reset your password if you have forgotten it."
            }
            AuthFailure::WeakPassword => {
                "Your password is too weak. Please use at least 6 characters."
            }
            AuthFailure::RateLimited => {
                "Too many attempts. Please wait a few minutes before trying again."
            }
            AuthFailure::InvalidEmail => "Please enter a valid email address.",
            AuthFailure::SignupsDisabled => {
                "New sign-ups are currently disabled. Please try again later."
            }
            AuthFailure::SessionExpired => "Your session has expired. Please sign in again.",
            AuthFailure::Other(message) => message,
        }
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.user_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Invalid login credentials", AuthFailure::InvalidCredentials)]
    #[case("Email not confirmed", AuthFailure::EmailNotConfirmed)]
    #[case("User already registered", AuthFailure::AlreadyRegistered)]
    #[case("Password should be at least 6 characters.", AuthFailure::WeakPassword)]
    #[case("Email rate limit exceeded", AuthFailure::RateLimited)]
    #[case("For security purposes, too many requests", AuthFailure::RateLimited)]
    #[case("Unable to validate email address: invalid format", AuthFailure::InvalidEmail)]
    #[case("Signups not allowed for this instance", AuthFailure::SignupsDisabled)]
    fn test_classify_known_messages(#[case] raw: &str, #[case] expected: AuthFailure) {
        assert_eq!(AuthFailure::classify(raw), expected);
    }

    #[test]
    fn test_first_match_wins() {
        // Matches both the credentials rule and the rate-limit rule.
        let failure = AuthFailure::classify("Invalid login credentials (rate limit applies)");
        assert_eq!(failure, AuthFailure::InvalidCredentials);
    }

    #[test]
    fn test_unknown_message_passes_through() {
        let failure = AuthFailure::classify("Database is on fire");
        assert_eq!(failure.to_string(), "Database is on fire");
    }

    #[test]
    fn test_enriched_message_is_longer_than_raw() {
        let raw = "Invalid login credentials";
        assert!(AuthFailure::classify(raw).to_string().len() > raw.len());
    }
}
