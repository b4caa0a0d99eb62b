/*
[INPUT]:  Error sources (transport, HTTP status, response body, configuration)
[OUTPUT]: Structured API error type with user-facing messages and retry hints
[POS]:    Error handling layer - normalizes every API failure into one taxonomy
[UPDATE]: When adding new error sources or improving error messages
*/

use reqwest::StatusCode;
use thiserror::Error;

use crate::retry::{Retryable, is_retryable_status};

/// Message returned by every endpoint when no API base URL is configured.
pub const DEMO_MODE_MESSAGE: &str =
    "Demo mode - API not configured. Please set VITE_API_URL environment variable.";

pub const NOT_FOUND_MESSAGE: &str = "Resource not found";

/// Failure of a single API call.
///
/// `Display` renders the message shown to the user; the endpoint methods of
/// `SageClient` put exactly that string into `ApiResponse::error`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// No base URL configured; the client runs in demo mode.
    #[error("{}", DEMO_MODE_MESSAGE)]
    DemoMode,

    /// The request never reached the server (DNS, refused connection, TLS).
    #[error(
        "Network error: unable to reach the API ({0}). Please check your internet connection and that VITE_API_URL is correct."
    )]
    Network(String),

    /// The request did not complete within the configured timeout.
    #[error("Request timed out. The API may be slow or unreachable, please try again.")]
    Timeout,

    /// 404, with the server's message when it sent one.
    #[error("{message}")]
    NotFound { message: String },

    /// The server answered with HTML (or another non-JSON body) where JSON was expected.
    #[error(
        "Unexpected non-JSON response from the API (HTTP {status}). The endpoint likely doesn't exist or VITE_API_URL points at the wrong server."
    )]
    NotJson { status: u16 },

    /// Any other non-2xx status.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// The body was JSON-typed but could not be decoded.
    #[error("Invalid response from the API: {0}")]
    Parse(String),

    /// Endpoint could not be joined onto the base URL.
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    /// Client could not be constructed from its configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl ApiError {
    /// Classify a reqwest failure that happened before a response was read.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_connect() || err.is_request() {
            ApiError::Network(err.to_string())
        } else if err.is_decode() || err.is_body() {
            ApiError::Parse(err.to_string())
        } else {
            ApiError::Unexpected(err.to_string())
        }
    }

    /// Build the error for a non-2xx response.
    ///
    /// `server_message` is the `error` (or `message`) field of a JSON body.
    pub fn from_status(status: StatusCode, server_message: Option<String>) -> Self {
        if status == StatusCode::NOT_FOUND {
            return ApiError::NotFound {
                message: server_message.unwrap_or_else(|| NOT_FOUND_MESSAGE.to_string()),
            };
        }

        let message = server_message.unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
        });
        ApiError::Status {
            status: status.as_u16(),
            message,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::NotFound { .. } => Some(404),
            ApiError::NotJson { status } | ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if error indicates an authentication/authorization failure
    pub fn is_auth_error(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }
}

impl Retryable for ApiError {
    fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout => true,
            ApiError::NotJson { status } | ApiError::Status { status, .. } => {
                is_retryable_status(*status)
            }
            _ => false,
        }
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        ApiError::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Parse(err.to_string())
    }
}

/// Result type alias for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
