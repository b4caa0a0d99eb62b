/*
[INPUT]:  HTTP configuration (base URL, timeouts, retry policy) and a bearer token source
[OUTPUT]: Configured API client whose request core normalizes every outcome into ApiResponse
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing response normalization
*/

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, PercentEncode, utf8_percent_encode};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{Instrument, debug, debug_span, warn};
use uuid::Uuid;

use crate::http::{ApiError, Result};
use crate::retry::{RetryOptions, retry};
use crate::types::ApiResponse;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Everything but the unreserved characters is escaped inside a path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL. `None` (or blank) puts the client in demo mode.
    pub base_url: Option<String>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Retry transient failures inside the request core.
    pub retry: Option<RetryOptions>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            retry: None,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Self::default()
        }
    }
}

/// Supplies the bearer token attached to outgoing requests.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Current access token, or `None` to send the request unauthenticated.
    async fn bearer_token(&self) -> Option<String>;
}

/// Fixed token, for scripts and tests.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Query parameters and JSON body of one API call.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    query: Vec<(String, String)>,
    body: Option<std::result::Result<Value, String>>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a query parameter only when `value` is present.
    pub fn query_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        self.body = Some(serde_json::to_value(body).map_err(|e| e.to_string()));
        self
    }
}

/// Main HTTP client for the SageSpace API
#[derive(Clone)]
pub struct SageClient {
    http_client: Client,
    base_url: Option<Url>,
    token_source: Option<Arc<dyn TokenSource>>,
    retry: Option<RetryOptions>,
}

impl std::fmt::Debug for SageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SageClient")
            .field("base_url", &self.base_url)
            .field("has_token_source", &self.token_source.is_some())
            .field("retry", &self.retry)
            .finish()
    }
}

impl SageClient {
    /// Create a client in demo mode (no base URL).
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ApiError::Config(format!("failed to build HTTP client: {e}")))?;

        let base_url = match config.base_url.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                Url::parse(raw)
                    .map_err(|e| ApiError::Config(format!("invalid API base URL {raw:?}: {e}")))?,
            ),
        };

        if base_url.is_none() {
            warn!("API base URL not configured, running in demo mode");
        }

        Ok(Self {
            http_client,
            base_url,
            token_source: None,
            retry: config.retry,
        })
    }

    /// Attach the source of bearer tokens (usually the auth token bridge).
    pub fn with_token_source(mut self, source: Arc<dyn TokenSource>) -> Self {
        self.token_source = Some(source);
        self
    }

    pub fn set_token_source(&mut self, source: Arc<dyn TokenSource>) {
        self.token_source = Some(source);
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    pub fn is_demo_mode(&self) -> bool {
        self.base_url.is_none()
    }

    /// Request core used by every endpoint method. Never fails: errors land
    /// in `ApiResponse::error`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> ApiResponse<T> {
        self.try_request(method, endpoint, options).await.into()
    }

    /// Same as [`SageClient::request`] but keeps the structured error.
    pub async fn try_request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let Some(base_url) = self.base_url.as_ref() else {
            debug!(endpoint, "demo mode, skipping request");
            return Err(ApiError::DemoMode);
        };
        let url = endpoint_url(base_url, endpoint)?;

        match self.retry {
            Some(retry_options) => {
                retry(
                    || self.send_once(method.clone(), &url, &options),
                    retry_options,
                )
                .await
            }
            None => self.send_once(method, &url, &options).await,
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &Url,
        options: &RequestOptions,
    ) -> Result<T> {
        let request_id = Uuid::new_v4();
        let span = debug_span!("api_request", %request_id, %method, path = url.path());

        async move {
            let mut builder = self
                .http_client
                .request(method, url.clone())
                .header(ACCEPT, "application/json")
                .header(REQUEST_ID_HEADER, request_id.to_string());

            if let Some(token) = self.bearer_token().await {
                builder = builder.bearer_auth(token);
            }
            if !options.query.is_empty() {
                builder = builder.query(&options.query);
            }
            match &options.body {
                Some(Ok(body)) => builder = builder.json(body),
                Some(Err(err)) => {
                    return Err(ApiError::Unexpected(format!(
                        "failed to encode request body: {err}"
                    )));
                }
                None => {}
            }

            let response = builder.send().await.map_err(ApiError::from_transport)?;
            let status = response.status();
            let result = decode_response(response).await;
            match &result {
                Ok(_) => debug!(status = status.as_u16(), "API request succeeded"),
                Err(err) => warn!(status = status.as_u16(), error = %err, "API request failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn bearer_token(&self) -> Option<String> {
        match &self.token_source {
            Some(source) => source.bearer_token().await,
            None => None,
        }
    }
}

/// Escape an identifier for use as a single path segment.
pub(crate) fn segment(raw: &str) -> PercentEncode<'_> {
    utf8_percent_encode(raw, PATH_SEGMENT)
}

/// Append `endpoint` to the base URL, keeping any path prefix (e.g. `/api`).
fn endpoint_url(base_url: &Url, endpoint: &str) -> Result<Url> {
    let base = base_url.as_str().trim_end_matches('/');
    let endpoint = endpoint.trim_start_matches('/');
    Ok(Url::parse(&format!("{base}/{endpoint}"))?)
}

async fn decode_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let declared_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.contains("json"))
        .unwrap_or(false);
    let body = response.text().await.map_err(ApiError::from_transport)?;
    let looks_like_html = body.trim_start().starts_with('<');
    let parsed = serde_json::from_str::<Value>(&body);

    if !status.is_success() {
        let not_json =
            !body.trim().is_empty() && (looks_like_html || (parsed.is_err() && !declared_json));
        // 404 keeps its own message whatever the body looks like.
        if not_json && status != StatusCode::NOT_FOUND {
            return Err(ApiError::NotJson { status: status.as_u16() });
        }
        let server_message = parsed
            .ok()
            .filter(|_| !looks_like_html)
            .and_then(|value| server_error_message(&value));
        return Err(ApiError::from_status(status, server_message));
    }

    if body.trim().is_empty() {
        return Ok(serde_json::from_value(Value::Null)?);
    }

    let value = match parsed {
        Ok(value) if !looks_like_html => value,
        Ok(_) => return Err(ApiError::NotJson { status: status.as_u16() }),
        Err(_) if !declared_json => return Err(ApiError::NotJson { status: status.as_u16() }),
        Err(err) => return Err(err.into()),
    };

    unwrap_envelope(status, value)
}

/// Decode `T` from `body.data` when present, else from the whole body.
fn unwrap_envelope<T: DeserializeOwned>(status: StatusCode, value: Value) -> Result<T> {
    let data = match value.get("data") {
        Some(data) if !data.is_null() => Some(data.clone()),
        _ => None,
    };

    if data.is_none() {
        if let Some(message) = value.get("error").and_then(Value::as_str) {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: message.to_string(),
            });
        }
    }

    match data {
        Some(data) => match serde_json::from_value::<T>(data) {
            Ok(decoded) => Ok(decoded),
            // Paginated bodies keep their items under `data` next to the cursor.
            Err(data_err) => serde_json::from_value(value).map_err(|_| data_err.into()),
        },
        None => Ok(serde_json::from_value(value)?),
    }
}

fn server_error_message(value: &Value) -> Option<String> {
    ["error", "message"]
        .iter()
        .filter_map(|key| value.get(*key))
        .find_map(|field| match field {
            Value::String(message) if !message.is_empty() => Some(message.clone()),
            Value::Object(inner) => inner
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
}
