/*
[INPUT]:  Query keys and fetch closures producing ApiResponse<T>
[OUTPUT]: Responses served from a TTL cache while fresh
[POS]:    Query layer - staleness window for read queries
[UPDATE]: When staleness window or invalidation rules change
*/

use std::future::Future;
use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::types::ApiResponse;

/// Responses younger than this are served without a request.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(30);

const DEFAULT_MAX_ENTRIES: u64 = 1_000;

/// Cache of successful query results keyed by query key.
#[derive(Clone)]
pub struct QueryCache {
    entries: Cache<String, Value>,
    stale_time: Duration,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("stale_time", &self.stale_time)
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        Self::with_stale_time(DEFAULT_STALE_TIME)
    }

    pub fn with_stale_time(stale_time: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(DEFAULT_MAX_ENTRIES)
            .time_to_live(stale_time)
            .build();
        Self {
            entries,
            stale_time,
        }
    }

    pub fn stale_time(&self) -> Duration {
        self.stale_time
    }

    /// Serve `key` from the cache, or run `fetch` and cache a successful result.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: &str, fetch: F) -> ApiResponse<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResponse<T>>,
    {
        if let Some(cached) = self.entries.get(key).await {
            match serde_json::from_value::<T>(cached) {
                Ok(data) => {
                    debug!(key, "query cache hit");
                    return ApiResponse::ok(data);
                }
                Err(err) => {
                    warn!(key, error = %err, "cached entry has unexpected shape, refetching");
                    self.entries.invalidate(key).await;
                }
            }
        }

        let response = fetch().await;
        if response.error.is_none() {
            if let Some(data) = &response.data {
                match serde_json::to_value(data) {
                    Ok(value) => self.entries.insert(key.to_string(), value).await,
                    Err(err) => warn!(key, error = %err, "response not cacheable"),
                }
            }
        }
        response
    }

    pub async fn invalidate(&self, key: &str) {
        self.entries.invalidate(key).await;
    }

    /// Drop every key starting with `prefix`.
    pub async fn invalidate_prefix(&self, prefix: &str) {
        let keys: Vec<_> = self
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key)
            .collect();
        for key in keys {
            self.entries.invalidate(key.as_str()).await;
        }
        debug!(prefix, "query cache prefix invalidated");
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}
