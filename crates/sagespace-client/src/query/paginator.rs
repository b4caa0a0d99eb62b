/*
[INPUT]:  Page fetcher closure (cursor -> ApiResponse<Page<T>>)
[OUTPUT]: Accumulated items, pagination flags and the last error
[POS]:    Query layer - infinite-scroll accumulator over cursor pages
[UPDATE]: When pagination rules or exposed state change
*/

use std::sync::Arc;

use futures_util::future::BoxFuture;
use tracing::debug;

use crate::types::{ApiResponse, Page};

/// Fetches the page after `cursor` (`None` for the first page).
pub type PageFetcher<T> =
    Arc<dyn Fn(Option<String>) -> BoxFuture<'static, ApiResponse<Page<T>>> + Send + Sync>;

/// Cursor pagination accumulator.
pub struct Paginator<T> {
    fetcher: PageFetcher<T>,
    items: Vec<T>,
    next_cursor: Option<String>,
    has_more: bool,
    error: Option<String>,
    loading: bool,
    pages_loaded: usize,
}

impl<T> std::fmt::Debug for Paginator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paginator")
            .field("items", &self.items.len())
            .field("next_cursor", &self.next_cursor)
            .field("has_more", &self.has_more)
            .field("error", &self.error)
            .field("loading", &self.loading)
            .field("pages_loaded", &self.pages_loaded)
            .finish()
    }
}

impl<T: Send + 'static> Paginator<T> {
    pub fn new(fetcher: PageFetcher<T>) -> Self {
        Self {
            fetcher,
            items: Vec::new(),
            next_cursor: None,
            has_more: true,
            error: None,
            loading: false,
            pages_loaded: 0,
        }
    }

    /// Build from a plain closure.
    pub fn from_fn<F>(fetch: F) -> Self
    where
        F: Fn(Option<String>) -> BoxFuture<'static, ApiResponse<Page<T>>> + Send + Sync + 'static,
    {
        Self::new(Arc::new(fetch))
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// `true` while a fetch is outstanding. `load_more` borrows the pager
    /// mutably, so from the outside this only shows a fetch whose future was
    /// dropped before it finished; the next `load_more` repeats that cursor.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn pages_loaded(&self) -> usize {
        self.pages_loaded
    }

    /// Fetch the next page. No-op (returns `false`) when the list is
    /// exhausted or the previous load failed; see [`Paginator::retry`].
    pub async fn load_more(&mut self) -> bool {
        if !self.has_more || self.error.is_some() {
            return false;
        }

        self.loading = true;
        let response = (self.fetcher)(self.next_cursor.clone()).await;
        self.loading = false;

        match response.into_result() {
            Ok(page) => {
                self.pages_loaded += 1;
                self.items.extend(page.items);
                // Without a cursor there is no way to ask for the next page.
                self.has_more = page.has_more && page.next_cursor.is_some();
                self.next_cursor = page.next_cursor;
                debug!(
                    pages = self.pages_loaded,
                    items = self.items.len(),
                    has_more = self.has_more,
                    "page loaded"
                );
            }
            Err(message) => {
                debug!(error = %message, "page load failed");
                self.error = Some(message);
            }
        }
        true
    }

    /// Clear a pending error and load again from the failed cursor.
    pub async fn retry(&mut self) -> bool {
        self.error = None;
        self.load_more().await
    }

    /// Drop everything and load the first page again.
    pub async fn refresh(&mut self) -> bool {
        self.items.clear();
        self.next_cursor = None;
        self.has_more = true;
        self.error = None;
        self.pages_loaded = 0;
        self.load_more().await
    }
}
