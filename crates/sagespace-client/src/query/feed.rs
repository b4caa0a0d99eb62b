/*
[INPUT]:  Shared API client and query cache
[OUTPUT]: Cached read queries, cursor pagers and mutations that invalidate them
[POS]:    Query layer - feed/sage/notification query hooks
[UPDATE]: When adding queries or changing cache keys
*/

use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::auth::AuthState;
use crate::http::SageClient;
use crate::query::{Paginator, QueryCache};
use crate::types::{
    ApiResponse, Comment, CreatePostRequest, LikeState, Listing, Notification, Page, Post, Sage,
    Tag,
};

const FIRST_PAGE: &str = "first";

/// Query hooks over the API client.
#[derive(Debug, Clone)]
pub struct FeedQueries {
    api: Arc<SageClient>,
    cache: QueryCache,
}

impl FeedQueries {
    pub fn new(api: Arc<SageClient>) -> Self {
        Self::with_cache(api, QueryCache::new())
    }

    pub fn with_cache(api: Arc<SageClient>, cache: QueryCache) -> Self {
        Self { api, cache }
    }

    pub fn api(&self) -> &Arc<SageClient> {
        &self.api
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub async fn feed_page(&self, cursor: Option<&str>) -> ApiResponse<Page<Post>> {
        let key = format!("feed:{}", cursor.unwrap_or(FIRST_PAGE));
        self.cache
            .get_or_fetch(&key, || self.api.get_feed(cursor, None))
            .await
    }

    pub async fn post(&self, post_id: &str) -> ApiResponse<Post> {
        let key = format!("post:{post_id}");
        self.cache
            .get_or_fetch(&key, || self.api.get_post(post_id))
            .await
    }

    pub async fn sage(&self, sage_id: &str) -> ApiResponse<Sage> {
        let key = format!("sage:{sage_id}");
        self.cache
            .get_or_fetch(&key, || self.api.get_sage(sage_id))
            .await
    }

    pub async fn sages(&self, cursor: Option<&str>) -> ApiResponse<Page<Sage>> {
        let key = format!("sages:{}", cursor.unwrap_or(FIRST_PAGE));
        self.cache
            .get_or_fetch(&key, || self.api.get_sages(cursor, None))
            .await
    }

    pub async fn recommended_sages(&self) -> ApiResponse<Vec<Sage>> {
        self.cache
            .get_or_fetch("sages:recommended", || self.api.get_recommended_sages(None))
            .await
    }

    pub async fn tags(&self) -> ApiResponse<Vec<Tag>> {
        self.cache
            .get_or_fetch("tags", || self.api.get_tags())
            .await
    }

    pub async fn notifications(&self, unread_only: bool) -> ApiResponse<Page<Notification>> {
        let key = format!("notifications:{FIRST_PAGE}:{unread_only}");
        self.cache
            .get_or_fetch(&key, || self.api.get_notifications(None, unread_only))
            .await
    }

    pub fn feed_pager(&self, limit: Option<u32>) -> Paginator<Post> {
        let api = self.api.clone();
        Paginator::from_fn(move |cursor| {
            let api = api.clone();
            async move { api.get_feed(cursor.as_deref(), limit).await }.boxed()
        })
    }

    pub fn comments_pager(&self, post_id: &str) -> Paginator<Comment> {
        let api = self.api.clone();
        let post_id = post_id.to_string();
        Paginator::from_fn(move |cursor| {
            let api = api.clone();
            let post_id = post_id.clone();
            async move { api.get_comments(&post_id, cursor.as_deref()).await }.boxed()
        })
    }

    pub fn tag_pager(&self, slug: &str) -> Paginator<Post> {
        let api = self.api.clone();
        let slug = slug.to_string();
        Paginator::from_fn(move |cursor| {
            let api = api.clone();
            let slug = slug.clone();
            async move { api.get_posts_by_tag(&slug, cursor.as_deref()).await }.boxed()
        })
    }

    pub fn listings_pager(&self) -> Paginator<Listing> {
        let api = self.api.clone();
        Paginator::from_fn(move |cursor| {
            let api = api.clone();
            async move { api.get_listings(cursor.as_deref()).await }.boxed()
        })
    }

    pub fn notifications_pager(&self, unread_only: bool) -> Paginator<Notification> {
        let api = self.api.clone();
        Paginator::from_fn(move |cursor| {
            let api = api.clone();
            async move { api.get_notifications(cursor.as_deref(), unread_only).await }.boxed()
        })
    }

    pub async fn create_post(&self, post: &CreatePostRequest) -> ApiResponse<Post> {
        let response = self.api.create_post(post).await;
        if response.is_ok() {
            self.cache.invalidate_prefix("feed:").await;
        }
        response
    }

    pub async fn like_post(&self, post_id: &str) -> ApiResponse<LikeState> {
        let response = self.api.like_post(post_id).await;
        if response.is_ok() {
            self.invalidate_post(post_id).await;
        }
        response
    }

    pub async fn unlike_post(&self, post_id: &str) -> ApiResponse<LikeState> {
        let response = self.api.unlike_post(post_id).await;
        if response.is_ok() {
            self.invalidate_post(post_id).await;
        }
        response
    }

    pub async fn mark_notification_read(&self, notification_id: &str) -> ApiResponse<()> {
        let response = self.api.mark_notification_read(notification_id).await.map(|_| ());
        if response.is_ok() {
            self.cache.invalidate_prefix("notifications:").await;
        }
        response
    }

    /// Clear the cache whenever the signed-in account changes, so one
    /// account's notifications are never served to the next.
    pub fn clear_on_account_change(
        &self,
        mut auth: watch::Receiver<AuthState>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = self.cache.clone();
        let mut current = account_id(&auth.borrow_and_update());

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    changed = auth.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                let next = account_id(&auth.borrow_and_update());
                if next != current {
                    debug!(signed_in = next.is_some(), "account changed, clearing query cache");
                    cache.clear();
                    current = next;
                }
            }
        })
    }

    async fn invalidate_post(&self, post_id: &str) {
        self.cache.invalidate(&format!("post:{post_id}")).await;
        self.cache.invalidate_prefix("feed:").await;
    }
}

fn account_id(state: &AuthState) -> Option<String> {
    state.user.as_ref().map(|user| user.id.clone())
}
