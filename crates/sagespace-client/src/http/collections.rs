/*
[INPUT]:  Collection definitions, post identifiers and tag slugs
[OUTPUT]: Collections, tags and tag-filtered post pages
[POS]:    HTTP layer - collection and tag endpoints
[UPDATE]: When adding new collection/tag endpoints
*/

use crate::http::{RequestOptions, SageClient, segment};
use crate::types::{
    Ack, ApiResponse, Collection, CollectionItemRequest, CreateCollectionRequest, Page, Post, Tag,
};
use reqwest::Method;

impl SageClient {
    /// Collections owned by the signed-in user
    ///
    /// GET /collections
    pub async fn get_collections(&self) -> ApiResponse<Vec<Collection>> {
        self.request(Method::GET, "/collections", RequestOptions::new())
            .await
    }

    /// POST /collections
    pub async fn create_collection(
        &self,
        collection: &CreateCollectionRequest,
    ) -> ApiResponse<Collection> {
        self.request(
            Method::POST,
            "/collections",
            RequestOptions::new().json(collection),
        )
        .await
    }

    /// POST /collections/{id}/items
    pub async fn add_to_collection(&self, collection_id: &str, post_id: &str) -> ApiResponse<Ack> {
        let endpoint = format!("/collections/{}/items", segment(collection_id));
        let body = CollectionItemRequest {
            post_id: post_id.to_string(),
        };
        self.request(Method::POST, &endpoint, RequestOptions::new().json(&body))
            .await
    }

    /// DELETE /collections/{id}/items/{post_id}
    pub async fn remove_from_collection(
        &self,
        collection_id: &str,
        post_id: &str,
    ) -> ApiResponse<Ack> {
        let endpoint = format!(
            "/collections/{}/items/{}",
            segment(collection_id),
            segment(post_id)
        );
        self.request(Method::DELETE, &endpoint, RequestOptions::new())
            .await
    }

    /// GET /tags
    pub async fn get_tags(&self) -> ApiResponse<Vec<Tag>> {
        self.request(Method::GET, "/tags", RequestOptions::new())
            .await
    }

    /// GET /tags/{slug}/posts?cursor={cursor}
    pub async fn get_posts_by_tag(
        &self,
        slug: &str,
        cursor: Option<&str>,
    ) -> ApiResponse<Page<Post>> {
        let endpoint = format!("/tags/{}/posts", segment(slug));
        let options = RequestOptions::new().query_opt("cursor", cursor);
        self.request(Method::GET, &endpoint, options).await
    }
}
