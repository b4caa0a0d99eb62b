/*
[INPUT]:  Cursors, post bodies and comment bodies
[OUTPUT]: Feed pages, posts, likes and comments
[POS]:    HTTP layer - social feed endpoints
[UPDATE]: When adding new feed endpoints or changing pagination parameters
*/

use crate::http::{RequestOptions, SageClient, segment};
use crate::types::{
    Ack, ApiResponse, Comment, CreateCommentRequest, CreatePostRequest, LikeState, Page, Post,
};
use reqwest::Method;

impl SageClient {
    /// Home feed, newest first
    ///
    /// GET /feed?cursor={cursor}&limit={limit}
    pub async fn get_feed(&self, cursor: Option<&str>, limit: Option<u32>) -> ApiResponse<Page<Post>> {
        let options = RequestOptions::new()
            .query_opt("cursor", cursor)
            .query_opt("limit", limit);
        self.request(Method::GET, "/feed", options).await
    }

    /// GET /posts/{id}
    pub async fn get_post(&self, post_id: &str) -> ApiResponse<Post> {
        let endpoint = format!("/posts/{}", segment(post_id));
        self.request(Method::GET, &endpoint, RequestOptions::new())
            .await
    }

    /// POST /posts
    pub async fn create_post(&self, post: &CreatePostRequest) -> ApiResponse<Post> {
        self.request(Method::POST, "/posts", RequestOptions::new().json(post))
            .await
    }

    /// DELETE /posts/{id}
    pub async fn delete_post(&self, post_id: &str) -> ApiResponse<Ack> {
        let endpoint = format!("/posts/{}", segment(post_id));
        self.request(Method::DELETE, &endpoint, RequestOptions::new())
            .await
    }

    /// POST /posts/{id}/like
    pub async fn like_post(&self, post_id: &str) -> ApiResponse<LikeState> {
        let endpoint = format!("/posts/{}/like", segment(post_id));
        self.request(Method::POST, &endpoint, RequestOptions::new())
            .await
    }

    /// DELETE /posts/{id}/like
    pub async fn unlike_post(&self, post_id: &str) -> ApiResponse<LikeState> {
        let endpoint = format!("/posts/{}/like", segment(post_id));
        self.request(Method::DELETE, &endpoint, RequestOptions::new())
            .await
    }

    /// GET /posts/{id}/comments?cursor={cursor}
    pub async fn get_comments(
        &self,
        post_id: &str,
        cursor: Option<&str>,
    ) -> ApiResponse<Page<Comment>> {
        let endpoint = format!("/posts/{}/comments", segment(post_id));
        let options = RequestOptions::new().query_opt("cursor", cursor);
        self.request(Method::GET, &endpoint, options).await
    }

    /// POST /posts/{id}/comments
    pub async fn add_comment(&self, post_id: &str, content: &str) -> ApiResponse<Comment> {
        let endpoint = format!("/posts/{}/comments", segment(post_id));
        let body = CreateCommentRequest {
            content: content.to_string(),
        };
        self.request(Method::POST, &endpoint, RequestOptions::new().json(&body))
            .await
    }

    /// DELETE /comments/{id}
    pub async fn delete_comment(&self, comment_id: &str) -> ApiResponse<Ack> {
        let endpoint = format!("/comments/{}", segment(comment_id));
        self.request(Method::DELETE, &endpoint, RequestOptions::new())
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::http::{ClientConfig, SageClient};
    use crate::types::CreatePostRequest;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn post_json(id: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "author_id": "u1",
            "content": "Hello from the agora",
            "tags": ["stoicism"],
            "like_count": 3,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    #[tokio::test]
    async fn test_get_feed_with_cursor() {
        let server = MockServer::start().await;
        let mock_response = serde_json::json!({
            "data": [post_json("p1"), post_json("p2")],
            "nextCursor": "c2",
            "hasMore": true
        });

        Mock::given(method("GET"))
            .and(path("/feed"))
            .and(query_param("cursor", "c1"))
            .and(query_param("limit", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response))
            .expect(1)
            .mount(&server)
            .await;

        let client = SageClient::with_config(ClientConfig::with_base_url(server.uri()))
            .expect("client init");

        let page = client
            .get_feed(Some("c1"), Some(2))
            .await
            .into_result()
            .expect("get_feed failed");

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].id, "p1");
        assert_eq!(page.items[0].tags, vec!["stoicism".to_string()]);
        assert_eq!(page.next_cursor.as_deref(), Some("c2"));
        assert!(page.has_more);
    }

    #[tokio::test]
    async fn test_create_post_and_delete() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts"))
            .and(body_json(serde_json::json!({
                "content": "Hello from the agora",
                "visibility": "public"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(post_json("p9")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/posts/p9"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = SageClient::with_config(ClientConfig::with_base_url(server.uri()))
            .expect("client init");

        let request = CreatePostRequest {
            content: "Hello from the agora".to_string(),
            ..CreatePostRequest::default()
        };
        let created = client.create_post(&request).await.into_result().expect("create");
        assert_eq!(created.id, "p9");

        let deleted = client.delete_post("p9").await.into_result().expect("delete");
        assert!(deleted.success);
    }

    #[tokio::test]
    async fn test_like_post_returns_like_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts/p1/like"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": { "liked": true, "like_count": 4 }
            })))
            .mount(&server)
            .await;

        let client = SageClient::with_config(ClientConfig::with_base_url(server.uri()))
            .expect("client init");

        let state = client.like_post("p1").await.into_result().expect("like");
        assert!(state.liked);
        assert_eq!(state.like_count, 4);
    }
}
