/*
[INPUT]:  User/post identifiers and moderation reasons
[OUTPUT]: Platform statistics, user listings and moderation results
[POS]:    HTTP layer - admin endpoints (require an admin bearer token)
[UPDATE]: When adding new admin/moderation endpoints
*/

use crate::http::{RequestOptions, SageClient, segment};
use crate::types::{Ack, AdminStats, AdminUser, ApiResponse, BanUserRequest, Page};
use reqwest::Method;

impl SageClient {
    /// GET /admin/stats
    pub async fn get_admin_stats(&self) -> ApiResponse<AdminStats> {
        self.request(Method::GET, "/admin/stats", RequestOptions::new())
            .await
    }

    /// GET /admin/users?cursor={cursor}&search={search}
    pub async fn get_admin_users(
        &self,
        cursor: Option<&str>,
        search: Option<&str>,
    ) -> ApiResponse<Page<AdminUser>> {
        let options = RequestOptions::new()
            .query_opt("cursor", cursor)
            .query_opt("search", search);
        self.request(Method::GET, "/admin/users", options).await
    }

    /// POST /admin/users/{id}/ban
    pub async fn ban_user(&self, user_id: &str, reason: Option<&str>) -> ApiResponse<Ack> {
        let endpoint = format!("/admin/users/{}/ban", segment(user_id));
        let body = BanUserRequest {
            reason: reason.map(str::to_string),
        };
        self.request(Method::POST, &endpoint, RequestOptions::new().json(&body))
            .await
    }

    /// DELETE /admin/posts/{id}
    pub async fn admin_delete_post(&self, post_id: &str) -> ApiResponse<Ack> {
        let endpoint = format!("/admin/posts/{}", segment(post_id));
        self.request(Method::DELETE, &endpoint, RequestOptions::new())
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::http::{ClientConfig, SageClient};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_admin_stats_forbidden_for_regular_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/stats"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(serde_json::json!({ "message": "Admin access required" })),
            )
            .mount(&server)
            .await;

        let client = SageClient::with_config(ClientConfig::with_base_url(server.uri()))
            .expect("client init");

        let response = client.get_admin_stats().await;
        assert!(response.data.is_none());
        assert_eq!(response.error.as_deref(), Some("Admin access required"));
    }

    #[tokio::test]
    async fn test_admin_stats_decodes_revenue() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_users": 10,
                "total_posts": 42,
                "total_sages": 3,
                "revenue": "199.50"
            })))
            .mount(&server)
            .await;

        let client = SageClient::with_config(ClientConfig::with_base_url(server.uri()))
            .expect("client init");

        let stats = client.get_admin_stats().await.into_result().expect("stats");
        assert_eq!(stats.total_posts, 42);
        assert_eq!(stats.revenue, "199.50".parse().expect("decimal"));
        assert_eq!(stats.active_users_24h, 0);
    }
}
