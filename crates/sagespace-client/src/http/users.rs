/*
[INPUT]:  Profile updates and user identifiers
[OUTPUT]: User profiles
[POS]:    HTTP layer - user profile endpoints (require bearer auth)
[UPDATE]: When adding new user endpoints or changing profile fields
*/

use crate::http::{RequestOptions, SageClient, segment};
use crate::types::{ApiResponse, UpdateProfileRequest, User};
use reqwest::Method;

impl SageClient {
    /// Profile of the signed-in user
    ///
    /// GET /users/me
    pub async fn get_current_user(&self) -> ApiResponse<User> {
        self.request(Method::GET, "/users/me", RequestOptions::new())
            .await
    }

    /// Try variant used by the auth session, which needs the structured error.
    pub(crate) async fn fetch_current_user(&self) -> crate::http::Result<User> {
        self.try_request(Method::GET, "/users/me", RequestOptions::new())
            .await
    }

    /// Update the signed-in user's profile
    ///
    /// PATCH /users/me
    pub async fn update_profile(&self, update: &UpdateProfileRequest) -> ApiResponse<User> {
        self.request(Method::PATCH, "/users/me", RequestOptions::new().json(update))
            .await
    }

    /// Public profile of any user
    ///
    /// GET /users/{id}
    pub async fn get_user(&self, user_id: &str) -> ApiResponse<User> {
        let endpoint = format!("/users/{}", segment(user_id));
        self.request(Method::GET, &endpoint, RequestOptions::new())
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::http::{ClientConfig, SageClient, StaticToken};
    use crate::types::UpdateProfileRequest;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> SageClient {
        SageClient::with_config(ClientConfig::with_base_url(server.uri()))
            .expect("client init")
            .with_token_source(Arc::new(StaticToken("jwt-token".to_string())))
    }

    #[tokio::test]
    async fn test_get_current_user_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/me"))
            .and(header("authorization", "Bearer jwt-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "id": "u1",
                    "name": "Ada Lovelace",
                    "email": "ada@example.com",
                    "avatar_url": null,
                    "created_at": "2024-01-01T00:00:00Z"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server).get_current_user().await;

        assert!(response.error.is_none(), "unexpected error: {:?}", response.error);
        let user = response.data.expect("user");
        assert_eq!(user.id, "u1");
        assert_eq!(user.name, "Ada Lovelace");
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn test_update_profile_sends_only_set_fields() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/users/me"))
            .and(body_json(serde_json::json!({ "bio": "Curious" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "u1",
                "name": "Ada",
                "bio": "Curious"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let update = UpdateProfileRequest {
            bio: Some("Curious".to_string()),
            ..UpdateProfileRequest::default()
        };
        let response = client_for(&server).update_profile(&update).await;

        assert_eq!(response.data.and_then(|u| u.bio).as_deref(), Some("Curious"));
    }

    #[tokio::test]
    async fn test_get_user_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/u2"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({ "error": "Invalid or expired token" })),
            )
            .mount(&server)
            .await;

        let response = client_for(&server).get_user("u2").await;

        assert!(response.data.is_none());
        assert_eq!(response.error.as_deref(), Some("Invalid or expired token"));
    }
}
