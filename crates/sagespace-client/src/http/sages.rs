/*
[INPUT]:  Sage identifiers, sage definitions and chat messages
[OUTPUT]: Sage listings, recommendations and chat replies
[POS]:    HTTP layer - AI companion ("Sage") endpoints
[UPDATE]: When adding new sage endpoints or changing the chat payload
*/

use crate::http::{RequestOptions, SageClient, segment};
use crate::types::{ApiResponse, ChatReply, ChatRequest, CreateSageRequest, Page, Sage};
use reqwest::Method;

impl SageClient {
    /// Browse public sages
    ///
    /// GET /sages?cursor={cursor}&category={category}
    pub async fn get_sages(
        &self,
        cursor: Option<&str>,
        category: Option<&str>,
    ) -> ApiResponse<Page<Sage>> {
        let options = RequestOptions::new()
            .query_opt("cursor", cursor)
            .query_opt("category", category);
        self.request(Method::GET, "/sages", options).await
    }

    /// GET /sages/{id}
    pub async fn get_sage(&self, sage_id: &str) -> ApiResponse<Sage> {
        let endpoint = format!("/sages/{}", segment(sage_id));
        self.request(Method::GET, &endpoint, RequestOptions::new())
            .await
    }

    /// Recommendations are computed server-side.
    ///
    /// GET /sages/recommended?limit={limit}
    pub async fn get_recommended_sages(&self, limit: Option<u32>) -> ApiResponse<Vec<Sage>> {
        let options = RequestOptions::new().query_opt("limit", limit);
        self.request(Method::GET, "/sages/recommended", options)
            .await
    }

    /// POST /sages
    pub async fn create_sage(&self, sage: &CreateSageRequest) -> ApiResponse<Sage> {
        self.request(Method::POST, "/sages", RequestOptions::new().json(sage))
            .await
    }

    /// Send a message to a sage. Omitting `conversation_id` starts a new conversation.
    ///
    /// POST /sages/{id}/chat
    pub async fn chat_with_sage(
        &self,
        sage_id: &str,
        message: &str,
        conversation_id: Option<&str>,
    ) -> ApiResponse<ChatReply> {
        let endpoint = format!("/sages/{}/chat", segment(sage_id));
        let body = ChatRequest {
            message: message.to_string(),
            conversation_id: conversation_id.map(str::to_string),
        };
        self.request(Method::POST, &endpoint, RequestOptions::new().json(&body))
            .await
    }
}
