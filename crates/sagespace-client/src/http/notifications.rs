/*
[INPUT]:  Notification identifiers and cursors
[OUTPUT]: Notification pages and read acknowledgements
[POS]:    HTTP layer - notification endpoints (require bearer auth)
[UPDATE]: When adding new notification endpoints
*/

use crate::http::{RequestOptions, SageClient, segment};
use crate::types::{Ack, ApiResponse, Notification, Page};
use reqwest::Method;

impl SageClient {
    /// GET /notifications?cursor={cursor}&unread_only={bool}
    pub async fn get_notifications(
        &self,
        cursor: Option<&str>,
        unread_only: bool,
    ) -> ApiResponse<Page<Notification>> {
        let mut options = RequestOptions::new().query_opt("cursor", cursor);
        if unread_only {
            options = options.query("unread_only", true);
        }
        self.request(Method::GET, "/notifications", options).await
    }

    /// POST /notifications/{id}/read
    pub async fn mark_notification_read(&self, notification_id: &str) -> ApiResponse<Ack> {
        let endpoint = format!("/notifications/{}/read", segment(notification_id));
        self.request(Method::POST, &endpoint, RequestOptions::new())
            .await
    }

    /// POST /notifications/read-all
    pub async fn mark_all_notifications_read(&self) -> ApiResponse<Ack> {
        self.request(
            Method::POST,
            "/notifications/read-all",
            RequestOptions::new(),
        )
        .await
    }
}
