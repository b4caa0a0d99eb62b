/*
[INPUT]:  Listing identifiers and cursors
[OUTPUT]: Marketplace listings and purchases
[POS]:    HTTP layer - marketplace endpoints
[UPDATE]: When adding new marketplace endpoints or payment flows
*/

use crate::http::{RequestOptions, SageClient, segment};
use crate::types::{ApiResponse, Listing, Page, Purchase};
use reqwest::Method;

impl SageClient {
    /// GET /marketplace/listings?cursor={cursor}
    pub async fn get_listings(&self, cursor: Option<&str>) -> ApiResponse<Page<Listing>> {
        let options = RequestOptions::new().query_opt("cursor", cursor);
        self.request(Method::GET, "/marketplace/listings", options)
            .await
    }

    /// GET /marketplace/listings/{id}
    pub async fn get_listing(&self, listing_id: &str) -> ApiResponse<Listing> {
        let endpoint = format!("/marketplace/listings/{}", segment(listing_id));
        self.request(Method::GET, &endpoint, RequestOptions::new())
            .await
    }

    /// POST /marketplace/listings/{id}/purchase
    pub async fn purchase_listing(&self, listing_id: &str) -> ApiResponse<Purchase> {
        let endpoint = format!("/marketplace/listings/{}/purchase", segment(listing_id));
        self.request(Method::POST, &endpoint, RequestOptions::new())
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::http::{ClientConfig, SageClient};
    use crate::types::PurchaseStatus;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_purchase_listing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/marketplace/listings/l1/purchase"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "id": "pur-1", "listing_id": "l1", "status": "pending" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = SageClient::with_config(ClientConfig::with_base_url(server.uri()))
            .expect("client init");

        let purchase = client
            .purchase_listing("l1")
            .await
            .into_result()
            .expect("purchase");
        assert_eq!(purchase.status, PurchaseStatus::Pending);
    }

    #[tokio::test]
    async fn test_get_listing_html_fallback_is_misconfiguration() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/marketplace/listings/l1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<!doctype html><html><body>app</body></html>", "text/html"),
            )
            .mount(&server)
            .await;

        let client = SageClient::with_config(ClientConfig::with_base_url(server.uri()))
            .expect("client init");

        let response = client.get_listing("l1").await;
        assert!(response.data.is_none());
        let message = response.error.expect("error");
        assert!(message.contains("non-JSON"), "{message}");
    }
}
