/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{
    ChatRole, NotificationKind, PurchaseStatus, UserRole, Visibility,
};

/// Profile of a SageSpace user.
///
/// Built from the backend profile endpoint when it answers in time, or from
/// the auth provider's session claims otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(alias = "display_name", alias = "full_name")]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "avatar")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    #[serde(default)]
    pub author: Option<User>,
    pub content: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default)]
    pub liked_by_me: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    #[serde(default)]
    pub author: Option<User>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// An AI companion users can chat with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sage {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub creator_id: Option<String>,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default)]
    pub conversation_count: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub conversation_id: String,
    pub message: ChatMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub item_count: u64,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub post_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: NotificationKind,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A marketplace offer, usually a premium sage or content pack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub seller_id: String,
    #[serde(default)]
    pub sage_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: String,
    pub listing_id: String,
    pub status: PurchaseStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_users: u64,
    pub total_posts: u64,
    pub total_sages: u64,
    #[serde(default)]
    pub active_users_24h: u64,
    #[serde(default)]
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub name: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub banned: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Like state of a post after a like/unlike call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeState {
    pub liked: bool,
    #[serde(default)]
    pub like_count: u64,
}

fn default_true() -> bool {
    true
}

fn default_currency() -> String {
    "USD".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_accepts_display_name_alias() {
        let user: User = serde_json::from_value(serde_json::json!({
            "id": "u1",
            "display_name": "Ada",
            "avatar": "https://cdn.example/ada.png"
        }))
        .unwrap();

        assert_eq!(user.name, "Ada");
        assert_eq!(user.avatar_url.as_deref(), Some("https://cdn.example/ada.png"));
        assert_eq!(user.role, UserRole::User);
        assert!(user.email.is_none());
    }

    #[test]
    fn test_listing_price_from_number_and_string() {
        let from_number: Listing = serde_json::from_value(serde_json::json!({
            "id": "l1", "title": "Stoic Sage", "price": 4.99, "seller_id": "u1"
        }))
        .unwrap();
        let from_string: Listing = serde_json::from_value(serde_json::json!({
            "id": "l1", "title": "Stoic Sage", "price": "4.99", "seller_id": "u1"
        }))
        .unwrap();

        assert_eq!(from_number.price, from_string.price);
        assert_eq!(from_number.currency, "USD");
    }

    #[test]
    fn test_unknown_notification_kind_maps_to_other() {
        let notification: Notification = serde_json::from_value(serde_json::json!({
            "id": "n1",
            "type": "sage_reply",
            "message": "Marcus replied",
            "created_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(notification.kind, NotificationKind::Other);
        assert!(!notification.read);
    }
}
