/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Response envelope, cursor pages and acknowledgement types
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use serde::{Deserialize, Serialize};

/// Result envelope returned by every `SageClient` endpoint method.
///
/// Exactly one of `data` and `error` is set. Callers check `error` first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            data: self.data.map(f),
            error: self.error,
        }
    }

    /// Collapse the envelope into a `Result`, keeping the error message.
    pub fn into_result(self) -> Result<T, String> {
        match (self.error, self.data) {
            (Some(error), _) => Err(error),
            (None, Some(data)) => Ok(data),
            (None, None) => Err("Response contained no data".to_string()),
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for ApiResponse<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => ApiResponse::ok(data),
            Err(err) => ApiResponse::err(err.to_string()),
        }
    }
}

/// One page of a cursor-paginated list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "RawPage<T>",
    bound(deserialize = "T: Deserialize<'de>")
)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
            has_more: false,
        }
    }
}

#[derive(Deserialize)]
struct RawPage<T> {
    #[serde(alias = "data", alias = "results")]
    items: Vec<T>,
    #[serde(default, alias = "nextCursor", alias = "cursor")]
    next_cursor: Option<String>,
    #[serde(default, alias = "hasMore")]
    has_more: Option<bool>,
}

impl<T> From<RawPage<T>> for Page<T> {
    fn from(raw: RawPage<T>) -> Self {
        // Older endpoints omit `has_more`; a cursor implies another page.
        let has_more = raw.has_more.unwrap_or(raw.next_cursor.is_some());
        Self {
            items: raw.items,
            next_cursor: raw.next_cursor,
            has_more,
        }
    }
}

/// Acknowledgement for mutations whose body carries no entity.
///
/// Decodes from an empty body, `null`, or `{ "success": .., "message": .. }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<AckBody>")]
pub struct Ack {
    pub success: bool,
    pub message: Option<String>,
}

#[derive(Deserialize)]
struct AckBody {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

fn default_success() -> bool {
    true
}

impl From<Option<AckBody>> for Ack {
    fn from(body: Option<AckBody>) -> Self {
        match body {
            Some(body) => Self {
                success: body.success,
                message: body.message,
            },
            None => Self {
                success: true,
                message: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_accepts_camel_case_cursor_shape() {
        let page: Page<u32> = serde_json::from_value(serde_json::json!({
            "data": [1, 2, 3],
            "nextCursor": "c2",
            "hasMore": true
        }))
        .unwrap();

        assert_eq!(page.items, vec![1, 2, 3]);
        assert_eq!(page.next_cursor.as_deref(), Some("c2"));
        assert!(page.has_more);
    }

    #[test]
    fn test_page_has_more_defaults_to_cursor_presence() {
        let last: Page<u32> =
            serde_json::from_value(serde_json::json!({ "items": [9] })).unwrap();
        assert!(!last.has_more);

        let more: Page<u32> =
            serde_json::from_value(serde_json::json!({ "items": [], "cursor": "x" })).unwrap();
        assert!(more.has_more);
    }

    #[test]
    fn test_ack_from_null_and_object() {
        let from_null: Ack = serde_json::from_value(serde_json::Value::Null).unwrap();
        assert!(from_null.success);

        let from_body: Ack =
            serde_json::from_value(serde_json::json!({ "success": false, "message": "nope" }))
                .unwrap();
        assert!(!from_body.success);
        assert_eq!(from_body.message.as_deref(), Some("nope"));
    }

    #[test]
    fn test_into_result_prefers_error() {
        let response: ApiResponse<u32> = ApiResponse {
            data: Some(1),
            error: Some("boom".to_string()),
        };
        assert_eq!(response.into_result(), Err("boom".to_string()));
        assert_eq!(ApiResponse::ok(5).into_result(), Ok(5));
    }
}
