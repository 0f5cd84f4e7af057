//! Envelope response format for all API responses.
//!
//! Every response is wrapped in a consistent envelope:
//! ```json
//! {
//!   "data": { ... },
//!   "meta": { "request_id": "...", "timestamp": "...", "response_time_ms": 5 },
//!   "errors": [],
//!   "_links": { "self": "..." }
//! }
//! ```
//!
//! Inside the request-id middleware, every envelope of one request (success
//! or error) carries the same `request_id` and measures time from when the
//! request arrived.

use std::collections::HashMap;
use std::future::Future;
use std::time::Instant;

use serde::Serialize;
use uuid::Uuid;

/// Envelope response wrapping all API data.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    pub meta: ApiMeta,

    /// Error list (empty on success).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ApiErrorDetail>,

    #[serde(rename = "_links", skip_serializing_if = "HashMap::is_empty")]
    pub links: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct ApiMeta {
    pub request_id: String,
    /// RFC 3339 timestamp of the response.
    pub timestamp: String,
    pub response_time_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    pub message: String,
}

tokio::task_local! {
    static CURRENT: RequestTimer;
}

/// Per-request id and start time, captured at the top of a handler.
#[derive(Debug, Clone)]
pub struct RequestTimer {
    request_id: String,
    start: Instant,
}

impl RequestTimer {
    /// The timer of the request being served, or a new one outside a
    /// request scope.
    pub fn start() -> Self {
        CURRENT
            .try_with(Clone::clone)
            .unwrap_or_else(|_| Self::new(Uuid::now_v7().to_string()))
    }

    pub fn new(request_id: String) -> Self {
        Self {
            request_id,
            start: Instant::now(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Run `fut` with this timer as the current request's.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        CURRENT.scope(self, fut).await
    }

    fn meta(&self) -> ApiMeta {
        ApiMeta {
            request_id: self.request_id.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            response_time_ms: self.start.elapsed().as_millis() as u64,
        }
    }

    pub fn success<T: Serialize>(&self, data: T) -> ApiResponse<T> {
        ApiResponse {
            data: Some(data),
            meta: self.meta(),
            errors: Vec::new(),
            links: HashMap::new(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    /// Add a HATEOAS-style link.
    pub fn with_link(mut self, rel: &str, href: &str) -> Self {
        self.links.insert(rel.to_string(), href.to_string());
        self
    }
}

impl ApiResponse<()> {
    /// An error envelope for the current request.
    pub fn error(code: &str, message: &str) -> Self {
        Self {
            data: None,
            meta: RequestTimer::start().meta(),
            errors: vec![ApiErrorDetail {
                code: code.to_string(),
                message: message.to_string(),
            }],
            links: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_shape() {
        let timer = RequestTimer::start();
        let body = serde_json::to_value(
            timer
                .success(serde_json::json!({"ok": true}))
                .with_link("self", "/api/v1/sessions/1"),
        )
        .unwrap();
        assert_eq!(body["data"]["ok"], true);
        assert_eq!(body["_links"]["self"], "/api/v1/sessions/1");
        assert!(body.get("errors").is_none());
        assert!(!body["meta"]["request_id"].as_str().unwrap().is_empty());
    }

    #[test]
    fn test_error_envelope_has_no_data() {
        let body = serde_json::to_value(ApiResponse::error("NOT_FOUND", "turn not found")).unwrap();
        assert!(body.get("data").is_none());
        assert_eq!(body["errors"][0]["code"], "NOT_FOUND");
        assert_eq!(body["errors"][0]["message"], "turn not found");
    }

    #[tokio::test]
    async fn test_envelopes_share_the_request_scope() {
        let timer = RequestTimer::new("req-1".into());
        let (handler_id, error_id) = timer
            .scope(async {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                let handler = RequestTimer::start();
                let error = ApiResponse::error("NOT_FOUND", "turn not found");
                assert!(error.meta.response_time_ms >= 5);
                (handler.request_id().to_string(), error.meta.request_id)
            })
            .await;
        assert_eq!(handler_id, "req-1");
        assert_eq!(error_id, "req-1");

        let outside = ApiResponse::error("NOT_FOUND", "turn not found");
        assert_ne!(outside.meta.request_id, "req-1");
    }
}
