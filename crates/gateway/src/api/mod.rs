pub mod admin;
pub mod health;
pub mod search;

use std::collections::HashMap;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Search routes are public: the caller-supplied user id only scopes
/// ownership.  `/admin/*` is gated by the [`admin::AdminGuard`] extractor.
pub fn router() -> Router<AppState> {
    Router::new()
        // Search
        .route("/search", post(search::search))
        .route("/search/:id/status", get(search::status))
        .route("/search/:id/mcp", get(search::enrichment_result))
        .route("/search/:id/stream", get(search::subscribe))
        // Admin
        .route("/admin/reset", post(admin::reset))
        // Health
        .route("/health", get(health::health))
}

/// Build a standardized JSON error response: `{ "error": "<code>" }`.
pub(crate) fn api_error(status: StatusCode, code: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": code.into() }))).into_response()
}

/// Caller identity.  Priority: `x-user-id` header, then the body's
/// `userContext.userId`, then the `userId` query parameter.  Blank values
/// count as absent.
pub(crate) fn resolve_user_id(
    headers: &HeaderMap,
    body_user: Option<&str>,
    params: &HashMap<String, String>,
) -> Option<String> {
    let header_user = headers.get("x-user-id").and_then(|v| v.to_str().ok());
    [header_user, body_user, params.get("userId").map(String::as_str)]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|u| !u.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn params(user: Option<&str>) -> HashMap<String, String> {
        user.map(|u| HashMap::from([("userId".to_owned(), u.to_owned())]))
            .unwrap_or_default()
    }

    #[test]
    fn identity_priority() {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_static("from-header"));

        assert_eq!(
            resolve_user_id(&headers, Some("from-body"), &params(Some("from-query"))).as_deref(),
            Some("from-header")
        );
        assert_eq!(
            resolve_user_id(&HeaderMap::new(), Some("from-body"), &params(Some("from-query"))).as_deref(),
            Some("from-body")
        );
        assert_eq!(
            resolve_user_id(&HeaderMap::new(), None, &params(Some("from-query"))).as_deref(),
            Some("from-query")
        );
    }

    #[test]
    fn blank_identity_falls_through() {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_static("  "));
        assert_eq!(
            resolve_user_id(&headers, Some(""), &params(Some("u9"))).as_deref(),
            Some("u9")
        );
        assert_eq!(resolve_user_id(&HeaderMap::new(), None, &params(None)), None);
    }
}
