//! Admin endpoints and their auth guard.
//!
//! - `POST /admin/reset`: drop previous-context entries (one user or all)

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Guard
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Axum extractor that enforces the admin bearer token.
///
/// Uses SHA-256 + constant-time comparison so neither the token nor its
/// length leaks through timing.  With no token configured, all requests
/// pass.
pub struct AdminGuard;

#[async_trait]
impl FromRequestParts<AppState> for AdminGuard {
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let expected_hash = match &state.admin_token_hash {
            Some(h) => h,
            None => return Ok(AdminGuard),
        };

        let provided = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .unwrap_or("");
        let provided_hash = Sha256::digest(provided.as_bytes());

        if !bool::from(provided_hash.ct_eq(expected_hash.as_slice())) {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "invalid admin token" })),
            ));
        }
        Ok(AdminGuard)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /admin/reset
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default, Deserialize)]
struct ResetRequest {
    #[serde(default, rename = "userId")]
    user_id: Option<String>,
}

pub async fn reset(_guard: AdminGuard, State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let req: ResetRequest = serde_json::from_slice(&body).unwrap_or_default();

    match req.user_id.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        None => {
            let cleared = state.contexts.len();
            state.contexts.clear_all();
            tracing::info!(cleared, "previous context reset for all users");
            Json(serde_json::json!({ "ok": true, "scope": "all" }))
        }
        Some(user_id) => {
            let removed = state.contexts.clear_user(user_id);
            tracing::info!(user_id = %user_id, removed, "previous context reset for user");
            Json(serde_json::json!({ "ok": true, "scope": "user", "removed": removed }))
        }
    }
}
