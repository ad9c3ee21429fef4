//! Liveness probe.

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /health: lightweight health probe (public, no auth)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let answer = state.providers.answer();
    let enrichment = state.providers.enrichment();
    let decision = state.providers.decision();

    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "records": state.store.len(),
        "providers": {
            "answer": answer.provider_id(),
            "decision": decision.as_ref().map(|d| d.provider_id()),
            "enrichment": enrichment.provider_id(),
        },
    }))
}
