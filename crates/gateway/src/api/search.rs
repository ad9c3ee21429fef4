//! Search API endpoints.
//!
//! - `POST /search`: accept a query; buffered JSON or SSE primary answer
//! - `GET  /search/:id/status`: enrichment status poll
//! - `GET  /search/:id/mcp`: enrichment payload once ready
//! - `GET  /search/:id/stream`: SSE push of the one terminal enrichment event

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures_util::stream::Stream;
use serde::Deserialize;

use ps_domain::record::{new_request_id, RequestRecord, RequestStatus};
use ps_requests::{Lookup, RequestStore, TerminalEvent};

use super::{api_error, resolve_user_id};
use crate::runtime::primary::NORMAL_SEARCH_FAILED;
use crate::runtime::{PrimaryEvent, SearchJob};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default, Deserialize)]
struct SearchRequest {
    #[serde(default)]
    query: Option<String>,
    #[serde(default, rename = "userContext")]
    user_context: Option<UserContext>,
}

#[derive(Debug, Default, Deserialize)]
struct UserContext {
    #[serde(default, rename = "userId")]
    user_id: Option<String>,
}

type Params = Query<HashMap<String, String>>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /search
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Params,
    body: Bytes,
) -> Response {
    // Unparseable bodies are treated as empty.
    let req: SearchRequest = serde_json::from_slice(&body).unwrap_or_default();

    let query = req.query.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "query_required");
    }
    let body_user = req.user_context.as_ref().and_then(|c| c.user_id.as_deref());
    let Some(user_id) = resolve_user_id(&headers, body_user, &params) else {
        return api_error(StatusCode::BAD_REQUEST, "user_required");
    };

    let request_id = new_request_id();
    if let Err(e) = state.store.create(&request_id, &user_id, query) {
        tracing::error!(request_id = %request_id, error = %e, "failed to create request record");
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error");
    }

    let job = SearchJob {
        request_id: request_id.clone(),
        user_id,
        query: query.to_owned(),
    };
    tracing::info!(
        request_id = %job.request_id,
        user_id = %job.user_id,
        stream = wants_stream(&headers, &params),
        "search accepted"
    );

    state.enrichment.spawn(job.clone());

    if wants_stream(&headers, &params) {
        let rx = state.primary.spawn_incremental(job);
        return Sse::new(primary_event_stream(rx))
            .keep_alive(KeepAlive::default())
            .into_response();
    }

    match state.primary.answer(&job).await {
        Ok(payload) => Json(serde_json::json!({
            "requestId": request_id,
            "results": payload.results,
            "status": RequestStatus::Pending.as_str(),
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "primary answer failed");
            api_error(StatusCode::BAD_GATEWAY, NORMAL_SEARCH_FAILED)
        }
    }
}

fn wants_stream(headers: &HeaderMap, params: &HashMap<String, String>) -> bool {
    params.get("stream").is_some_and(|v| v == "true")
        || headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("text/event-stream"))
}

fn primary_event_stream(
    mut rx: tokio::sync::mpsc::Receiver<PrimaryEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let data = serde_json::to_string(&event).unwrap_or_default();
            yield Ok(Event::default().event(event.event_name()).data(data));
            if event.is_terminal() {
                break;
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /search/:id/status
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(params): Params,
) -> Response {
    match owned_record(&state, &id, &headers, &params) {
        Ok(record) => Json(serde_json::json!({ "status": record.status })).into_response(),
        Err(resp) => resp,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /search/:id/mcp
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn enrichment_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(params): Params,
) -> Response {
    let record = match owned_record(&state, &id, &headers, &params) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match record.status {
        RequestStatus::Expired => api_error(StatusCode::GONE, "expired"),
        RequestStatus::Failed => api_error(StatusCode::FAILED_DEPENDENCY, "mcp_failed"),
        RequestStatus::Pending => api_error(StatusCode::CONFLICT, "mcp_not_ready"),
        RequestStatus::Ready => match record.results.mcp {
            Some(payload) => Json(payload).into_response(),
            None => Json(serde_json::json!({})).into_response(),
        },
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /search/:id/stream (SSE)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn subscribe(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(params): Params,
) -> Response {
    match owned_record(&state, &id, &headers, &params) {
        Ok(record) => Sse::new(terminal_event_stream(state.store.clone(), record))
            .keep_alive(KeepAlive::default())
            .into_response(),
        Err(resp) => resp,
    }
}

/// One terminal enrichment event, then close.
///
/// An already-terminal record answers from its status without touching
/// the hub.  Otherwise the stream registers with the hub, re-checks the
/// record to catch a commit that landed in between, and waits for either
/// the hub or the record's expiry deadline.  Dropping the stream (client
/// disconnect) drops the subscription, which unregisters it.
fn terminal_event_stream(
    store: Arc<RequestStore>,
    record: RequestRecord,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let request_id = record.request_id.clone();

        let event = match TerminalEvent::from_status(record.status) {
            Some(event) => event,
            None => {
                let mut subscription = store.hub().register(&request_id);
                let settled = subscription.try_recv().or_else(|| {
                    store
                        .get(&request_id)
                        .and_then(|r| TerminalEvent::from_status(r.status))
                });
                match settled {
                    Some(event) => event,
                    None => {
                        let wait = record.remaining(store.now());
                        tokio::select! {
                            received = subscription.recv() => received.unwrap_or(TerminalEvent::Expired),
                            _ = tokio::time::sleep(wait) => {
                                // Reconcile so every other observer wakes too.
                                let _ = store.get(&request_id);
                                TerminalEvent::Expired
                            }
                        }
                    }
                }
            }
        };

        tracing::debug!(request_id = %request_id, event = event.event_name(), "enrichment event delivered");
        let data = serde_json::json!({ "requestId": request_id }).to_string();
        yield Ok(Event::default().event(event.event_name()).data(data));
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ownership
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Resolve the caller and fetch the record they own, or the error
/// response: 400 without identity, 404 unknown id, 403 someone else's.
fn owned_record(
    state: &AppState,
    id: &str,
    headers: &HeaderMap,
    params: &HashMap<String, String>,
) -> Result<RequestRecord, Response> {
    let Some(user_id) = resolve_user_id(headers, None, params) else {
        return Err(api_error(StatusCode::BAD_REQUEST, "user_required"));
    };
    match state.store.get_for_owner(id, &user_id) {
        Lookup::Found(record) => Ok(record),
        Lookup::NotFound => Err(api_error(StatusCode::NOT_FOUND, "not_found")),
        Lookup::Forbidden => Err(api_error(StatusCode::FORBIDDEN, "forbidden")),
    }
}
