//! HTTP-level tests: a real server on an ephemeral port, driven with
//! reqwest, backed by the mock providers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use ps_domain::config::{Config, GateMode};
use ps_gateway::state::AppState;
use ps_gateway::{api, bootstrap};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Harness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct TestApp {
    base: String,
    state: AppState,
    client: reqwest::Client,
}

fn mock_config(ttl_ms: u64, enrichment_timeout_ms: u64, mock_delay_ms: u64) -> Config {
    let mut config = Config::default();
    config.llm.use_mock = true;
    config.llm.mock_chunk_delay_ms = 0;
    config.enrichment.use_mock = true;
    config.enrichment.mock_delay_ms = mock_delay_ms;
    config.gate.mode = GateMode::Heuristic;
    config.search.ttl_ms = ttl_ms;
    config.search.enrichment_timeout_ms = enrichment_timeout_ms;
    config.admin.token_env = "PS_TEST_ADMIN_TOKEN_NEVER_SET".into();
    config
}

async fn spawn_app(config: Config) -> TestApp {
    let state = bootstrap::build_app_state(Arc::new(config)).unwrap();
    let app = api::router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        base: format!("http://{addr}"),
        state,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    async fn search(&self, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(format!("{}/search", self.base))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn get_as(&self, path: &str, user: &str) -> (u16, Value) {
        let resp = self
            .client
            .get(format!("{}{path}", self.base))
            .header("x-user-id", user)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn stream_as(&self, path: &str, user: &str) -> Vec<(String, Value)> {
        let body = self
            .client
            .get(format!("{}{path}", self.base))
            .header("x-user-id", user)
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        parse_sse(&body)
    }

    async fn poll_status(&self, id: &str, user: &str, expected: &str) -> String {
        let started = Instant::now();
        while started.elapsed() < Duration::from_secs(2) {
            let (_, body) = self.get_as(&format!("/search/{id}/status"), user).await;
            if body["status"] == expected {
                return expected.to_owned();
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("status never reached {expected}");
    }
}

fn parse_sse(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter_map(|block| {
            let mut name = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    name = Some(v.trim().to_owned());
                } else if let Some(v) = line.strip_prefix("data:") {
                    data = serde_json::from_str(v.trim()).ok();
                }
            }
            Some((name?, data.unwrap_or(Value::Null)))
        })
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /search
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn buffered_search_returns_pending_then_enrichment_ready() {
    let app = spawn_app(mock_config(1_000, 500, 10)).await;

    let (code, body) = app
        .search(json!({"query": "설명 테스트", "userContext": {"userId": "u-1"}}))
        .await;
    assert_eq!(code, 200);
    assert_eq!(body["status"], "pending");
    assert!(body["results"].as_array().is_some_and(|r| !r.is_empty()));
    assert_eq!(body["results"][0]["type"], "llm");
    let id = body["requestId"].as_str().unwrap().to_owned();

    assert_eq!(app.poll_status(&id, "u-1", "ready").await, "ready");

    let (code, mcp) = app.get_as(&format!("/search/{id}/mcp"), "u-1").await;
    assert_eq!(code, 200);
    assert_eq!(mcp["source"], "mock");
    assert_eq!(mcp["results"].as_array().unwrap().len(), 2);

    let (code, body) = app.get_as(&format!("/search/{id}/status"), "u-2").await;
    assert_eq!(code, 403);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn nematode_question_is_enriched_within_half_a_second() {
    let app = spawn_app(mock_config(10_000, 8_000, 10)).await;

    let started = Instant::now();
    let (code, body) = app
        .search(json!({"query": "선충이 뭐야?", "userContext": {"userId": "u-1"}}))
        .await;
    assert_eq!(code, 200);
    let id = body["requestId"].as_str().unwrap().to_owned();

    loop {
        let (_, body) = app.get_as(&format!("/search/{id}/status"), "u-1").await;
        if body["status"] == "ready" {
            break;
        }
        assert!(
            started.elapsed() < Duration::from_millis(500),
            "still {} after 500ms",
            body["status"]
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let (code, mcp) = app.get_as(&format!("/search/{id}/mcp"), "u-1").await;
    assert_eq!(code, 200);
    assert_eq!(mcp["source"], "mock");
    assert_eq!(mcp["query"], "선충");
}

#[tokio::test]
async fn users_cannot_read_each_others_requests() {
    let app = spawn_app(mock_config(5_000, 500, 10)).await;

    let (_, a) = app
        .search(json!({"query": "선충이 뭐야?", "userContext": {"userId": "alice"}}))
        .await;
    let (_, b) = app
        .search(json!({"query": "커넥톰 설명", "userContext": {"userId": "bob"}}))
        .await;
    let a_id = a["requestId"].as_str().unwrap();
    let b_id = b["requestId"].as_str().unwrap();

    for (id, reader) in [(a_id, "bob"), (b_id, "alice")] {
        for path in ["status", "mcp"] {
            let (code, body) = app.get_as(&format!("/search/{id}/{path}"), reader).await;
            assert_eq!((code, body["error"].as_str()), (403, Some("forbidden")), "{path}");
        }
    }
}

#[tokio::test]
async fn enrichment_timeout_marks_request_failed() {
    let app = spawn_app(mock_config(1_000, 50, 200)).await;

    let (_, body) = app
        .search(json!({"query": "설명 timeout", "userContext": {"userId": "u-1"}}))
        .await;
    let id = body["requestId"].as_str().unwrap().to_owned();

    assert_eq!(app.poll_status(&id, "u-1", "failed").await, "failed");

    let (code, body) = app.get_as(&format!("/search/{id}/mcp"), "u-1").await;
    assert_eq!(code, 424);
    assert_eq!(body["error"], "mcp_failed");
}

#[tokio::test]
async fn declined_gate_reads_as_failed() {
    let app = spawn_app(mock_config(1_000, 500, 10)).await;

    let (_, body) = app
        .search(json!({"query": "안녕", "userContext": {"userId": "u-1"}}))
        .await;
    let id = body["requestId"].as_str().unwrap().to_owned();

    assert_eq!(app.poll_status(&id, "u-1", "failed").await, "failed");
    let (code, _) = app.get_as(&format!("/search/{id}/mcp"), "u-1").await;
    assert_eq!(code, 424);
}

#[tokio::test]
async fn pending_enrichment_is_not_ready() {
    let app = spawn_app(mock_config(5_000, 2_000, 500)).await;

    let (_, body) = app
        .search(json!({"query": "선충이 뭐야?", "userContext": {"userId": "u-1"}}))
        .await;
    let id = body["requestId"].as_str().unwrap().to_owned();

    let (code, body) = app.get_as(&format!("/search/{id}/mcp"), "u-1").await;
    assert_eq!(code, 409);
    assert_eq!(body["error"], "mcp_not_ready");
}

#[tokio::test]
async fn input_validation() {
    let app = spawn_app(mock_config(1_000, 500, 10)).await;

    let (code, body) = app.search(json!({"userContext": {"userId": "u-1"}})).await;
    assert_eq!((code, body["error"].as_str()), (400, Some("query_required")));

    let (code, body) = app
        .search(json!({"query": "   ", "userContext": {"userId": "u-1"}}))
        .await;
    assert_eq!((code, body["error"].as_str()), (400, Some("query_required")));

    let (code, body) = app.search(json!({"query": "선충"})).await;
    assert_eq!((code, body["error"].as_str()), (400, Some("user_required")));

    // Unparseable body is treated as empty.
    let resp = app
        .client
        .post(format!("{}/search", app.base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "query_required");

    assert!(app.state.store.is_empty());

    let (code, body) = app.get_as("/search/does-not-exist/status", "u-1").await;
    assert_eq!((code, body["error"].as_str()), (404, Some("not_found")));

    let resp = app
        .client
        .get(format!("{}/search/does-not-exist/mcp", app.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn identity_from_query_parameter() {
    let app = spawn_app(mock_config(1_000, 500, 10)).await;

    let resp = app
        .client
        .post(format!("{}/search?userId=u-q", app.base))
        .json(&json!({"query": "선충"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    let id = body["requestId"].as_str().unwrap();

    let record = app.state.store.get(id).unwrap();
    assert_eq!(record.user_id, "u-q");
}

#[tokio::test]
async fn incremental_search_streams_and_commits() {
    let app = spawn_app(mock_config(1_000, 500, 10)).await;

    let body = app
        .client
        .post(format!("{}/search?stream=true", app.base))
        .json(&json!({"query": "선충이 뭐야?", "userContext": {"userId": "u-1"}}))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let events = parse_sse(&body);

    let (first, start) = events.first().unwrap();
    assert_eq!(first, "normal-start");
    let id = start["requestId"].as_str().unwrap().to_owned();
    assert_eq!(events.last().unwrap().0, "normal-done");
    assert_eq!(events.last().unwrap().1["requestId"], id.as_str());

    let streamed: String = events
        .iter()
        .filter(|(name, _)| name == "normal-chunk")
        .filter_map(|(_, data)| data["delta"].as_str())
        .collect();
    let record = app.state.store.get(&id).unwrap();
    assert_eq!(record.results.normal.unwrap().first_answer(), streamed);

    let context = app.state.contexts.get("u-1").unwrap();
    assert_eq!(context.answer, streamed);
}

#[tokio::test]
async fn accept_header_selects_stream_mode() {
    let app = spawn_app(mock_config(1_000, 500, 10)).await;

    let resp = app
        .client
        .post(format!("{}/search", app.base))
        .header("accept", "text/event-stream")
        .json(&json!({"query": "선충", "userContext": {"userId": "u-1"}}))
        .send()
        .await
        .unwrap();
    assert!(resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/event-stream")));
    let events = parse_sse(&resp.text().await.unwrap());
    assert_eq!(events.last().unwrap().0, "normal-done");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /search/:id/stream
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn subscription_on_terminal_record_gets_exactly_one_event() {
    let app = spawn_app(mock_config(1_000, 500, 10)).await;

    let (_, body) = app
        .search(json!({"query": "선충 설명", "userContext": {"userId": "u-1"}}))
        .await;
    let id = body["requestId"].as_str().unwrap().to_owned();
    app.poll_status(&id, "u-1", "ready").await;

    let events = app.stream_as(&format!("/search/{id}/stream"), "u-1").await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "enrichment-ready");
    assert_eq!(events[0].1["requestId"], id.as_str());
    assert_eq!(app.state.store.hub().observer_count(&id), 0);
}

#[tokio::test]
async fn subscription_is_woken_by_enrichment() {
    let app = spawn_app(mock_config(5_000, 2_000, 200)).await;

    let (_, body) = app
        .search(json!({"query": "커넥톰", "userContext": {"userId": "u-1"}}))
        .await;
    let id = body["requestId"].as_str().unwrap().to_owned();

    let path = format!("/search/{id}/stream");
    let (a, b) = tokio::join!(app.stream_as(&path, "u-1"), app.stream_as(&path, "u-1"));
    for events in [a, b] {
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "enrichment-ready");
    }
    assert_eq!(app.state.store.hub().observer_count(&id), 0);
}

#[tokio::test]
async fn subscription_closes_at_expiry() {
    // Lookup outlives the record.
    let app = spawn_app(mock_config(300, 1_500, 2_000)).await;

    let (_, body) = app
        .search(json!({"query": "선충", "userContext": {"userId": "u-1"}}))
        .await;
    let id = body["requestId"].as_str().unwrap().to_owned();

    let started = Instant::now();
    let events = app.stream_as(&format!("/search/{id}/stream"), "u-1").await;
    assert!(started.elapsed() < Duration::from_millis(1_500));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "enrichment-expired");

    let (_, body) = app.get_as(&format!("/search/{id}/status"), "u-1").await;
    assert_eq!(body["status"], "expired");
    let (code, body) = app.get_as(&format!("/search/{id}/mcp"), "u-1").await;
    assert_eq!((code, body["error"].as_str()), (410, Some("expired")));
}

#[tokio::test]
async fn subscription_errors_before_stream_opens() {
    let app = spawn_app(mock_config(1_000, 500, 10)).await;

    let (_, body) = app
        .search(json!({"query": "선충", "userContext": {"userId": "u-1"}}))
        .await;
    let id = body["requestId"].as_str().unwrap().to_owned();

    let (code, body) = app.get_as(&format!("/search/{id}/stream"), "u-2").await;
    assert_eq!((code, body["error"].as_str()), (403, Some("forbidden")));
    let (code, _) = app.get_as("/search/missing/stream", "u-1").await;
    assert_eq!(code, 404);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Admin, health, mirror
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn admin_reset_scopes() {
    let app = spawn_app(mock_config(1_000, 500, 10)).await;
    app.search(json!({"query": "선충", "userContext": {"userId": "u-1"}}))
        .await;
    app.search(json!({"query": "선충", "userContext": {"userId": "u-2"}}))
        .await;
    assert_eq!(app.state.contexts.len(), 2);

    let reset = |body: Value| {
        let req = app.client.post(format!("{}/admin/reset", app.base)).json(&body);
        async move { req.send().await.unwrap().json::<Value>().await.unwrap() }
    };

    let body = reset(json!({"userId": "u-1"})).await;
    assert_eq!(body, json!({"ok": true, "scope": "user", "removed": true}));
    let body = reset(json!({"userId": "u-1"})).await;
    assert_eq!(body["removed"], false);
    assert_eq!(app.state.contexts.len(), 1);

    let body = reset(json!({})).await;
    assert_eq!(body, json!({"ok": true, "scope": "all"}));
    assert!(app.state.contexts.is_empty());
}

#[tokio::test]
async fn admin_token_is_enforced_when_set() {
    std::env::set_var("PS_TEST_ADMIN_TOKEN_SET", "s3cret");
    let mut config = mock_config(1_000, 500, 10);
    config.admin.token_env = "PS_TEST_ADMIN_TOKEN_SET".into();
    let app = spawn_app(config).await;
    let url = format!("{}/admin/reset", app.base);

    let resp = app.client.post(&url).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let resp = app
        .client
        .post(&url)
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let resp = app
        .client
        .post(&url)
        .bearer_auth("s3cret")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn health_reports_record_count() {
    let app = spawn_app(mock_config(1_000, 500, 10)).await;
    app.search(json!({"query": "선충", "userContext": {"userId": "u-1"}}))
        .await;

    let resp = app.client.get(format!("{}/health", app.base)).send().await.unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["records"], 1);
    assert_eq!(body["providers"]["enrichment"], "mock");
    assert!(body["providers"]["decision"].is_null());
}

#[tokio::test]
async fn mirror_receives_committed_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mirror").join("records.jsonl");
    let mut config = mock_config(1_000, 500, 10);
    config.search.mirror_path = Some(path.clone());
    let app = spawn_app(config).await;

    let (_, body) = app
        .search(json!({"query": "선충", "userContext": {"userId": "u-1"}}))
        .await;
    let id = body["requestId"].as_str().unwrap().to_owned();
    app.poll_status(&id, "u-1", "ready").await;
    app.state.store.flush_mirror().await;

    let raw = std::fs::read_to_string(&path).unwrap();
    let statuses: Vec<String> = raw
        .lines()
        .map(|l| serde_json::from_str::<Value>(l).unwrap())
        .filter(|v| v["requestId"] == id.as_str())
        .map(|v| v["status"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(statuses.first().map(String::as_str), Some("pending"));
    assert_eq!(statuses.last().map(String::as_str), Some("ready"));
}
