//! HTTP adapters against a canned local server.
//!
//! Each test binds its own listener on an ephemeral port and answers by
//! path prefix, so the adapters run their real request/parse code.

use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use ps_domain::config::{EnrichmentConfig, LlmConfig, LlmProviderKind};
use ps_domain::error::Error;
use ps_providers::namuwiki::NamuWikiProvider;
use ps_providers::openai_compat::OpenAiCompatProvider;
use ps_providers::wikipedia::WikipediaProvider;
use ps_providers::{AnswerProvider, AnswerRequest, DecisionProvider, EnrichmentProvider};

// ── Canned server ───────────────────────────────────────────────────

#[derive(Clone)]
struct Route {
    prefix: &'static str,
    status: u16,
    content_type: &'static str,
    body: String,
}

fn route(prefix: &'static str, status: u16, content_type: &'static str, body: impl Into<String>) -> Route {
    Route {
        prefix,
        status,
        content_type,
        body: body.into(),
    }
}

/// Serve `routes` until the test ends; returns `http://127.0.0.1:<port>`.
async fn serve(routes: Vec<Route>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let routes = routes.clone();
            tokio::spawn(async move {
                let path = read_request_path(&mut socket).await;
                let hit = routes.iter().find(|r| path.starts_with(r.prefix));
                let (status, content_type, body) = match hit {
                    Some(r) => (r.status, r.content_type, r.body.clone()),
                    None => (404, "text/plain", "no route".to_owned()),
                };
                let reason = match status {
                    200 => "OK",
                    404 => "Not Found",
                    _ => "Internal Server Error",
                };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}

/// Read the head and any declared body, return the request path.
async fn read_request_path(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let mut head_end = None;
    let mut content_length = 0usize;

    loop {
        if let Some(end) = head_end {
            if buf.len() >= end + content_length {
                break;
            }
        }
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if head_end.is_none() {
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                head_end = Some(pos + 4);
                let head = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
                content_length = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(0);
            }
        }
    }

    String::from_utf8_lossy(&buf)
        .split_whitespace()
        .nth(1)
        .unwrap_or("/")
        .to_owned()
}

fn enrichment_config(base: &str) -> EnrichmentConfig {
    EnrichmentConfig {
        base_url: Some(base.to_owned()),
        ..EnrichmentConfig::default()
    }
}

fn openai_config(base: &str, key_env: &str) -> LlmConfig {
    LlmConfig {
        provider: LlmProviderKind::OpenaiCompat,
        base_url: format!("{base}/v1/chat/completions"),
        api_key_env: key_env.to_owned(),
        ..LlmConfig::default()
    }
}

// ── Wikipedia ───────────────────────────────────────────────────────

#[tokio::test]
async fn wikipedia_search_then_summary() {
    let base = serve(vec![
        route(
            "/w/rest.php/v1/search/page",
            200,
            "application/json",
            r#"{"pages":[{"id":1,"key":"선충","title":"선충"}]}"#,
        ),
        route(
            "/api/rest_v1/page/summary/",
            200,
            "application/json",
            r#"{"title":"선충","extract":"선충은 선형동물문에 속하는 동물이다.","originalimage":{"source":"https://upload.example/nematode.png"}}"#,
        ),
    ])
    .await;

    let provider = WikipediaProvider::from_config(&enrichment_config(&base)).unwrap();
    let payload = provider.lookup("  선충 ").await.unwrap();

    assert_eq!(payload.source, "wikipedia");
    assert_eq!(payload.query, "선충");
    assert_eq!(payload.search.as_ref().unwrap()["pages"][0]["title"], "선충");

    let summary = payload.compact_summary().unwrap();
    assert_eq!(summary.title, "선충");
    assert_eq!(summary.extract, "선충은 선형동물문에 속하는 동물이다.");
    assert_eq!(summary.image.as_deref(), Some("https://upload.example/nematode.png"));
}

#[tokio::test]
async fn wikipedia_without_hits_is_empty_result() {
    let base = serve(vec![route(
        "/w/rest.php/v1/search/page",
        200,
        "application/json",
        r#"{"pages":[]}"#,
    )])
    .await;

    let provider = WikipediaProvider::from_config(&enrichment_config(&base)).unwrap();
    let err = provider.lookup("없는말").await.unwrap_err();
    assert!(matches!(err, Error::EmptyResult(ref term) if term == "없는말"));
}

#[tokio::test]
async fn wikipedia_server_error_is_provider_error() {
    let base = serve(vec![route("/w/", 500, "text/plain", "upstream exploded")]).await;

    let provider = WikipediaProvider::from_config(&enrichment_config(&base)).unwrap();
    match provider.lookup("선충").await.unwrap_err() {
        Error::Provider { provider, message } => {
            assert_eq!(provider, "wikipedia");
            assert!(message.contains("500"), "{message}");
            assert!(message.contains("upstream exploded"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// ── NamuWiki ────────────────────────────────────────────────────────

#[tokio::test]
async fn namuwiki_extracts_app_text() {
    let base = serve(vec![route(
        "/w/",
        200,
        "text/html; charset=utf-8",
        r#"<html><body><nav>메뉴</nav><div id="app"><h1>선충</h1><p>선형동물문의   총칭.</p></div></body></html>"#,
    )])
    .await;

    let provider = NamuWikiProvider::from_config(&enrichment_config(&base)).unwrap();
    let payload = provider.lookup("선충").await.unwrap();

    assert_eq!(payload.source, "namuwiki");
    assert_eq!(payload.content.as_deref(), Some("선충 선형동물문의 총칭."));
    assert!(payload.compact_summary().is_none());
}

#[tokio::test]
async fn namuwiki_blank_page_is_empty_result() {
    let base = serve(vec![route(
        "/w/",
        200,
        "text/html",
        "<html><body><div id=\"app\"></div></body></html>",
    )])
    .await;

    let provider = NamuWikiProvider::from_config(&enrichment_config(&base)).unwrap();
    assert!(matches!(
        provider.lookup("선충").await.unwrap_err(),
        Error::EmptyResult(_)
    ));
}

// ── OpenAI-compatible ───────────────────────────────────────────────

#[tokio::test]
async fn openai_streams_content_deltas() {
    std::env::set_var("PS_TEST_OPENAI_KEY_STREAM", "sk-test");
    let sse = [
        r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#,
        r#"data: {"choices":[{"delta":{"content":"선충은 "}}]}"#,
        r#"data: {"choices":[{"delta":{"content":"작은 벌레입니다."}}]}"#,
        "data: [DONE]",
    ]
    .join("\n\n")
        + "\n\n";
    let base = serve(vec![route("/v1/chat/completions", 200, "text/event-stream", sse)]).await;

    let provider =
        OpenAiCompatProvider::from_config(&openai_config(&base, "PS_TEST_OPENAI_KEY_STREAM")).unwrap();
    let mut fragments = provider
        .stream_answer(AnswerRequest {
            query: "선충이 뭐야?".into(),
            user_id: "u1".into(),
            previous: None,
        })
        .await
        .unwrap();

    let mut text = Vec::new();
    while let Some(fragment) = fragments.next().await {
        text.push(fragment.unwrap());
    }
    assert_eq!(text, vec!["선충은 ", "작은 벌레입니다."]);
}

#[tokio::test]
async fn openai_decision_returns_message_content() {
    std::env::set_var("PS_TEST_OPENAI_KEY_DECIDE", "sk-test");
    let body = serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": "{\"shouldCallTool\":true,\"keyword\":\"선충\"}"}}]
    })
    .to_string();
    let base = serve(vec![route("/v1/chat/completions", 200, "application/json", body)]).await;

    let provider =
        OpenAiCompatProvider::from_config(&openai_config(&base, "PS_TEST_OPENAI_KEY_DECIDE")).unwrap();
    let reply = provider.decide("선충이 뭐야?").await.unwrap();
    assert_eq!(reply, r#"{"shouldCallTool":true,"keyword":"선충"}"#);
}

#[tokio::test]
async fn openai_rejected_request_is_provider_error() {
    std::env::set_var("PS_TEST_OPENAI_KEY_REJECT", "sk-test");
    let base = serve(vec![route(
        "/v1/chat/completions",
        500,
        "application/json",
        r#"{"error":{"message":"overloaded"}}"#,
    )])
    .await;

    let provider =
        OpenAiCompatProvider::from_config(&openai_config(&base, "PS_TEST_OPENAI_KEY_REJECT")).unwrap();
    let result = provider
        .stream_answer(AnswerRequest {
            query: "선충이 뭐야?".into(),
            user_id: String::new(),
            previous: None,
        })
        .await;
    assert!(matches!(result, Err(Error::Provider { .. })));
}
